//! Slice-level object counts to regional densities and laterality indices.
//!
//! This crate provides tools for:
//! - Merging per-slice atlas exports into slice-by-region spreadsheets
//! - Sizing and counting objects per region and slice
//! - Handling damaged and adjusted slices marked in QC sheets or by cell colour
//! - Estimating densities and left/right laterality indices
//! - Flagging object size outliers and plotting the results
//!
//! # Example
//!
//! ```no_run
//! use slice_density::{core::load_table, processors::laterality::add_laterality_indices};
//!
//! let mut table = load_table("Processed_All_densities.xlsx").unwrap();
//! let rats = add_laterality_indices(&mut table, &[]).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{
    DensityConfig, ImputationConfig, LateralityConfig, OutlierConfig, PipelineConfig, PlotConfig,
};
pub use core::{CellMarks, Highlight, MarkedTable, RegionTable};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
