//! Core data types and I/O operations.

pub mod labels;
pub mod loaders;
pub mod stats;
pub mod table;
pub mod writers;

pub use loaders::{load_marked_table, load_table, load_text_table, LoaderError};
pub use table::{CellMarks, Highlight, MarkedTable, RegionTable, TextTable};
pub use writers::{write_marked_table, write_table, write_text_table, with_stem_suffix, WriteError};
