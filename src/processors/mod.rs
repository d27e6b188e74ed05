//! Data processing modules.

pub mod adjustments;
pub mod concordance;
pub mod damage;
pub mod density;
pub mod imputation;
pub mod laterality;
pub mod merging;
pub mod objects;
pub mod outliers;
pub mod pairing;
pub mod qc;
pub mod steps;
pub mod totals;

// Re-export key types for convenience
pub use density::DensityError;
pub use imputation::Correction;
pub use laterality::LateralityError;
pub use merging::{merge_folder, MergeError, MergeReport};
pub use pairing::PairingError;
pub use qc::{QcError, SliceRegions};
pub use steps::PlotKind;
