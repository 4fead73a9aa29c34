//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external formats:
//! - `model`: JSON classifier artifacts and their signed manifests
//! - `sanitize`: clinical value and secret filtering for logs

pub mod model;
pub mod sanitize;

// Re-export load error for lib.rs
pub use model::ModelLoadError;
