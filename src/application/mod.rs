//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod inference;
pub mod registry;

pub use inference::{predict, predict_row, Assessment, PredictionService};
pub use registry::{shared_classifier, ClassifierCell};
