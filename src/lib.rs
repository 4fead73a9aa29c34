//! # Heartsense
//!
//! Heart disease screening pipeline.
//!
//! This crate provides:
//! - Typed clinical form input with range validation
//! - Drop-first one-hot encoding into the classifier's fixed feature order
//! - Binary classifier inference with per-class percentages and a verdict sentence
//! - Signed, versioned classifier artifacts (tree ensemble or logistic regression)
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (RawPatientInput, EncodedFeatureVector, PredictionResult)
//! - `ports`: The `ClassifierHandle` capability trait
//! - `adapters`: Concrete classifier formats, artifact verification, log sanitization
//! - `application`: Inference invocation and the prediction use case
//! - `config`: Environment-driven settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{predict, predict_row, Assessment, PredictionService};
pub use domain::{
    encode, EncodedFeatureVector, Gender, PredictedClass, PredictionResult, RawPatientInput,
};
pub use ports::ClassifierHandle;

/// Result type for Heartsense operations
pub type Result<T> = std::result::Result<T, HeartsenseError>;

/// Main error type for Heartsense
#[derive(Debug, thiserror::Error)]
pub enum HeartsenseError {
    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRangeInput {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be a finite number")]
    NonFiniteInput { field: &'static str },

    #[error("Unknown {field} category: {value:?}")]
    UnknownCategory { field: &'static str, value: String },

    #[error("Invalid feature vector: {0}")]
    InvalidFeatureVector(String),

    #[error("Inference failed: {0}")]
    InferenceFailure(#[source] ports::ClassifierError),

    #[error("Classifier unavailable: {0}")]
    ModelLoad(#[from] adapters::ModelLoadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
