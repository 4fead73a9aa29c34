//! Classifier port: Trait for a loaded binary classifier.
//!
//! This trait abstracts the concrete model format from the encoder and the
//! inference invoker, so a different artifact format can be swapped in
//! without touching either.

use serde::{Deserialize, Serialize};

/// Error type for classifier invocation.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Feature count mismatch: got {got}, expected {expected}")]
    ShapeMismatch { got: usize, expected: usize },

    #[error("Non-finite value in feature column {column}")]
    NonFinite { column: usize },

    #[error("Malformed classifier output: {0}")]
    MalformedOutput(String),

    #[error("Classifier backend error: {0}")]
    Backend(String),
}

/// Identity of a loaded model artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub version: String,
}

/// A loaded, read-only binary classifier.
///
/// Implementations must be stateless at inference time: both operations take
/// `&self` and may be called concurrently from many threads on one handle.
pub trait ClassifierHandle: Send + Sync {
    /// Name and version of the underlying artifact.
    fn descriptor(&self) -> &ModelDescriptor;

    /// Number of columns each row must have.
    fn n_features(&self) -> usize;

    /// Predict a class label (0 or 1) for every row in the batch.
    ///
    /// # Errors
    /// Returns `ClassifierError::ShapeMismatch` if a row has the wrong length.
    fn predict_class(&self, batch: &[&[f64]]) -> Result<Vec<u8>, ClassifierError>;

    /// Predict `[P(class 0), P(class 1)]` for every row in the batch.
    ///
    /// # Errors
    /// Returns `ClassifierError::ShapeMismatch` if a row has the wrong length.
    fn predict_probabilities(&self, batch: &[&[f64]]) -> Result<Vec<[f64; 2]>, ClassifierError>;
}
