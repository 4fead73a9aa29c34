//! Inference: runs a classifier on an encoded patient and shapes the result.
//!
//! This service coordinates:
//! - Range validation
//! - Feature encoding
//! - Single-row classifier invocation
//! - Percent rounding and the verdict sentence

use std::sync::Arc;

use serde::Serialize;

use super::registry::shared_classifier;
use crate::config::Settings;
use crate::domain::{
    encode, EncodedFeatureVector, PredictedClass, PredictionResult, RawPatientInput,
};
use crate::ports::{ClassifierError, ClassifierHandle, ModelDescriptor};
use crate::HeartsenseError;

fn malformed(detail: String) -> HeartsenseError {
    HeartsenseError::InferenceFailure(ClassifierError::MalformedOutput(detail))
}

fn single<T>(mut rows: Vec<T>, operation: &str) -> crate::Result<T> {
    if rows.len() != 1 {
        let n = rows.len();
        return Err(malformed(format!("{operation} returned {n} rows for one row")));
    }
    Ok(rows.remove(0))
}

/// Run the classifier on one encoded patient.
///
/// # Errors
/// See [`predict_row`].
pub fn predict(
    vector: &EncodedFeatureVector,
    model: &dyn ClassifierHandle,
) -> crate::Result<PredictionResult> {
    predict_row(vector.as_slice(), model)
}

/// Run the classifier on an untyped feature row.
///
/// The row is wrapped as a single-row batch for both `predict_class` and
/// `predict_probabilities`. Nothing is retried.
///
/// # Errors
/// - `InvalidFeatureVector` if the row length differs from the classifier's
///   feature count or a value is not finite
/// - `InferenceFailure` if the classifier errors or replies with anything
///   other than one row holding a 0/1 label and two probabilities in [0, 1]
pub fn predict_row(row: &[f64], model: &dyn ClassifierHandle) -> crate::Result<PredictionResult> {
    let expected = model.n_features();
    if row.len() != expected {
        return Err(HeartsenseError::InvalidFeatureVector(format!(
            "expected {expected} features, got {}",
            row.len()
        )));
    }
    if let Some(i) = row.iter().position(|v| !v.is_finite()) {
        let detail = format!("column {i} is not finite");
        return Err(HeartsenseError::InvalidFeatureVector(detail));
    }

    let batch = [row];
    let labels = model
        .predict_class(&batch)
        .map_err(HeartsenseError::InferenceFailure)?;
    let probabilities = model
        .predict_probabilities(&batch)
        .map_err(HeartsenseError::InferenceFailure)?;
    let label = single(labels, "predict_class")?;
    let probabilities = single(probabilities, "predict_probabilities")?;

    let class = PredictedClass::from_label(label)
        .ok_or_else(|| malformed(format!("class label {label} is not 0 or 1")))?;
    if probabilities
        .iter()
        .any(|p| !p.is_finite() || !(0.0..=1.0).contains(p))
    {
        return Err(malformed(format!(
            "probabilities {probabilities:?} outside [0, 1]"
        )));
    }

    Ok(PredictionResult::new(class, probabilities))
}

/// Outcome of one assessment, ready for a presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub model: ModelDescriptor,
    pub features: EncodedFeatureVector,
    pub result: PredictionResult,
    pub sentence: String,
}

/// Service for assessing a patient form against a shared classifier.
#[derive(Clone)]
pub struct PredictionService {
    classifier: Arc<dyn ClassifierHandle>,
}

impl PredictionService {
    /// Create a service around an already loaded classifier.
    pub fn new(classifier: Arc<dyn ClassifierHandle>) -> Self {
        Self { classifier }
    }

    /// Create a service around the process-wide classifier.
    ///
    /// # Errors
    /// Returns error if the classifier has not been loaded yet and loading fails.
    pub fn shared(settings: &Settings) -> crate::Result<Self> {
        Ok(Self::new(shared_classifier(settings)?))
    }

    /// Validate, encode and classify one form submission.
    ///
    /// # Errors
    /// Returns `OutOfRangeInput`/`NonFiniteInput` for bad input, otherwise
    /// any error from [`predict`].
    pub fn assess(&self, input: &RawPatientInput) -> crate::Result<Assessment> {
        input.validate()?;

        let features = encode(input)?;
        tracing::debug!("Encoded {} features", features.as_slice().len());

        let result = predict(&features, self.classifier.as_ref())?;
        let model = self.classifier.descriptor().clone();

        tracing::info!(
            prediction = u8::from(result.class),
            model = %model.version,
            "Assessment complete"
        );

        Ok(Assessment {
            sentence: result.sentence(input.gender),
            model,
            features,
            result,
        })
    }
}
