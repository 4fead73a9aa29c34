//! Classifier artifacts: Implementation of ClassifierHandle from versioned JSON.
//!
//! An artifact declares its feature order, which must equal the encoder's
//! `FEATURE_NAMES` exactly. Scoring a permuted vector would silently produce
//! wrong predictions, so a mismatch is a load error.
//!
//! # Security
//!
//! - Artifacts are verified via a signed manifest (see [`manifest`])
//! - Unsigned artifacts load only in debug builds with an explicit opt-in

pub mod logistic;
pub mod manifest;
pub mod tree;

use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::domain::{FEATURE_COUNT, FEATURE_NAMES};
use crate::ports::{ClassifierError, ClassifierHandle, ModelDescriptor};

pub use logistic::LogisticModel;
pub use manifest::SignedManifest;
pub use tree::{Tree, TreeEnsemble, TreeNode};

/// File name of the artifact inside a model directory.
pub const ARTIFACT_FILE: &str = "classifier.json";

const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Error type for loading a classifier artifact.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unsupported artifact format version {0}")]
    UnsupportedVersion(u32),

    #[error("Artifact declares {found} features, encoder emits {expected}")]
    FeatureCount { found: usize, expected: usize },

    #[error("Feature order mismatch at column {index}: artifact has {found:?}, encoder emits {expected:?}")]
    FeatureOrderMismatch {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("Invalid model structure: {0}")]
    Structure(String),

    #[error("Model signature required: {0}")]
    Unsigned(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),

    #[error("Digest mismatch for {0}")]
    DigestMismatch(String),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Invalid verifying key: {0}")]
    VerifyingKey(String),
}

/// Scoring function of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    TreeEnsemble(TreeEnsemble),
    Logistic(LogisticModel),
}

impl ModelSpec {
    fn positive_probability(&self, row: &[f64]) -> f64 {
        match self {
            Self::TreeEnsemble(m) => m.positive_probability(row),
            Self::Logistic(m) => m.positive_probability(row),
        }
    }
}

/// On-disk classifier artifact (`classifier.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub format_version: u32,
    pub name: String,
    pub version: String,
    pub feature_names: Vec<String>,
    pub model: ModelSpec,
}

impl ClassifierArtifact {
    /// Check format version, feature order and model structure.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ModelLoadError> {
        if self.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(ModelLoadError::UnsupportedVersion(self.format_version));
        }
        if self.feature_names.len() != FEATURE_COUNT {
            return Err(ModelLoadError::FeatureCount {
                found: self.feature_names.len(),
                expected: FEATURE_COUNT,
            });
        }
        if let Some((index, (found, expected))) = self
            .feature_names
            .iter()
            .zip(FEATURE_NAMES)
            .enumerate()
            .find(|(_, (found, expected))| found.as_str() != *expected)
        {
            return Err(ModelLoadError::FeatureOrderMismatch {
                index,
                expected,
                found: found.clone(),
            });
        }

        match &self.model {
            ModelSpec::TreeEnsemble(m) => m.validate(FEATURE_COUNT),
            ModelSpec::Logistic(m) => m.validate(FEATURE_COUNT),
        }
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// A validated artifact ready for inference.
#[derive(Debug, Clone)]
pub struct LoadedClassifier {
    descriptor: ModelDescriptor,
    model: ModelSpec,
}

impl LoadedClassifier {
    /// Validate an artifact and wrap it as a classifier handle.
    ///
    /// # Errors
    /// Returns error if the artifact fails validation.
    pub fn from_artifact(artifact: ClassifierArtifact) -> Result<Self, ModelLoadError> {
        artifact.validate()?;
        Ok(Self {
            descriptor: ModelDescriptor {
                name: artifact.name,
                version: artifact.version,
            },
            model: artifact.model,
        })
    }

    /// Parse and validate an artifact from JSON text.
    ///
    /// # Errors
    /// Returns error on malformed JSON or a failed validation.
    pub fn from_json_str(json: &str) -> Result<Self, ModelLoadError> {
        Self::from_artifact(serde_json::from_str(json)?)
    }

    fn check_rows(batch: &[&[f64]]) -> Result<(), ClassifierError> {
        for row in batch {
            if row.len() != FEATURE_COUNT {
                return Err(ClassifierError::ShapeMismatch {
                    got: row.len(),
                    expected: FEATURE_COUNT,
                });
            }
            if let Some(column) = row.iter().position(|v| !v.is_finite()) {
                return Err(ClassifierError::NonFinite { column });
            }
        }
        Ok(())
    }
}

impl ClassifierHandle for LoadedClassifier {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn n_features(&self) -> usize {
        FEATURE_COUNT
    }

    fn predict_class(&self, batch: &[&[f64]]) -> Result<Vec<u8>, ClassifierError> {
        Self::check_rows(batch)?;
        Ok(batch
            .iter()
            .map(|row| u8::from(self.model.positive_probability(row) > 0.5))
            .collect())
    }

    fn predict_probabilities(&self, batch: &[&[f64]]) -> Result<Vec<[f64; 2]>, ClassifierError> {
        Self::check_rows(batch)?;
        Ok(batch
            .iter()
            .map(|row| {
                let p = self.model.positive_probability(row);
                [1.0 - p, p]
            })
            .collect())
    }
}

/// Loads classifier artifacts from a model directory.
#[derive(Debug, Clone, Default)]
pub struct ModelLoader {
    verifying_key: Option<VerifyingKey>,
    allow_unsigned: bool,
}

impl ModelLoader {
    #[must_use]
    pub fn new(verifying_key: Option<VerifyingKey>) -> Self {
        Self {
            verifying_key,
            allow_unsigned: false,
        }
    }

    /// Permit unsigned artifacts. Ignored in release builds.
    #[must_use]
    pub fn allow_unsigned(mut self, allow: bool) -> Self {
        self.allow_unsigned = allow;
        self
    }

    /// Build a loader from settings, reading the verifying key file if set.
    ///
    /// # Errors
    /// Returns error if the key file is unreadable or malformed.
    pub fn from_settings(settings: &Settings) -> Result<Self, ModelLoadError> {
        let verifying_key = match &settings.signing_pubkey_file {
            Some(path) => {
                let b64 = fs::read_to_string(path).map_err(|source| ModelLoadError::Read {
                    path: path.clone(),
                    source,
                })?;
                Some(manifest::verifying_key_from_b64(&b64)?)
            }
            None => None,
        };
        Ok(Self::new(verifying_key).allow_unsigned(settings.allow_unsigned_models))
    }

    /// Load, verify and validate the artifact in `model_dir`.
    ///
    /// Signed directories are always verified. Unsigned ones are refused
    /// unless unsigned loading was allowed and this is a debug build.
    ///
    /// # Errors
    /// Returns error if verification, parsing or validation fails.
    pub fn load(&self, model_dir: &Path) -> Result<LoadedClassifier, ModelLoadError> {
        if manifest::is_signed(model_dir) {
            let key = self.verifying_key.as_ref().ok_or_else(|| {
                ModelLoadError::VerifyingKey(
                    "signed artifact but no verifying key configured".into(),
                )
            })?;
            SignedManifest::verify(model_dir, key)?;
        } else if cfg!(debug_assertions) && self.allow_unsigned {
            tracing::warn!(
                "Loading UNSIGNED classifier from {:?}. Only allowed in debug builds.",
                model_dir
            );
        } else {
            return Err(ModelLoadError::Unsigned(format!(
                "{:?} has no {}",
                model_dir,
                manifest::MANIFEST_FILE
            )));
        }

        let path = model_dir.join(ARTIFACT_FILE);
        let content = fs::read_to_string(&path).map_err(|source| ModelLoadError::Read {
            path: path.clone(),
            source,
        })?;
        let classifier = LoadedClassifier::from_json_str(&content)?;

        tracing::info!(
            "Loaded classifier {} {} from {:?}",
            classifier.descriptor.name,
            classifier.descriptor.version,
            path
        );
        Ok(classifier)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use tempfile::tempdir;

    /// Single-stump logistic artifact: P(class 1) = sigmoid(Oldpeak - 1).
    pub(crate) fn logistic_artifact() -> ClassifierArtifact {
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[5] = 1.0;
        ClassifierArtifact {
            format_version: 1,
            name: "test-logistic".into(),
            version: "0.0.1".into(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            model: ModelSpec::Logistic(LogisticModel {
                coefficients,
                intercept: -1.0,
                scaler_mean: None,
                scaler_std: None,
            }),
        }
    }

    fn write_artifact(dir: &Path, artifact: &ClassifierArtifact) {
        let json = serde_json::to_string_pretty(artifact).expect("serialize artifact");
        fs::write(dir.join(ARTIFACT_FILE), json).expect("write artifact");
    }

    #[test]
    fn test_shipped_artifact_is_valid() {
        let classifier =
            LoadedClassifier::from_json_str(include_str!("../../../models/classifier.json"))
                .expect("Shipped artifact should validate");
        assert_eq!(classifier.n_features(), 15);

        // Default form values: margin 0.1 - 0.1 + 0.45 + 0.25 = 0.7
        let row = [
            48.0, 140.0, 228.0, 1.0, 100.0, 2.5, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0,
        ];
        let probs = classifier.predict_probabilities(&[&row]).unwrap();
        assert!((probs[0][1] - sigmoid(0.7)).abs() < 1e-12);
        assert_eq!(classifier.predict_class(&[&row]).unwrap(), vec![1]);
    }

    #[test]
    fn test_permuted_feature_names_rejected() {
        let mut artifact = logistic_artifact();
        artifact.feature_names.swap(13, 14);
        match LoadedClassifier::from_artifact(artifact) {
            Err(ModelLoadError::FeatureOrderMismatch { index, expected, found }) => {
                assert_eq!(index, 13);
                assert_eq!(expected, "ST_Slope_Flat");
                assert_eq!(found, "ST_Slope_Up");
            }
            other => panic!("expected FeatureOrderMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_feature_count_and_version_checked() {
        let mut artifact = logistic_artifact();
        artifact.feature_names.push("Extra".into());
        assert!(matches!(
            artifact.validate(),
            Err(ModelLoadError::FeatureCount { found: 16, expected: 15 })
        ));

        let mut artifact = logistic_artifact();
        artifact.format_version = 2;
        assert!(matches!(
            artifact.validate(),
            Err(ModelLoadError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_probabilities_and_threshold() {
        let classifier = LoadedClassifier::from_artifact(logistic_artifact()).unwrap();
        let mut row = [0.0; FEATURE_COUNT];

        row[5] = 1.0; // margin 0 => exactly 0.5, class 0
        let probs = classifier.predict_probabilities(&[&row]).unwrap();
        assert_eq!(probs, vec![[0.5, 0.5]]);
        assert_eq!(classifier.predict_class(&[&row]).unwrap(), vec![0]);

        row[5] = 3.0;
        assert_eq!(classifier.predict_class(&[&row]).unwrap(), vec![1]);
    }

    #[test]
    fn test_batch_shape_checked() {
        let classifier = LoadedClassifier::from_artifact(logistic_artifact()).unwrap();
        let short = [0.0; 14];
        assert!(matches!(
            classifier.predict_class(&[&short]),
            Err(ClassifierError::ShapeMismatch { got: 14, expected: 15 })
        ));

        let mut nan = [0.0; FEATURE_COUNT];
        nan[2] = f64::NAN;
        assert!(matches!(
            classifier.predict_probabilities(&[&nan]),
            Err(ClassifierError::NonFinite { column: 2 })
        ));
    }

    #[test]
    fn test_artifact_json_tagging() {
        let json = serde_json::to_value(logistic_artifact()).unwrap();
        assert_eq!(json["model"]["kind"], "logistic");
        let back: ClassifierArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, logistic_artifact());
    }

    #[test]
    fn test_load_signed_directory() {
        let temp = tempdir().expect("tempdir");
        write_artifact(temp.path(), &logistic_artifact());

        let key = SigningKey::from_bytes(&[9u8; 32]);
        SignedManifest::for_files(temp.path(), &[ARTIFACT_FILE], 1)
            .unwrap()
            .write_signed(temp.path(), &key)
            .unwrap();

        let loader = ModelLoader::new(Some(key.verifying_key()));
        let classifier = loader.load(temp.path()).expect("Should load signed artifact");
        assert_eq!(classifier.descriptor().name, "test-logistic");

        // A signed directory without a configured key fails closed.
        let err = ModelLoader::default()
            .allow_unsigned(true)
            .load(temp.path())
            .unwrap_err();
        assert!(matches!(err, ModelLoadError::VerifyingKey(_)));
    }

    #[test]
    fn test_unsigned_directory_refused_by_default() {
        let temp = tempdir().expect("tempdir");
        write_artifact(temp.path(), &logistic_artifact());
        let err = ModelLoader::default().load(temp.path()).unwrap_err();
        assert!(matches!(err, ModelLoadError::Unsigned(_)));
    }

    #[cfg(debug_assertions)]
    #[test]
    fn test_unsigned_directory_allowed_in_debug() {
        let temp = tempdir().expect("tempdir");
        write_artifact(temp.path(), &logistic_artifact());
        let classifier = ModelLoader::default()
            .allow_unsigned(true)
            .load(temp.path())
            .expect("Should load unsigned artifact in debug builds");
        assert_eq!(classifier.descriptor().version, "0.0.1");
    }

    #[test]
    fn test_missing_artifact_is_read_error() {
        let temp = tempdir().expect("tempdir");
        let err = ModelLoader::default()
            .allow_unsigned(true)
            .load(temp.path())
            .unwrap_err();
        assert!(matches!(
            err,
            ModelLoadError::Read { .. } | ModelLoadError::Unsigned(_)
        ));
    }
}
