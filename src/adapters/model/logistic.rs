//! Logistic regression with optional feature standardization.

use serde::{Deserialize, Serialize};

use super::{sigmoid, ModelLoadError};

/// Linear model exported with its scaler.
///
/// `z_i = (x_i - scaler_mean_i) / scaler_std_i` when the scaler is present,
/// otherwise `z_i = x_i`. P(class 1) = sigmoid(w · z + intercept).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler_mean: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler_std: Option<Vec<f64>>,
}

impl LogisticModel {
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), ModelLoadError> {
        if self.coefficients.len() != n_features {
            return Err(ModelLoadError::Structure(format!(
                "coefficients has {} entries, expected {n_features}",
                self.coefficients.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelLoadError::Structure("non-finite model parameter".into()));
        }

        match (&self.scaler_mean, &self.scaler_std) {
            (None, None) => {}
            (Some(mean), Some(std)) => {
                if mean.len() != n_features || std.len() != n_features {
                    return Err(ModelLoadError::Structure(
                        "scaler lengths do not match coefficients".into(),
                    ));
                }
                if mean.iter().any(|m| !m.is_finite()) {
                    return Err(ModelLoadError::Structure("non-finite scaler mean".into()));
                }
                if std.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
                    return Err(ModelLoadError::Structure(
                        "scaler_std entries must be finite and > 0".into(),
                    ));
                }
            }
            _ => {
                return Err(ModelLoadError::Structure(
                    "scaler_mean and scaler_std must be given together".into(),
                ));
            }
        }
        Ok(())
    }

    /// Linear score (log-odds) for one row.
    #[must_use]
    pub fn decision(&self, row: &[f64]) -> f64 {
        let dot: f64 = match (&self.scaler_mean, &self.scaler_std) {
            (Some(mean), Some(std)) => row
                .iter()
                .zip(mean.iter().zip(std))
                .zip(&self.coefficients)
                .map(|((x, (m, s)), w)| w * (x - m) / s)
                .sum(),
            _ => row.iter().zip(&self.coefficients).map(|(x, w)| w * x).sum(),
        };
        dot + self.intercept
    }

    /// P(class 1) for one row.
    #[must_use]
    pub fn positive_probability(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_without_scaler() {
        let model = LogisticModel {
            coefficients: vec![0.5, -1.0],
            intercept: 0.25,
            scaler_mean: None,
            scaler_std: None,
        };
        assert!((model.decision(&[2.0, 1.0]) - 0.25).abs() < 1e-12);
        assert!((model.positive_probability(&[0.0, 0.25]) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_decision_with_scaler() {
        let model = LogisticModel {
            coefficients: vec![2.0],
            intercept: 0.0,
            scaler_mean: Some(vec![50.0]),
            scaler_std: Some(vec![10.0]),
        };
        // (60 - 50) / 10 * 2 = 2
        assert!((model.decision(&[60.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate() {
        let mut model = LogisticModel {
            coefficients: vec![1.0, 1.0],
            intercept: 0.0,
            scaler_mean: Some(vec![0.0, 0.0]),
            scaler_std: Some(vec![1.0, 0.0]),
        };
        assert!(model.validate(2).is_err());

        model.scaler_std = Some(vec![1.0, 1.0]);
        assert!(model.validate(2).is_ok());
        assert!(model.validate(3).is_err());

        model.scaler_std = None;
        assert!(model.validate(2).is_err());
    }
}
