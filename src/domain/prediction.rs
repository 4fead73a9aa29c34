//! Prediction result types.
//!
//! Represents the classifier's output after percentage rounding.

use serde::Serialize;

use super::patient::Gender;

/// Binary class predicted by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum PredictedClass {
    /// Class 0
    NoHeartDisease,
    /// Class 1
    HeartDisease,
}

impl PredictedClass {
    /// Map a raw classifier label. Anything other than 0 or 1 is `None`.
    #[must_use]
    pub fn from_label(label: u8) -> Option<Self> {
        match label {
            0 => Some(Self::NoHeartDisease),
            1 => Some(Self::HeartDisease),
            _ => None,
        }
    }

    /// Heading shown above the class probability.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoHeartDisease => "Not Heart Patient",
            Self::HeartDisease => "Heart Patient",
        }
    }

    /// Predicate half of the verdict sentence.
    #[must_use]
    pub const fn status(self) -> &'static str {
        match self {
            Self::NoHeartDisease => "is Not a Heart Patient",
            Self::HeartDisease => "is a Heart Patient",
        }
    }
}

impl From<PredictedClass> for u8 {
    fn from(class: PredictedClass) -> Self {
        match class {
            PredictedClass::NoHeartDisease => 0,
            PredictedClass::HeartDisease => 1,
        }
    }
}

/// Scale a probability to a whole percent.
///
/// Rounds half to even, so 0.125 becomes 12 and 0.875 becomes 88.
/// The caller guarantees `p` is finite and within [0, 1].
#[must_use]
pub fn to_percent(p: f64) -> u8 {
    (p * 100.0).round_ties_even() as u8
}

/// Classifier output for one patient.
///
/// The two percentages are rounded independently and may not sum to 100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub class: PredictedClass,

    /// Raw `[P(class 0), P(class 1)]` from the classifier
    pub probabilities: [f64; 2],

    /// `probabilities` scaled to whole percent
    pub percentages: [u8; 2],
}

impl PredictionResult {
    #[must_use]
    pub fn new(class: PredictedClass, probabilities: [f64; 2]) -> Self {
        Self {
            class,
            probabilities,
            percentages: [to_percent(probabilities[0]), to_percent(probabilities[1])],
        }
    }

    #[must_use]
    pub fn no_disease_percent(&self) -> u8 {
        self.percentages[0]
    }

    #[must_use]
    pub fn disease_percent(&self) -> u8 {
        self.percentages[1]
    }

    /// Verdict sentence, e.g. "She is a Heart Patient".
    #[must_use]
    pub fn sentence(&self, gender: Gender) -> String {
        format!("{} {}", gender.pronoun(), self.class.status())
    }
}
