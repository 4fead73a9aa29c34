//! Feature encoding for the heart disease classifier.
//!
//! The classifier was trained on a drop-first one-hot frame. Column order is
//! part of the model contract: a permuted vector still scores, just wrongly.
//! Loaded artifacts are checked against `FEATURE_NAMES` for that reason.

use serde::Serialize;

use super::patient::{
    ChestPainType, ExerciseAngina, FastingBloodSugar, Gender, RawPatientInput, RestingEcg,
    StSlope,
};
use crate::HeartsenseError;

/// Number of columns the classifier consumes.
pub const FEATURE_COUNT: usize = 15;

/// Column names in classifier order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Age",
    "RestingBP",
    "Cholesterol",
    "FastingBS",
    "MaxHR",
    "Oldpeak",
    "Sex_M",
    "ChestPainType_ATA",
    "ChestPainType_NAP",
    "ChestPainType_TA",
    "RestingECG_Normal",
    "RestingECG_ST",
    "ExerciseAngina_Y",
    "ST_Slope_Flat",
    "ST_Slope_Up",
];

// Encoding tables. Baseline categories map to all-zero groups.

impl FastingBloodSugar {
    #[must_use]
    pub fn flag(self) -> f64 {
        match self {
            Self::AtMost120 => 0.0,
            Self::Above120 => 1.0,
        }
    }
}

impl Gender {
    #[must_use]
    pub fn flag(self) -> f64 {
        match self {
            Self::Female => 0.0,
            Self::Male => 1.0,
        }
    }
}

impl ChestPainType {
    /// `[atypical, non-anginal, typical]`
    #[must_use]
    pub fn one_hot(self) -> [f64; 3] {
        match self {
            Self::Asymptomatic => [0.0, 0.0, 0.0],
            Self::AtypicalAngina => [1.0, 0.0, 0.0],
            Self::NonAnginalPain => [0.0, 1.0, 0.0],
            Self::TypicalAngina => [0.0, 0.0, 1.0],
        }
    }
}

impl RestingEcg {
    /// `[normal, st]`
    #[must_use]
    pub fn one_hot(self) -> [f64; 2] {
        match self {
            Self::Lvh => [0.0, 0.0],
            Self::Normal => [1.0, 0.0],
            Self::St => [0.0, 1.0],
        }
    }
}

impl ExerciseAngina {
    #[must_use]
    pub fn flag(self) -> f64 {
        match self {
            Self::No => 0.0,
            Self::Yes => 1.0,
        }
    }
}

impl StSlope {
    /// `[flat, up]`
    #[must_use]
    pub fn one_hot(self) -> [f64; 2] {
        match self {
            Self::Down => [0.0, 0.0],
            Self::Flat => [1.0, 0.0],
            Self::Up => [0.0, 1.0],
        }
    }
}

/// Model-ready feature row in `FEATURE_NAMES` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EncodedFeatureVector([f64; FEATURE_COUNT]);

impl EncodedFeatureVector {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn into_array(self) -> [f64; FEATURE_COUNT] {
        self.0
    }

    /// Pair each value with its column name.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

impl TryFrom<&[f64]> for EncodedFeatureVector {
    type Error = HeartsenseError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let row: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| {
            HeartsenseError::InvalidFeatureVector(format!(
                "expected {FEATURE_COUNT} features, got {}",
                values.len()
            ))
        })?;
        if let Some(i) = row.iter().position(|v| !v.is_finite()) {
            return Err(HeartsenseError::InvalidFeatureVector(format!(
                "{} is not finite",
                FEATURE_NAMES[i]
            )));
        }
        Ok(Self(row))
    }
}

/// Encode one form submission into the classifier's feature order.
///
/// Range validation is `RawPatientInput::validate`'s job; this only rejects
/// values that cannot be represented (non-finite `oldPeak`).
///
/// # Errors
/// Returns `NonFiniteInput` if `oldPeak` is NaN or infinite.
pub fn encode(input: &RawPatientInput) -> crate::Result<EncodedFeatureVector> {
    if !input.old_peak.is_finite() {
        return Err(HeartsenseError::NonFiniteInput { field: "oldPeak" });
    }

    let [cp_atypical, cp_non_anginal, cp_typical] = input.chest_pain_type.one_hot();
    let [ecg_normal, ecg_st] = input.resting_ecg.one_hot();
    let [slope_flat, slope_up] = input.st_slope.one_hot();

    Ok(EncodedFeatureVector([
        f64::from(input.age),
        f64::from(input.resting_blood_pressure),
        f64::from(input.cholesterol),
        input.fasting_blood_sugar.flag(),
        f64::from(input.max_heart_rate),
        input.old_peak,
        input.gender.flag(),
        cp_atypical,
        cp_non_anginal,
        cp_typical,
        ecg_normal,
        ecg_st,
        input.exercise_angina.flag(),
        slope_flat,
        slope_up,
    ]))
}
