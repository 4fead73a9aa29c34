//! Domain layer: Core types and logic.
//!
//! This module contains pure Rust types with no I/O.
//! Categorical inputs are closed enums; numeric inputs are range-checked.

mod features;
mod patient;
mod prediction;

pub use features::{encode, EncodedFeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use patient::{
    ChestPainType, ExerciseAngina, FastingBloodSugar, Gender, RawPatientInput, RestingEcg,
    StSlope,
};
pub use prediction::{to_percent, PredictedClass, PredictionResult};
