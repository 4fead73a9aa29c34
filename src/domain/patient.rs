//! Patient form input for heart disease screening.
//!
//! Field domains follow the intake form: integer measurements with closed
//! ranges, one real-valued ST depression, and six categorical selections.

use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::HeartsenseError;

/// Declares a closed categorical field.
///
/// Each variant has one canonical display label plus optional aliases that
/// parse to it. Anything else is `UnknownCategory`, never a default.
macro_rules! categorical {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($field:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Form field name used in error messages.
            pub const FIELD: &'static str = $field;

            /// Every variant, in form option order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Canonical display label.
            #[must_use]
            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        impl FromStr for $name {
            type Err = HeartsenseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label $(| $alias)* => Ok(Self::$variant),)+
                    other => Err(HeartsenseError::UnknownCategory {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = HeartsenseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.label().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

categorical! {
    /// Fasting blood sugar bucket.
    pub enum FastingBloodSugar ("fastingBloodSugar") {
        AtMost120 => "≤120 mg/dl" | "<=120 mg/dl" | "Less Than 120 mg/dl",
        Above120 => ">120 mg/dl" | "Greater Than 120 mg/dl",
    }
}

categorical! {
    pub enum Gender ("gender") {
        Male => "Male",
        Female => "Female",
    }
}

categorical! {
    /// Chest pain type. `Asymptomatic` is the encoding baseline.
    pub enum ChestPainType ("chestPainType") {
        TypicalAngina => "Typical Angina",
        AtypicalAngina => "Atypical Angina",
        NonAnginalPain => "Non-anginal Pain",
        Asymptomatic => "Asymptomatic",
    }
}

categorical! {
    /// Resting electrocardiogram result. `Lvh` is the encoding baseline.
    pub enum RestingEcg ("restingECG") {
        Normal => "Normal",
        /// ST-T wave abnormality
        St => "ST",
        /// Left ventricular hypertrophy
        Lvh => "LVH",
    }
}

categorical! {
    pub enum ExerciseAngina ("exerciseAngina") {
        No => "No",
        Yes => "Yes",
    }
}

categorical! {
    /// Slope of the peak exercise ST segment. `Down` is the encoding baseline.
    pub enum StSlope ("stSlope") {
        Up => "Up",
        Flat => "Flat",
        Down => "Down",
    }
}

impl Gender {
    /// Subject pronoun used in the verdict sentence.
    #[must_use]
    pub const fn pronoun(self) -> &'static str {
        match self {
            Self::Male => "He",
            Self::Female => "She",
        }
    }
}

/// Closed ranges of the numeric form fields.
pub(crate) const AGE_RANGE: (i32, i32) = (1, 90);
pub(crate) const RESTING_BP_RANGE: (i32, i32) = (0, 200);
pub(crate) const CHOLESTEROL_RANGE: (i32, i32) = (0, 510);
pub(crate) const MAX_HEART_RATE_RANGE: (i32, i32) = (0, 200);
pub(crate) const OLD_PEAK_RANGE: (f64, f64) = (-3.0, 4.5);

/// One submission of the intake form.
///
/// Created per submission and dropped after encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawPatientInput {
    /// Age in years [1, 90]
    pub age: i32,

    /// Resting blood pressure in mm Hg [0, 200]
    pub resting_blood_pressure: i32,

    /// Serum cholesterol in mg/dl [0, 510]
    pub cholesterol: i32,

    pub fasting_blood_sugar: FastingBloodSugar,

    /// Maximum heart rate achieved during exercise [0, 200]
    pub max_heart_rate: i32,

    /// ST depression induced by exercise relative to rest [-3.0, 4.5]
    pub old_peak: f64,

    pub gender: Gender,

    pub chest_pain_type: ChestPainType,

    #[serde(rename = "restingECG")]
    pub resting_ecg: RestingEcg,

    pub exercise_angina: ExerciseAngina,

    pub st_slope: StSlope,
}

impl Default for RawPatientInput {
    /// The intake form's initial values.
    fn default() -> Self {
        Self {
            age: 48,
            resting_blood_pressure: 140,
            cholesterol: 228,
            fasting_blood_sugar: FastingBloodSugar::Above120,
            max_heart_rate: 100,
            old_peak: 2.5,
            gender: Gender::Male,
            chest_pain_type: ChestPainType::TypicalAngina,
            resting_ecg: RestingEcg::Normal,
            exercise_angina: ExerciseAngina::No,
            st_slope: StSlope::Up,
        }
    }
}

fn check_int(field: &'static str, value: i32, (min, max): (i32, i32)) -> crate::Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(HeartsenseError::OutOfRangeInput {
            field,
            value: f64::from(value),
            min: f64::from(min),
            max: f64::from(max),
        })
    }
}

impl RawPatientInput {
    /// Validate that every numeric field lies within its closed range.
    ///
    /// Values are never clamped.
    ///
    /// # Errors
    /// Returns `OutOfRangeInput` for the first offending field in form order,
    /// or `NonFiniteInput` if `oldPeak` is NaN or infinite.
    pub fn validate(&self) -> crate::Result<()> {
        check_int("age", self.age, AGE_RANGE)?;
        check_int("restingBloodPressure", self.resting_blood_pressure, RESTING_BP_RANGE)?;
        check_int("cholesterol", self.cholesterol, CHOLESTEROL_RANGE)?;
        check_int("maxHeartRate", self.max_heart_rate, MAX_HEART_RATE_RANGE)?;

        if !self.old_peak.is_finite() {
            return Err(HeartsenseError::NonFiniteInput { field: "oldPeak" });
        }
        let (min, max) = OLD_PEAK_RANGE;
        if !(min..=max).contains(&self.old_peak) {
            return Err(HeartsenseError::OutOfRangeInput {
                field: "oldPeak",
                value: self.old_peak,
                min,
                max,
            });
        }

        Ok(())
    }

    /// Read one form submission as JSON.
    ///
    /// Unknown fields and unknown category labels are rejected. Ranges are
    /// not checked here; call [`validate`](Self::validate).
    ///
    /// # Errors
    /// Returns `Io` if the reader fails, `Serialization` on malformed JSON.
    pub fn from_json_reader<R: Read>(mut reader: R) -> crate::Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(serde_json::from_str(&text)?)
    }
}
