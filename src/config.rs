//! Environment-driven settings.
//!
//! | Variable | Default |
//! |---|---|
//! | `HEARTSENSE_MODEL_DIR` | `models` |
//! | `HEARTSENSE_ALLOW_UNSIGNED_MODELS` | `false` (debug builds only) |
//! | `HEARTSENSE_MODEL_SIGNING_PUBKEY_B64_FILE` | unset |
//! | `HEARTSENSE_LOG_MODE` | `stderr` (`stderr` or `file`) |
//! | `HEARTSENSE_LOG_FILE` | `heartsense.log` |

use std::path::PathBuf;

const MODEL_DIR_ENV: &str = "HEARTSENSE_MODEL_DIR";
const ALLOW_UNSIGNED_ENV: &str = "HEARTSENSE_ALLOW_UNSIGNED_MODELS";
const PUBKEY_FILE_ENV: &str = "HEARTSENSE_MODEL_SIGNING_PUBKEY_B64_FILE";
const LOG_MODE_ENV: &str = "HEARTSENSE_LOG_MODE";
const LOG_FILE_ENV: &str = "HEARTSENSE_LOG_FILE";

/// Where log output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    /// stdout carries results, so logs default to stderr
    #[default]
    Stderr,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `classifier.json` (and its manifest when signed)
    pub model_dir: PathBuf,

    /// Load unsigned artifacts. Honoured only in debug builds.
    pub allow_unsigned_models: bool,

    /// File containing the base64 Ed25519 verifying key for signed artifacts
    pub signing_pubkey_file: Option<PathBuf>,

    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            allow_unsigned_models: false,
            signing_pubkey_file: None,
            log_mode: LogMode::Stderr,
            log_file: PathBuf::from("heartsense.log"),
        }
    }
}

pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

impl Settings {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_mode = match lookup(LOG_MODE_ENV).as_deref().map(str::trim) {
            Some("file") => LogMode::File,
            Some("stderr") | None => LogMode::Stderr,
            Some(other) => {
                tracing::warn!("Unknown {LOG_MODE_ENV}={other:?}, using stderr");
                LogMode::Stderr
            }
        };

        Self {
            model_dir: lookup(MODEL_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            allow_unsigned_models: lookup(ALLOW_UNSIGNED_ENV)
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            signing_pubkey_file: lookup(PUBKEY_FILE_ENV)
                .map(|v| PathBuf::from(v.trim()))
                .filter(|p| !p.as_os_str().is_empty()),
            log_mode,
            log_file: lookup(LOG_FILE_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        }
    }
}
