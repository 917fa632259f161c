//! Locations of the persisted classifier artifacts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{self, Validate, ValidationError};

/// Model and scaler artifact paths, read once at startup.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ModelConfig {
    #[validate(custom(function = validate_path))]
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    #[validate(custom(function = validate_path))]
    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("results/model.json")
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from("results/scaler.json")
}

fn validate_path(path: &PathBuf) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("empty_path"));
    }
    Ok(())
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            scaler_path: default_scaler_path(),
        }
    }
}
