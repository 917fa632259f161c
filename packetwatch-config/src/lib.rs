//! # Packetwatch Configuration System
//!
//! Hierarchical configuration for the capture-and-classification pipeline.
//!
//! ## Features
//! - **Unified Configuration**: one document for capture, pipeline pacing,
//!   model artifacts and telemetry
//! - **Validation**: runtime validation of every tunable before the pipeline
//!   is built
//! - **Environment Awareness**: per-environment YAML overrides and
//!   `PACKETWATCH_*` variables

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod capture;
mod error;
mod model;
mod pipeline;
mod telemetry;
mod validation;

pub use capture::{CaptureConfig, CaptureMode};
pub use error::ConfigError;
pub use model::ModelConfig;
pub use pipeline::PipelineConfig;
pub use telemetry::TelemetryConfig;

/// Base configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config/packetwatch.yaml";

/// Prefix for environment overrides, e.g. `PACKETWATCH_PIPELINE__BATCH_SIZE=10`.
pub const ENV_PREFIX: &str = "PACKETWATCH_";

/// Top‑level configuration container for all Packetwatch components.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct PacketwatchConfig {
    /// Packet acquisition parameters.
    #[validate(nested)]
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Batch sizing, pacing and backoff of the capture loop.
    #[validate(nested)]
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Classifier and scaler artifacts.
    #[validate(nested)]
    #[serde(default)]
    pub model: ModelConfig,

    /// Logging configuration.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl PacketwatchConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/packetwatch.yaml`, if present
    /// 3. `config/<PACKETWATCH_ENV>.yaml`, if present
    /// 4. `PACKETWATCH_*` environment variables (`__` separates sections)
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(PacketwatchConfig::default()));

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            figment = figment.merge(Yaml::file(DEFAULT_CONFIG_FILE));
        }

        let env = std::env::var("PACKETWATCH_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific YAML file plus environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::extract(
            Figment::from(Serialized::defaults(PacketwatchConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(|config: Self| {
                config.validate()?;
                config.capture.check_mode_requirements()?;
                Ok(config)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn full_config_validation() {
        let config = PacketwatchConfig::default();
        config.validate().expect("Default config should validate");
    }

    #[test]
    fn environment_override() {
        Jail::expect_with(|jail| {
            jail.set_env("PACKETWATCH_PIPELINE__BATCH_SIZE", "10");
            let config = PacketwatchConfig::load().expect("config loads");
            assert_eq!(config.pipeline.batch_size, 10);
            Ok(())
        });
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "watch.yaml",
                r#"
capture:
  mode: synthetic
  interface: eth0
  read_timeout_ms: 50
pipeline:
  pacing_ms: 10
model:
  model_path: artifacts/model.json
"#,
            )?;
            let config = PacketwatchConfig::load_from_path("watch.yaml").expect("config loads");
            assert_eq!(config.capture.mode, CaptureMode::Synthetic);
            assert_eq!(config.capture.interface.as_deref(), Some("eth0"));
            assert_eq!(config.capture.read_timeout_ms, 50);
            assert_eq!(config.pipeline.pacing_ms, 10);
            assert_eq!(config.pipeline.batch_size, 50);
            assert_eq!(
                config.model.model_path,
                PathBuf::from("artifacts/model.json")
            );
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_reported() {
        let err = PacketwatchConfig::load_from_path("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        Jail::expect_with(|jail| {
            jail.create_file("bad.yaml", "pipeline:\n  batch_size: 0\n")?;
            let err = PacketwatchConfig::load_from_path("bad.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)));
            Ok(())
        });
    }

    #[test]
    fn file_mode_requires_a_path() {
        Jail::expect_with(|jail| {
            jail.create_file("file.yaml", "capture:\n  mode: file\n")?;
            let err = PacketwatchConfig::load_from_path("file.yaml").unwrap_err();
            assert!(matches!(err, ConfigError::MissingCaptureFile));
            Ok(())
        });
    }

    #[test]
    fn npcap_interface_from_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "windows.yaml",
                "capture:\n  interface: '\\Device\\NPF_{4E27B4D1-6A2C-4F0B-9D4E-3C1A2B5D7E90}'\n",
            )?;
            let config = PacketwatchConfig::load_from_path("windows.yaml").expect("config loads");
            assert_eq!(
                config.capture.interface.as_deref(),
                Some(r"\Device\NPF_{4E27B4D1-6A2C-4F0B-9D4E-3C1A2B5D7E90}")
            );
            Ok(())
        });
    }
}
