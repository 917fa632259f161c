//! JSON classifier artifacts.
//!
//! The scaler file records the feature order it was fit with and is rejected
//! when that order differs from [`FEATURE_NAMES`]. The model file is tagged by
//! `kind`; only `linear` (logistic regression) is understood.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use packetwatch_config::ModelConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::classifier::{ClassificationError, ClassifierAdapter, Model, Scaler};
use crate::features::{FEATURE_COUNT, FEATURE_NAMES};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {0}")]
    Missing(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Corrupt artifact {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Scaler was fit on features {found:?}, expected {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("{field} has {actual} values, expected {expected}")]
    Shape {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Threshold {0} is outside [0, 1]")]
    Threshold(f64),
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ArtifactError::Missing(path.to_path_buf()),
        _ => ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    serde_json::from_str(&raw).map_err(|source| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

fn check_len(field: &'static str, values: &[f64]) -> Result<(), ArtifactError> {
    if values.len() != FEATURE_COUNT {
        return Err(ArtifactError::Shape {
            field,
            expected: FEATURE_COUNT,
            actual: values.len(),
        });
    }
    Ok(())
}

/// `(x - mean) / scale` per feature. A zero scale leaves the centered value
/// as is.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        let scaler = Self {
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            mean,
            scale,
        };
        scaler.check()?;
        Ok(scaler)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let scaler: Self = read_json(path.as_ref())?;
        scaler.check()?;
        Ok(scaler)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(ArtifactError::FeatureMismatch {
                expected: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
                found: self.feature_names.clone(),
            });
        }
        check_len("mean", &self.mean)?;
        check_len("scale", &self.scale)
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ClassificationError> {
        if features.len() != self.mean.len() {
            return Err(ClassificationError::ShapeMismatch {
                expected: self.mean.len(),
                actual: features.len(),
            });
        }
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}

/// Logistic regression: malicious when `sigmoid(w·x + b) >= threshold`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    coefficients: Vec<f64>,
    intercept: f64,
    #[serde(default = "default_threshold")]
    threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ModelArtifact {
    Linear(LinearModel),
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64, threshold: f64) -> Result<Self, ArtifactError> {
        let model = Self {
            coefficients,
            intercept,
            threshold,
        };
        model.check()?;
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let ModelArtifact::Linear(model): ModelArtifact = read_json(path.as_ref())?;
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        check_len("coefficients", &self.coefficients)?;
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ArtifactError::Threshold(self.threshold));
        }
        Ok(())
    }

    /// Probability of the malicious class.
    pub fn probability(&self, scaled: &[f64]) -> Result<f64, ClassificationError> {
        if scaled.len() != self.coefficients.len() {
            return Err(ClassificationError::ShapeMismatch {
                expected: self.coefficients.len(),
                actual: scaled.len(),
            });
        }
        let z: f64 = self.intercept
            + scaled
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>();
        let p = 1.0 / (1.0 + (-z).exp());
        if p.is_nan() {
            return Err(ClassificationError::NonFiniteScore);
        }
        Ok(p)
    }
}

impl Model for LinearModel {
    fn predict(&self, scaled: &[f64]) -> Result<i64, ClassificationError> {
        Ok(i64::from(self.probability(scaled)? >= self.threshold))
    }
}

/// Loads both artifacts named in `config` into a ready classifier.
pub fn load_classifier(config: &ModelConfig) -> Result<ClassifierAdapter, ArtifactError> {
    let scaler = StandardScaler::load(&config.scaler_path)?;
    let model = LinearModel::load(&config.model_path)?;
    info!(
        model = %config.model_path.display(),
        scaler = %config.scaler_path.display(),
        "classifier artifacts loaded"
    );
    Ok(ClassifierAdapter::new(Arc::new(scaler), Arc::new(model)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;
    use crate::features::FeatureVector;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write(value: serde_json::Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{value}").unwrap();
        file
    }

    fn scaler_json() -> serde_json::Value {
        let mean = [100.0; FEATURE_COUNT];
        json!({
            "feature_names": FEATURE_NAMES,
            "mean": mean,
            "scale": [10.0, 10.0, 10.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 4.0, 4.0],
        })
    }

    /// Weights only the SYN and FIN columns.
    fn model_json() -> serde_json::Value {
        let mut coefficients = [0.0; FEATURE_COUNT];
        coefficients[7] = 5.0;
        coefficients[9] = 5.0;
        json!({
            "kind": "linear",
            "coefficients": coefficients,
            "intercept": 0.0,
            "threshold": 0.5,
        })
    }

    fn config(model: &NamedTempFile, scaler: &NamedTempFile) -> ModelConfig {
        ModelConfig {
            model_path: model.path().to_path_buf(),
            scaler_path: scaler.path().to_path_buf(),
        }
    }

    #[test]
    fn loads_and_classifies() {
        let model = write(model_json());
        let scaler = write(scaler_json());
        let classifier = load_classifier(&config(&model, &scaler)).unwrap();

        // Flag columns are centered at 100 with unit scale.
        let mut values = [0.0; FEATURE_COUNT];
        assert_eq!(
            classifier.classify(&FeatureVector::new(values)).unwrap(),
            Label::Benign
        );
        values[7] = 200.0;
        values[9] = 100.0;
        assert_eq!(
            classifier.classify(&FeatureVector::new(values)).unwrap(),
            Label::Malicious
        );
    }

    #[test]
    fn zero_scale_is_treated_as_one() {
        let scaler = StandardScaler::load(write(scaler_json()).path()).unwrap();
        let scaled = scaler.transform(&[100.0; FEATURE_COUNT]).unwrap();
        assert!(scaled.iter().all(|v| *v == 0.0));

        let scaled = scaler.transform(&[101.0; FEATURE_COUNT]).unwrap();
        assert_eq!(scaled[0], 0.1);
        assert_eq!(scaled[4], 1.0);
    }

    #[test]
    fn missing_artifact() {
        let err = StandardScaler::load("/nonexistent/scaler.json").unwrap_err();
        assert!(matches!(err, ArtifactError::Missing(_)));
    }

    #[test]
    fn corrupt_artifact() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            LinearModel::load(file.path()).unwrap_err(),
            ArtifactError::Corrupt { .. }
        ));
    }

    #[test]
    fn unknown_model_kind_is_rejected() {
        let mut model = model_json();
        model["kind"] = json!("forest");
        assert!(matches!(
            LinearModel::load(write(model).path()).unwrap_err(),
            ArtifactError::Corrupt { .. }
        ));
    }

    #[test]
    fn feature_order_must_match() {
        let mut scaler = scaler_json();
        scaler["feature_names"][0] = json!("pkt_size_max");
        scaler["feature_names"][1] = json!("pkt_size_min");
        assert!(matches!(
            StandardScaler::load(write(scaler).path()).unwrap_err(),
            ArtifactError::FeatureMismatch { .. }
        ));
    }

    #[test]
    fn coefficient_count_must_match() {
        let err = LinearModel::new(vec![1.0; 3], 0.0, 0.5).unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::Shape {
                field: "coefficients",
                expected: FEATURE_COUNT,
                actual: 3
            }
        ));
    }

    #[test]
    fn threshold_out_of_range() {
        assert!(matches!(
            LinearModel::new(vec![0.0; FEATURE_COUNT], 0.0, 1.5).unwrap_err(),
            ArtifactError::Threshold(_)
        ));
    }

    #[test]
    fn input_shape_mismatch() {
        let scaler = StandardScaler::new(vec![0.0; FEATURE_COUNT], vec![1.0; FEATURE_COUNT]).unwrap();
        assert_eq!(
            scaler.transform(&[1.0, 2.0]).unwrap_err(),
            ClassificationError::ShapeMismatch {
                expected: FEATURE_COUNT,
                actual: 2
            }
        );
    }
}
