//! Scaler and model seams, and the adapter that chains them.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::features::FeatureVector;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassificationError {
    #[error("Expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Non-finite value at feature {index}")]
    NonFinite { index: usize },
    #[error("Model output is not finite")]
    NonFiniteScore,
    #[error("Prediction {0} is not a class label")]
    InvalidPrediction(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Benign,
    Malicious,
}

impl Label {
    pub fn from_prediction(prediction: i64) -> Result<Self, ClassificationError> {
        match prediction {
            0 => Ok(Label::Benign),
            1 => Ok(Label::Malicious),
            other => Err(ClassificationError::InvalidPrediction(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Benign => "benign",
            Label::Malicious => "malicious",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature normalization fit alongside the model.
pub trait Scaler: Send + Sync {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, ClassificationError>;
}

/// Binary classifier over scaled features. Returns the raw class prediction.
pub trait Model: Send + Sync {
    fn predict(&self, scaled: &[f64]) -> Result<i64, ClassificationError>;
}

/// Scales a feature vector and labels it. Shared read-only across threads.
#[derive(Clone)]
pub struct ClassifierAdapter {
    scaler: Arc<dyn Scaler>,
    model: Arc<dyn Model>,
}

impl ClassifierAdapter {
    pub fn new(scaler: Arc<dyn Scaler>, model: Arc<dyn Model>) -> Self {
        Self { scaler, model }
    }

    pub fn classify(&self, features: &FeatureVector) -> Result<Label, ClassificationError> {
        let scaled = self.scaler.transform(features.as_slice())?;
        if let Some(index) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(ClassificationError::NonFinite { index });
        }
        Label::from_prediction(self.model.predict(&scaled)?)
    }
}

impl fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierAdapter").finish_non_exhaustive()
    }
}
