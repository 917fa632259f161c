//! # Packetwatch Detection
//!
//! Turns decoded packets into feature vectors and labels them with a trained
//! classifier.
//!
//! - `features`: the fixed 13-feature layout and the per-packet extractor
//! - `classifier`: the `Scaler`/`Model` seams and the adapter that chains them
//! - `artifacts`: JSON-backed standard scaler and linear model

pub mod artifacts;
pub mod classifier;
pub mod features;

pub use artifacts::{load_classifier, ArtifactError, LinearModel, StandardScaler};
pub use classifier::{ClassificationError, ClassifierAdapter, Label, Model, Scaler};
pub use features::{FeatureExtractor, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
