//! repurpose-common — Shared types, errors, and configuration used across all repurpose crates.

pub mod error;
pub mod entities;
pub mod confidence;
pub mod features;
pub mod config;
pub mod sandbox;

// Re-export commonly used types
pub use confidence::ConfidenceTier;
pub use config::PipelineConfig;
pub use entities::{
    Adjustment, AdjustmentResult, Disease, Drug, FeatureSummary, MechanismClass, Prediction,
};
pub use error::{RepurposeError, Result};
pub use features::{FeatureSchema, FeatureVector, FEATURE_NAMES};
