//! Trained model and feature scaler contracts, plus the JSON artifacts the
//! CLI ships with.
//!
//! A `ModelBundle` is loaded once at startup and shared read-only by every
//! request; two bundles can coexist in one process.

use repurpose_common::{FeatureSchema, FeatureVector, RepurposeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::normalise::sigmoid;

/// Maps a feature vector (schema order) to a raw score or probability.
pub trait Model: Send + Sync {
    fn name(&self) -> &str;

    /// Feature names the model was trained on, in input order.
    fn feature_names(&self) -> &[String];

    fn predict(&self, features: &[f64]) -> anyhow::Result<f64>;
}

pub trait Scaler: Send + Sync {
    fn transform(&self, features: &[f64]) -> anyhow::Result<Vec<f64>>;
}

// ── Linear model artifact ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOutput {
    /// Emit the raw linear term
    #[default]
    Logit,
    /// Emit the logistic of the linear term
    Probability,
}

/// Logistic-regression style model: `w · x + b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    #[serde(default = "default_model_name")]
    pub name: String,
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub output: ModelOutput,
}

fn default_model_name() -> String { "Linear Classifier".to_string() }

impl LinearModel {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.weights.len() != self.feature_names.len() {
            anyhow::bail!(
                "{} weights for {} features",
                self.weights.len(),
                self.feature_names.len()
            );
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            anyhow::bail!("non-finite coefficient");
        }
        Ok(())
    }
}

impl Model for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> anyhow::Result<f64> {
        if features.len() != self.weights.len() {
            anyhow::bail!("expected {} features, got {}", self.weights.len(), features.len());
        }
        let z: f64 = features
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;

        Ok(match self.output {
            ModelOutput::Logit => z,
            ModelOutput::Probability => sigmoid(z),
        })
    }
}

// ── Standard scaler artifact ────────────────────────────────────────────────

/// `(x - mean) / scale` per feature. A zero scale leaves the centred value as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mean.len() != self.scale.len() {
            anyhow::bail!("mean has {} entries, scale has {}", self.mean.len(), self.scale.len());
        }
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> anyhow::Result<Vec<f64>> {
        if features.len() != self.mean.len() {
            anyhow::bail!("scaler expects {} features, got {}", self.mean.len(), features.len());
        }
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| if *s == 0.0 { x - m } else { (x - m) / s })
            .collect())
    }
}

// ── Bundle ──────────────────────────────────────────────────────────────────

/// Immutable model, optional scaler and the schema they agree on.
#[derive(Clone)]
pub struct ModelBundle {
    pub name: String,
    pub model: Arc<dyn Model>,
    pub scaler: Option<Arc<dyn Scaler>>,
    pub schema: FeatureSchema,
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("name", &self.name)
            .field("scaled", &self.scaler.is_some())
            .field("features", &self.schema.len())
            .finish()
    }
}

impl ModelBundle {
    /// Bundle a model with a scaler. The model's feature list must equal `schema`.
    pub fn new(
        model: Arc<dyn Model>,
        scaler: Option<Arc<dyn Scaler>>,
        schema: FeatureSchema,
    ) -> Result<Self> {
        if model.feature_names() != schema.names() {
            return Err(RepurposeError::StartupFatal(format!(
                "model features {:?} do not match schema {:?}",
                model.feature_names(),
                schema.names()
            )));
        }
        Ok(Self {
            name: model.name().to_string(),
            model,
            scaler,
            schema,
        })
    }

    /// Load `model_file` (required) and `scaler_file` (optional) from `dir`.
    pub fn load(dir: &Path, model_file: &str, scaler_file: &str) -> Result<Self> {
        let model_path = dir.join(model_file);
        if !model_path.exists() {
            return Err(RepurposeError::ModelNotFound(model_path.display().to_string()));
        }

        let model = load_model(&model_path).map_err(|e| {
            RepurposeError::StartupFatal(format!("invalid model {}: {e}", model_path.display()))
        })?;
        info!(path = %model_path.display(), model = %model.name, "Loaded model");

        let scaler_path = dir.join(scaler_file);
        let scaler: Option<Arc<dyn Scaler>> = if scaler_path.exists() {
            match load_scaler(&scaler_path) {
                Ok(s) => Some(Arc::new(s)),
                Err(e) => {
                    warn!(path = %scaler_path.display(), "Ignoring unreadable scaler: {e}");
                    None
                }
            }
        } else {
            None
        };

        Self::new(Arc::new(model), scaler, FeatureSchema::default())
    }

    /// Apply the scaler if present. A scaling failure returns the input unscaled.
    pub fn scale(&self, vector: &FeatureVector) -> FeatureVector {
        let Some(scaler) = &self.scaler else {
            return vector.clone();
        };
        match scaler.transform(vector.values()) {
            Ok(values) => vector.with_values(values),
            Err(e) => {
                warn!("Scaling failed, scoring unscaled: {e}");
                vector.clone()
            }
        }
    }
}

fn load_model(path: &Path) -> anyhow::Result<LinearModel> {
    let model: LinearModel = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    model.validate()?;
    Ok(model)
}

fn load_scaler(path: &Path) -> anyhow::Result<StandardScaler> {
    let scaler: StandardScaler = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    scaler.validate()?;
    Ok(scaler)
}

// ── Mock Implementation for Testing ────────────────────────────────────────

type PredictFn = dyn Fn(&[f64]) -> anyhow::Result<f64> + Send + Sync;

/// Model backed by a closure.
pub struct MockModel {
    feature_names: Vec<String>,
    predict: Box<PredictFn>,
}

impl MockModel {
    pub fn from_fn(
        schema: &FeatureSchema,
        predict: impl Fn(&[f64]) -> anyhow::Result<f64> + Send + Sync + 'static,
    ) -> Self {
        Self {
            feature_names: schema.names().to_vec(),
            predict: Box::new(predict),
        }
    }
}

impl Model for MockModel {
    fn name(&self) -> &str {
        "Mock Model"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[f64]) -> anyhow::Result<f64> {
        (self.predict)(features)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use repurpose_common::FEATURE_NAMES;

    fn linear(weights: Vec<f64>, bias: f64, output: ModelOutput) -> LinearModel {
        LinearModel {
            name: "test".into(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            weights,
            bias,
            output,
        }
    }

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_linear_predict() {
        let m = linear(vec![1.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0], 0.5, ModelOutput::Logit);
        let z = m.predict(&[0.5, 9.0, 9.0, 0.25, 9.0, 9.0, 9.0]).unwrap();
        assert!((z - 1.5).abs() < 1e-12);

        let p = linear(vec![0.0; 7], 0.0, ModelOutput::Probability);
        assert!((p.predict(&[1.0; 7]).unwrap() - 0.5).abs() < 1e-12);
        assert!(p.predict(&[1.0; 3]).is_err());
    }

    #[test]
    fn test_scaler_transform() {
        let s = StandardScaler { mean: vec![1.0, 2.0], scale: vec![2.0, 0.0] };
        assert_eq!(s.transform(&[3.0, 5.0]).unwrap(), vec![1.0, 3.0]);
        assert!(s.transform(&[1.0]).is_err());
    }

    #[test]
    fn test_missing_model_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelBundle::load(dir.path(), "model.json", "feature_scaler.json").unwrap_err();
        assert!(matches!(err, RepurposeError::ModelNotFound(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_model_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "model.json", r#"{"feature_names": ["a"], "weights": [1.0, 2.0]}"#);
        let err = ModelBundle::load(dir.path(), "model.json", "scaler.json").unwrap_err();
        assert!(matches!(err, RepurposeError::StartupFatal(_)));

        write(dir.path(), "model.json", "not json");
        let err = ModelBundle::load(dir.path(), "model.json", "scaler.json").unwrap_err();
        assert!(matches!(err, RepurposeError::StartupFatal(_)));
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "model.json", r#"{"feature_names": ["a", "b"], "weights": [1.0, 2.0]}"#);
        let err = ModelBundle::load(dir.path(), "model.json", "scaler.json").unwrap_err();
        assert!(matches!(err, RepurposeError::StartupFatal(_)));
    }

    #[test]
    fn test_load_with_and_without_scaler() {
        let dir = tempfile::tempdir().unwrap();
        let model = linear(vec![0.1; 7], -0.2, ModelOutput::Logit);
        write(dir.path(), "model.json", &serde_json::to_string(&model).unwrap());

        let bundle = ModelBundle::load(dir.path(), "model.json", "feature_scaler.json").unwrap();
        assert!(bundle.scaler.is_none());
        assert_eq!(bundle.name, "test");

        write(dir.path(), "feature_scaler.json", r#"{"mean": [0.0], "scale": [1.0, 2.0]}"#);
        let bundle = ModelBundle::load(dir.path(), "model.json", "feature_scaler.json").unwrap();
        assert!(bundle.scaler.is_none(), "invalid scaler is dropped");

        write(dir.path(), "feature_scaler.json", r#"{"mean": [0,0,0,0,0,0,0], "scale": [2,2,2,2,2,2,2]}"#);
        let bundle = ModelBundle::load(dir.path(), "model.json", "feature_scaler.json").unwrap();
        let scaled = bundle.scale(&FeatureVector::from_values(vec![2.0; 7]));
        assert_eq!(scaled.values(), &[1.0; 7]);
    }

    #[test]
    fn test_scale_failure_falls_back_to_unscaled() {
        let schema = FeatureSchema::default();
        let bundle = ModelBundle::new(
            Arc::new(MockModel::from_fn(&schema, |_| Ok(0.5))),
            Some(Arc::new(StandardScaler { mean: vec![0.0; 2], scale: vec![1.0; 2] })),
            schema,
        )
        .unwrap();
        let v = FeatureVector::from_values(vec![3.0; 7]);
        assert_eq!(bundle.scale(&v).values(), v.values());
    }
}
