//! Trait for per-pair feature computation.
//!
//! The scoring engine asks a `FeatureSource` for a name → value map for each
//! (drug, disease) pair and projects it onto the model's feature schema.

use async_trait::async_trait;
use repurpose_kg::opentargets::{OpenTargetsClient, TargetAssociation};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::weights::FeatureWeights;

/// Associated targets fetched per disease for overlap features.
pub const ASSOCIATION_LIMIT: usize = 500;

#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Named features for a (drug, disease) pair. Fields the source cannot
    /// compute are simply absent.
    async fn compute_features(&self, drug_id: &str, disease_id: &str) -> anyhow::Result<HashMap<String, f64>>;

    /// Auxiliary composite score in [0, 1] over the same features.
    fn composite_score(&self, features: &HashMap<String, f64>) -> anyhow::Result<f64>;
}

// ── OpenTargets-backed engine ───────────────────────────────────────────────

/// Features from drug targets (OpenTargets mechanisms of action) against
/// disease target associations.
///
/// Structure-derived fields (`mean_plddt`, `low_confidence_frac`) are not
/// produced and fall to the zero-fill path.
pub struct OpenTargetsFeatureEngine {
    client: Arc<OpenTargetsClient>,
    weights: FeatureWeights,
    associations: RwLock<HashMap<String, Arc<Vec<TargetAssociation>>>>,
}

impl OpenTargetsFeatureEngine {
    pub fn new(client: Arc<OpenTargetsClient>) -> Self {
        Self {
            client,
            weights: FeatureWeights::default(),
            associations: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_weights(mut self, mut weights: FeatureWeights) -> Self {
        if !weights.validate() {
            weights.normalise();
        }
        self.weights = weights;
        self
    }

    /// Disease associations, fetched once per disease.
    async fn associations_for(&self, disease_id: &str) -> anyhow::Result<Arc<Vec<TargetAssociation>>> {
        if let Some(hit) = self.associations.read().await.get(disease_id) {
            return Ok(hit.clone());
        }

        let fetched = Arc::new(self.client.disease_associations(disease_id, ASSOCIATION_LIMIT).await?);
        debug!(disease_id, targets = fetched.len(), "Fetched disease associations");
        self.associations
            .write()
            .await
            .insert(disease_id.to_string(), fetched.clone());
        Ok(fetched)
    }
}

#[async_trait]
impl FeatureSource for OpenTargetsFeatureEngine {
    #[instrument(skip(self))]
    async fn compute_features(&self, drug_id: &str, disease_id: &str) -> anyhow::Result<HashMap<String, f64>> {
        let (_, rows) = self.client.drug_mechanisms(drug_id).await?;
        let targets: HashSet<String> = rows
            .iter()
            .flat_map(|r| r.targets.iter().map(|t| t.id.clone()))
            .collect();
        let associations = self.associations_for(disease_id).await?;
        Ok(overlap_features(&targets, &associations))
    }

    fn composite_score(&self, features: &HashMap<String, f64>) -> anyhow::Result<f64> {
        self.weights.composite(features)
    }
}

/// Overlap features between a drug's targets and a disease's associated targets.
pub fn overlap_features(drug_targets: &HashSet<String>, associations: &[TargetAssociation]) -> HashMap<String, f64> {
    let shared: Vec<&TargetAssociation> = associations
        .iter()
        .filter(|a| drug_targets.contains(&a.target_id))
        .collect();

    let mut features = HashMap::new();
    features.insert("gene_overlap_count".to_string(), shared.len() as f64);
    features.insert(
        "max_association_score".to_string(),
        max_or_zero(shared.iter().map(|a| a.score)),
    );
    features.insert(
        "genetic_score".to_string(),
        max_or_zero(shared.iter().map(|a| a.genetic_score)),
    );
    features.insert(
        "somatic_score_raw".to_string(),
        max_or_zero(associations.iter().map(|a| a.somatic_score)),
    );
    features.insert(
        "somatic_score_masked".to_string(),
        max_or_zero(shared.iter().map(|a| a.somatic_score)),
    );
    features
}

fn max_or_zero(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0_f64, f64::max)
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// In-memory feature source keyed by drug id.
#[derive(Debug, Default, Clone)]
pub struct MockFeatureSource {
    features: HashMap<String, HashMap<String, f64>>,
    failing: HashSet<String>,
    composite_fails: bool,
    weights: FeatureWeights,
}

impl MockFeatureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Features returned for `drug_id` against any disease.
    pub fn with(mut self, drug_id: &str, features: &[(&str, f64)]) -> Self {
        self.features.insert(
            drug_id.to_string(),
            features.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        );
        self
    }

    pub fn failing(mut self, drug_id: &str) -> Self {
        self.failing.insert(drug_id.to_string());
        self
    }

    pub fn failing_composite(mut self) -> Self {
        self.composite_fails = true;
        self
    }
}

#[async_trait]
impl FeatureSource for MockFeatureSource {
    async fn compute_features(&self, drug_id: &str, _disease_id: &str) -> anyhow::Result<HashMap<String, f64>> {
        if self.failing.contains(drug_id) {
            anyhow::bail!("simulated feature failure for {drug_id}");
        }
        Ok(self.features.get(drug_id).cloned().unwrap_or_default())
    }

    fn composite_score(&self, features: &HashMap<String, f64>) -> anyhow::Result<f64> {
        if self.composite_fails {
            anyhow::bail!("simulated composite failure");
        }
        self.weights.composite(features)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
