//! Per-candidate scoring: features → schema vector → scaler → model → probability.

use futures_util::stream::{self, StreamExt};
use repurpose_common::{Drug, FeatureVector, Prediction, RepurposeError, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::features::FeatureSource;
use crate::model::ModelBundle;
use crate::normalise::to_probability;

/// Outcome of scoring a candidate batch.
#[derive(Debug, Default)]
pub struct ScoringReport {
    /// Surviving candidates, in input order.
    pub predictions: Vec<Prediction>,
    /// One `CandidateComputation` error per skipped candidate.
    pub skipped: Vec<RepurposeError>,
}

pub struct ScoringEngine {
    features: Arc<dyn FeatureSource>,
    bundle: Arc<ModelBundle>,
    concurrency: usize,
}

impl ScoringEngine {
    pub fn new(features: Arc<dyn FeatureSource>, bundle: Arc<ModelBundle>) -> Self {
        Self { features, bundle, concurrency: 1 }
    }

    /// Score up to `n` candidates at once. Output order is unaffected.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Score every candidate; failures skip the candidate, never the batch.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn score_all(&self, candidates: &[Drug], disease_id: &str) -> ScoringReport {
        let results: Vec<Result<Prediction>> = stream::iter(candidates.iter().cloned())
            .map(|drug| self.score_one(drug, disease_id))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut report = ScoringReport::default();
        for result in results {
            match result {
                Ok(p) => report.predictions.push(p),
                Err(e) => {
                    warn!("Skipping candidate: {e}");
                    report.skipped.push(e);
                }
            }
        }

        info!(
            scored = report.predictions.len(),
            skipped = report.skipped.len(),
            "Scoring complete"
        );
        report
    }

    /// Score one candidate.
    pub async fn score_one(&self, drug: Drug, disease_id: &str) -> Result<Prediction> {
        let skip = |reason: String| RepurposeError::CandidateComputation {
            drug_id: drug.id.clone(),
            reason,
        };

        let map = self
            .features
            .compute_features(&drug.id, disease_id)
            .await
            .map_err(|e| skip(format!("features: {e}")))?;

        let schema = &self.bundle.schema;
        let vector = FeatureVector::from_map(schema, &map);
        if !vector.missing().is_empty() {
            debug!(drug_id = %drug.id, missing = ?vector.missing(), "Zero-filled missing features");
        }
        if !vector.unknown().is_empty() {
            debug!(drug_id = %drug.id, unknown = ?vector.unknown(), "Ignoring features outside the schema");
        }

        let input = self.bundle.scale(&vector);
        let raw = self
            .bundle
            .model
            .predict(input.values())
            .map_err(|e| skip(format!("inference: {e}")))?;
        if !raw.is_finite() {
            return Err(skip(format!("inference returned {raw}")));
        }

        let probability = to_probability(raw);
        let composite = match self.features.composite_score(&map) {
            Ok(c) if c.is_finite() => Some(c.clamp(0.0, 1.0)),
            Ok(c) => {
                debug!(drug_id = %drug.id, "Composite score not finite: {c}");
                None
            }
            Err(e) => {
                debug!(drug_id = %drug.id, "Composite score unavailable: {e}");
                None
            }
        };

        let summary = vector.summary(schema);
        let missing = vector.missing().to_vec();
        let mut prediction = Prediction::scored(drug, probability, summary, missing);
        prediction.composite_score = composite;
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::MockFeatureSource;
    use crate::model::MockModel;
    use repurpose_common::FeatureSchema;

    /// Model that returns `genetic_score` as its raw output.
    fn passthrough() -> Arc<ModelBundle> {
        let schema = FeatureSchema::default();
        let model = MockModel::from_fn(&schema, |x| Ok(x[0]));
        Arc::new(ModelBundle::new(Arc::new(model), None, schema).unwrap())
    }

    fn drugs(n: usize) -> Vec<Drug> {
        (1..=n).map(|i| Drug::new(format!("CHEMBL{i}"), format!("Drug {i}"))).collect()
    }

    #[tokio::test]
    async fn test_one_failure_skips_one_candidate() {
        let mut source = MockFeatureSource::new();
        for i in 1..=5 {
            source = source.with(&format!("CHEMBL{i}"), &[("genetic_score", i as f64 / 10.0)]);
        }
        let source = source.failing("CHEMBL3");

        let engine = ScoringEngine::new(Arc::new(source), passthrough()).with_concurrency(3);
        let report = engine.score_all(&drugs(5), "EFO_1").await;

        assert_eq!(report.predictions.len(), 4);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].is_recoverable());

        let ids: Vec<&str> = report.predictions.iter().map(|p| p.drug.id.as_str()).collect();
        assert_eq!(ids, vec!["CHEMBL1", "CHEMBL2", "CHEMBL4", "CHEMBL5"]);
        for p in &report.predictions {
            let i: f64 = p.drug.id.trim_start_matches("CHEMBL").parse().unwrap();
            assert!((p.base_score - i / 10.0).abs() < 1e-12);
            assert_eq!(p.score, p.base_score);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_output_is_logistic() {
        let source = MockFeatureSource::new().with("CHEMBL1", &[("genetic_score", 2.0)]);
        let engine = ScoringEngine::new(Arc::new(source), passthrough());
        let p = engine.score_one(Drug::new("CHEMBL1", "X"), "EFO_1").await.unwrap();
        assert!((p.base_score - 0.881).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_missing_features_are_recorded() {
        let source = MockFeatureSource::new().with("CHEMBL1", &[("genetic_score", 0.3), ("gene_overlap_count", 2.0)]);
        let engine = ScoringEngine::new(Arc::new(source), passthrough());
        let p = engine.score_one(Drug::new("CHEMBL1", "X"), "EFO_1").await.unwrap();
        assert_eq!(p.missing_features.len(), 5);
        assert_eq!(p.gene_overlap_count, 2.0);
        assert!(p.composite_score.is_some());
    }

    #[tokio::test]
    async fn test_inference_failure_and_nan_skip() {
        let schema = FeatureSchema::default();
        let failing = MockModel::from_fn(&schema, |_| Err(anyhow::anyhow!("model exploded")));
        let bundle = Arc::new(ModelBundle::new(Arc::new(failing), None, schema.clone()).unwrap());
        let engine = ScoringEngine::new(Arc::new(MockFeatureSource::new()), bundle);
        assert!(engine.score_one(Drug::new("CHEMBL1", "X"), "EFO_1").await.is_err());

        let nan = MockModel::from_fn(&schema, |_| Ok(f64::NAN));
        let bundle = Arc::new(ModelBundle::new(Arc::new(nan), None, schema).unwrap());
        let engine = ScoringEngine::new(Arc::new(MockFeatureSource::new()), bundle);
        let err = engine.score_one(Drug::new("CHEMBL1", "X"), "EFO_1").await.unwrap_err();
        assert!(matches!(err, RepurposeError::CandidateComputation { .. }));
    }

    #[tokio::test]
    async fn test_composite_failure_leaves_score_alone() {
        let source = MockFeatureSource::new()
            .with("CHEMBL1", &[("genetic_score", 0.7)])
            .failing_composite();
        let engine = ScoringEngine::new(Arc::new(source), passthrough());
        let p = engine.score_one(Drug::new("CHEMBL1", "X"), "EFO_1").await.unwrap();
        assert!(p.composite_score.is_none());
        assert!((p.score - 0.7).abs() < 1e-12);
    }
}
