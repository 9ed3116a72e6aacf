//! Orchestrator for one prediction request:
//! resolve → aggregate → score → guardrails → gates → rank.

use chrono::Utc;
use repurpose_common::{Disease, PipelineConfig, RepurposeError, Result};
use repurpose_kg::{CandidateAggregator, DiseaseResolver, KnowledgeGraph, NameResolver};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::features::FeatureSource;
use crate::gates::{apply_gate_chain, GateChain};
use crate::guardrails::GuardrailPolicy;
use crate::model::ModelBundle;
use crate::ranking::{rank, RankedResponse};
use crate::scorer::ScoringEngine;

/// Caller-controlled options for one request.
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub query: String,
    pub top_k: usize,
    pub use_gates: bool,
    /// Accepted for compatibility; no explanation output exists.
    pub explain: bool,
}

impl PredictRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: 10,
            use_gates: true,
            explain: false,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn use_gates(mut self, use_gates: bool) -> Self {
        self.use_gates = use_gates;
        self
    }

    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }
}

/// Non-error outcomes of a request.
#[derive(Debug, Clone)]
pub enum PredictOutcome {
    Ranked(RankedResponse),
    /// Aggregation produced no candidates.
    NoCandidates { disease: Disease },
    /// Every candidate was skipped during scoring.
    NoPredictions { disease: Disease, considered: usize },
}

impl PredictOutcome {
    /// Human-readable message for the empty outcomes.
    pub fn message(&self) -> Option<String> {
        match self {
            PredictOutcome::Ranked(_) => None,
            PredictOutcome::NoCandidates { .. } => Some("No candidate drugs found".to_string()),
            PredictOutcome::NoPredictions { .. } => {
                Some("Could not compute predictions for any candidates".to_string())
            }
        }
    }

    pub fn ranked(&self) -> Option<&RankedResponse> {
        match self {
            PredictOutcome::Ranked(r) => Some(r),
            _ => None,
        }
    }
}

pub struct Pipeline {
    kg: Arc<dyn KnowledgeGraph>,
    resolver: DiseaseResolver,
    aggregator: CandidateAggregator,
    scorer: ScoringEngine,
    guardrails: GuardrailPolicy,
    gates: Option<Arc<dyn GateChain>>,
    candidate_limit: usize,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        kg: Arc<dyn KnowledgeGraph>,
        features: Arc<dyn FeatureSource>,
        bundle: Arc<ModelBundle>,
    ) -> Result<Self> {
        let concurrency = config.scoring.concurrency;
        Ok(Self {
            resolver: DiseaseResolver::new(kg.clone(), config.resolver.clone()),
            aggregator: CandidateAggregator::new(kg.clone(), config.candidates.clone())?,
            scorer: ScoringEngine::new(features, bundle).with_concurrency(concurrency),
            guardrails: GuardrailPolicy::new(config.guardrails.clone()).with_concurrency(concurrency),
            gates: None,
            candidate_limit: config.candidates.limit,
            kg,
        })
    }

    pub fn with_gates(mut self, chain: Arc<dyn GateChain>) -> Self {
        self.gates = Some(chain);
        self
    }

    /// Display-name lookups for disease identifiers and unnamed drugs.
    pub fn with_names(mut self, diseases: Arc<NameResolver>, drugs: Arc<NameResolver>) -> Self {
        self.resolver = self.resolver.with_names(diseases);
        self.aggregator = self.aggregator.with_names(drugs);
        self
    }

    pub fn model_name(&self) -> &str {
        &self.scorer.bundle().name
    }

    /// Run one request. `DiseaseNotFound` is the only error a well-formed
    /// request can produce; collaborator failures degrade the result instead.
    pub async fn predict(&self, request: &PredictRequest) -> Result<PredictOutcome> {
        let request_id = Uuid::new_v4();
        let span = info_span!("predict", request_id = %request_id, query = %request.query);
        self.run(request_id, request).instrument(span).await
    }

    async fn run(&self, request_id: Uuid, request: &PredictRequest) -> Result<PredictOutcome> {
        if request.top_k == 0 {
            return Err(RepurposeError::Config("top_k must be at least 1".to_string()));
        }
        if request.explain {
            warn!("Explanations are not available; --explain has no effect");
        }

        let disease = self.resolver.resolve(&request.query).await?;

        let candidates = self.aggregator.collect(&disease.id, self.candidate_limit).await;
        if candidates.is_empty() {
            info!(disease_id = %disease.id, "No candidates");
            return Ok(PredictOutcome::NoCandidates { disease });
        }

        let report = self.scorer.score_all(&candidates, &disease.id).await;
        let mut predictions = report.predictions;
        if predictions.is_empty() {
            return Ok(PredictOutcome::NoPredictions {
                disease,
                considered: candidates.len(),
            });
        }

        self.guardrails
            .apply(self.kg.as_ref(), &disease, &mut predictions)
            .await;

        let gates_applied = match (&self.gates, request.use_gates) {
            (Some(chain), true) => apply_gate_chain(chain.as_ref(), &disease.id, &mut predictions).await,
            _ => false,
        };

        let evaluated = predictions.len();
        let predictions = rank(predictions, request.top_k);
        info!(evaluated, returned = predictions.len(), gates_applied, "Ranked candidates");

        Ok(PredictOutcome::Ranked(RankedResponse {
            request_id,
            generated_at: Utc::now(),
            disease,
            model: self.model_name().to_string(),
            candidates_considered: candidates.len(),
            evaluated,
            skipped: report.skipped.len(),
            gates_applied,
            predictions,
        }))
    }
}
