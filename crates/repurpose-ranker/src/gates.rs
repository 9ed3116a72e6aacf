//! Post-guardrail gate chain.
//!
//! A `GateChain` receives the guardrailed scores plus a minimal evidence
//! summary per candidate and returns one multiplier record per candidate.
//! `apply_gate_chain` isolates the chain: an error or a malformed outcome
//! leaves the guardrail-only scores in place.

use async_trait::async_trait;
use repurpose_common::config::EvidenceGateConfig;
use repurpose_common::{Adjustment, FeatureSummary, Prediction, RepurposeError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

/// Multipliers applied to one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateRecord {
    pub total_multiplier: f64,
    pub gates: Vec<Adjustment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub adjusted: Vec<f64>,
    pub records: Vec<GateRecord>,
}

#[async_trait]
pub trait GateChain: Send + Sync {
    fn name(&self) -> &str;

    /// `scores`, `drug_ids` and `summaries` are parallel slices.
    async fn apply_gates(
        &self,
        scores: &[f64],
        drug_ids: &[String],
        disease_id: &str,
        summaries: &[FeatureSummary],
    ) -> anyhow::Result<GateOutcome>;
}

/// One multiplier source inside a `CompositeGateChain`.
#[async_trait]
pub trait Gate: Send + Sync {
    fn name(&self) -> &str;

    async fn multiplier(&self, drug_id: &str, disease_id: &str, summary: &FeatureSummary) -> anyhow::Result<f64>;
}

// ── Evidence gate ───────────────────────────────────────────────────────────

/// Penalises candidates with neither shared targets nor a meaningful
/// disease association.
pub struct EvidenceGate {
    config: EvidenceGateConfig,
}

impl EvidenceGate {
    pub fn new(config: EvidenceGateConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Gate for EvidenceGate {
    fn name(&self) -> &str {
        "evidence"
    }

    async fn multiplier(&self, _drug_id: &str, _disease_id: &str, summary: &FeatureSummary) -> anyhow::Result<f64> {
        let weak = summary.gene_overlap_count < self.config.min_gene_overlap
            && summary.max_association_score < self.config.min_association;
        Ok(if weak { self.config.penalty } else { 1.0 })
    }
}

// ── Composite chain ─────────────────────────────────────────────────────────

/// Applies its gates in order; a candidate's multiplier is their product.
#[derive(Default)]
pub struct CompositeGateChain {
    gates: Vec<Box<dyn Gate>>,
}

impl CompositeGateChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}

#[async_trait]
impl GateChain for CompositeGateChain {
    fn name(&self) -> &str {
        "composite"
    }

    async fn apply_gates(
        &self,
        scores: &[f64],
        drug_ids: &[String],
        disease_id: &str,
        summaries: &[FeatureSummary],
    ) -> anyhow::Result<GateOutcome> {
        if scores.len() != drug_ids.len() || scores.len() != summaries.len() {
            anyhow::bail!(
                "mismatched inputs: {} scores, {} ids, {} summaries",
                scores.len(),
                drug_ids.len(),
                summaries.len()
            );
        }

        let mut adjusted = Vec::with_capacity(scores.len());
        let mut records = Vec::with_capacity(scores.len());
        for ((score, drug_id), summary) in scores.iter().zip(drug_ids).zip(summaries) {
            let mut gates = Vec::with_capacity(self.gates.len());
            for gate in &self.gates {
                let multiplier = gate.multiplier(drug_id, disease_id, summary).await?;
                gates.push(Adjustment { name: gate.name().to_string(), multiplier });
            }
            let total_multiplier = gates.iter().map(|g| g.multiplier).product::<f64>();
            adjusted.push(score * total_multiplier);
            records.push(GateRecord { total_multiplier, gates });
        }

        Ok(GateOutcome { adjusted, records })
    }
}

// ── Integration ─────────────────────────────────────────────────────────────

/// Check an outcome against the number of candidates it was computed for.
pub fn validate_outcome(outcome: &GateOutcome, expected: usize) -> Result<()> {
    if outcome.adjusted.len() != expected || outcome.records.len() != expected {
        return Err(RepurposeError::GateApplication(format!(
            "expected {expected} results, got {} scores and {} records",
            outcome.adjusted.len(),
            outcome.records.len()
        )));
    }
    if let Some(bad) = outcome
        .records
        .iter()
        .find(|r| !r.total_multiplier.is_finite() || r.total_multiplier <= 0.0)
    {
        return Err(RepurposeError::GateApplication(format!(
            "invalid multiplier {}",
            bad.total_multiplier
        )));
    }
    if outcome.adjusted.iter().any(|s| !s.is_finite()) {
        return Err(RepurposeError::GateApplication("non-finite adjusted score".to_string()));
    }
    Ok(())
}

/// Run `chain` over the predictions and apply its multipliers in place.
///
/// Returns whether gate multipliers were applied. On any chain error or
/// invalid outcome the predictions keep their guardrailed scores and
/// `gate_multiplier = 1.0`.
#[instrument(skip(chain, predictions), fields(gate_chain = chain.name(), candidates = predictions.len()))]
pub async fn apply_gate_chain(chain: &dyn GateChain, disease_id: &str, predictions: &mut [Prediction]) -> bool {
    if predictions.is_empty() {
        return true;
    }

    let scores: Vec<f64> = predictions.iter().map(|p| p.guardrailed_score).collect();
    let drug_ids: Vec<String> = predictions.iter().map(|p| p.drug.id.clone()).collect();
    let summaries: Vec<FeatureSummary> = predictions.iter().map(|p| p.summary()).collect();

    let outcome = match chain.apply_gates(&scores, &drug_ids, disease_id, &summaries).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let err = RepurposeError::GateApplication(e.to_string());
            warn!("{err}; returning guardrail-only scores");
            return false;
        }
    };
    if let Err(e) = validate_outcome(&outcome, predictions.len()) {
        warn!("{e}; returning guardrail-only scores");
        return false;
    }

    // Scores come from the records; the chain's own `adjusted` series is
    // logged only.
    let mut penalised = 0usize;
    for ((p, record), chain_score) in predictions.iter_mut().zip(&outcome.records).zip(&outcome.adjusted) {
        if record.total_multiplier != 1.0 {
            penalised += 1;
            debug!(
                drug_id = %p.drug.id,
                multiplier = record.total_multiplier,
                chain_score,
                "Gate adjusted score"
            );
        }
        p.apply_gate(record.total_multiplier);
    }
    info!(adjusted = penalised, "Gates applied");
    true
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// Gate chain with a fixed behaviour.
#[derive(Debug, Clone)]
pub enum MockGateChain {
    /// Same multiplier for every candidate
    Constant(f64),
    /// Always fails
    Failing,
    /// Returns one record fewer than asked for
    Truncated,
}

#[async_trait]
impl GateChain for MockGateChain {
    fn name(&self) -> &str {
        "mock"
    }

    async fn apply_gates(
        &self,
        scores: &[f64],
        _drug_ids: &[String],
        _disease_id: &str,
        _summaries: &[FeatureSummary],
    ) -> anyhow::Result<GateOutcome> {
        let m = match self {
            MockGateChain::Constant(m) => *m,
            MockGateChain::Failing => anyhow::bail!("gate service unreachable"),
            MockGateChain::Truncated => 1.0,
        };
        let mut records: Vec<GateRecord> = scores
            .iter()
            .map(|_| GateRecord {
                total_multiplier: m,
                gates: vec![Adjustment { name: "mock".to_string(), multiplier: m }],
            })
            .collect();
        let mut adjusted: Vec<f64> = scores.iter().map(|s| s * m).collect();
        if matches!(self, MockGateChain::Truncated) {
            records.pop();
            adjusted.pop();
        }
        Ok(GateOutcome { adjusted, records })
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use repurpose_common::Drug;

    fn pred(id: &str, base: f64, overlap: f64, assoc: f64) -> Prediction {
        let summary = FeatureSummary { gene_overlap_count: overlap, max_association_score: assoc };
        let mut p = Prediction::scored(Drug::new(id, id), base, summary, vec![]);
        p.apply_guardrail(repurpose_common::MechanismClass::Unknown, 1.0, None);
        p
    }

    #[tokio::test]
    async fn test_evidence_gate_penalises_weak_candidates() {
        let chain = CompositeGateChain::new().with_gate(EvidenceGate::new(EvidenceGateConfig::default()));
        let mut preds = vec![
            pred("CHEMBL1", 0.8, 0.0, 0.05),
            pred("CHEMBL2", 0.8, 2.0, 0.05),
            pred("CHEMBL3", 0.8, 0.0, 0.40),
        ];

        assert!(apply_gate_chain(&chain, "EFO_1", &mut preds).await);
        assert!((preds[0].score - 0.4).abs() < 1e-12);
        assert_eq!(preds[0].gate_multiplier, 0.5);
        assert_eq!(preds[1].score, 0.8);
        assert_eq!(preds[2].score, 0.8);
    }

    #[tokio::test]
    async fn test_final_is_guardrailed_times_multiplier() {
        let mut preds = vec![pred("CHEMBL1", 0.6, 1.0, 1.0)];
        assert!(apply_gate_chain(&MockGateChain::Constant(0.75), "EFO_1", &mut preds).await);
        let p = &preds[0];
        assert!((p.score - p.guardrailed_score * p.gate_multiplier).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_gate_scales_clamped_guardrail_score() {
        let mut p = Prediction::scored(Drug::new("CHEMBL301265", "PRAMIPEXOLE"), 0.95, FeatureSummary::default(), vec![]);
        p.apply_guardrail(repurpose_common::MechanismClass::DopamineAgonist, 1.2, Some("aligned".into()));
        let mut preds = vec![p];

        assert!(apply_gate_chain(&MockGateChain::Constant(0.5), "MONDO_0005180", &mut preds).await);
        let p = &preds[0];
        assert_eq!(p.guardrailed_score, 1.0);
        assert_eq!(p.gate_multiplier, 0.5);
        assert!((p.score - 0.5).abs() < 1e-12);
        assert!((p.score - p.guardrailed_score * p.gate_multiplier).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        for chain in [MockGateChain::Failing, MockGateChain::Truncated, MockGateChain::Constant(0.0)] {
            let mut preds = vec![pred("CHEMBL1", 0.6, 0.0, 0.0), pred("CHEMBL2", 0.3, 0.0, 0.0)];
            assert!(!apply_gate_chain(&chain, "EFO_1", &mut preds).await, "{chain:?}");
            for p in &preds {
                assert_eq!(p.score, p.guardrailed_score);
                assert_eq!(p.gate_multiplier, 1.0);
            }
        }
    }

    #[test]
    fn test_validate_outcome() {
        let ok = GateOutcome {
            adjusted: vec![0.5],
            records: vec![GateRecord { total_multiplier: 1.0, gates: vec![] }],
        };
        assert!(validate_outcome(&ok, 1).is_ok());
        assert!(validate_outcome(&ok, 2).is_err());

        let nan = GateOutcome { adjusted: vec![f64::NAN], ..ok };
        assert!(matches!(validate_outcome(&nan, 1), Err(RepurposeError::GateApplication(_))));
    }
}
