//! Disease-category / mechanism guardrails.
//!
//! A data-driven table: the disease is mapped to a category by name keyword
//! or therapeutic area, then the first rule matching (category, mechanism)
//! supplies the multiplier and label. No match means multiplier 1.0.

use futures_util::stream::{self, StreamExt};
use repurpose_common::config::GuardrailConfig;
use repurpose_common::{Disease, MechanismClass, Prediction};
use repurpose_kg::KnowledgeGraph;
use tracing::{debug, info, instrument, warn};

/// Result of a guardrail table lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailDecision {
    pub mechanism: MechanismClass,
    pub multiplier: f64,
    pub label: Option<String>,
}

impl GuardrailDecision {
    fn neutral(mechanism: MechanismClass) -> Self {
        Self { mechanism, multiplier: 1.0, label: None }
    }
}

pub struct GuardrailPolicy {
    config: GuardrailConfig,
    concurrency: usize,
}

impl GuardrailPolicy {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config, concurrency: 1 }
    }

    /// Mechanism lookups in flight at once.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// First category whose keywords occur in `disease_name` (case-insensitive)
    /// or whose therapeutic areas intersect `areas`.
    pub fn category(&self, disease_name: &str, areas: &[String]) -> Option<&str> {
        let name = disease_name.to_lowercase();
        self.config
            .categories
            .iter()
            .find(|c| {
                c.keywords.iter().any(|k| name.contains(&k.to_lowercase()))
                    || c.therapeutic_areas
                        .iter()
                        .any(|t| areas.iter().any(|a| a.eq_ignore_ascii_case(t)))
            })
            .map(|c| c.category.as_str())
    }

    /// Table lookup for one (category, mechanism) pair.
    pub fn decide(&self, category: Option<&str>, mechanism: MechanismClass) -> GuardrailDecision {
        let Some(category) = category else {
            return GuardrailDecision::neutral(mechanism);
        };
        self.config
            .rules
            .iter()
            .find(|r| r.category == category && r.mechanism == mechanism)
            .map(|r| GuardrailDecision {
                mechanism,
                multiplier: r.multiplier,
                label: Some(r.label.clone()),
            })
            .unwrap_or_else(|| GuardrailDecision::neutral(mechanism))
    }

    fn needs_areas(&self) -> bool {
        self.config.categories.iter().any(|c| !c.therapeutic_areas.is_empty())
    }

    /// Apply guardrails to every prediction in place. `base_score` is not touched.
    ///
    /// Mechanisms are only looked up when the disease falls into a category;
    /// otherwise every prediction keeps `UNKNOWN` with multiplier 1.0.
    #[instrument(skip(self, kg, predictions), fields(disease_id = %disease.id))]
    pub async fn apply(&self, kg: &dyn KnowledgeGraph, disease: &Disease, predictions: &mut [Prediction]) {
        let areas = if self.needs_areas() {
            kg.therapeutic_areas(&disease.id).await.unwrap_or_else(|e| {
                warn!("Therapeutic area lookup failed: {e}");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        let Some(category) = self.category(&disease.name, &areas) else {
            debug!("No guardrail category for disease");
            for p in predictions.iter_mut() {
                p.apply_guardrail(MechanismClass::Unknown, 1.0, None);
            }
            return;
        };
        info!(category, "Applying guardrails");

        let mechanisms: Vec<MechanismClass> = stream::iter(predictions.iter().map(|p| p.drug.id.clone()))
            .map(|drug_id| async move {
                kg.mechanism(&drug_id).await.unwrap_or_else(|e| {
                    warn!(drug_id = %drug_id, "Mechanism lookup failed: {e}");
                    MechanismClass::Unknown
                })
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (p, mechanism) in predictions.iter_mut().zip(mechanisms) {
            let decision = self.decide(Some(category), mechanism);
            if let Some(label) = &decision.label {
                debug!(drug_id = %p.drug.id, %mechanism, multiplier = decision.multiplier, label = %label, "Guardrail hit");
            }
            p.apply_guardrail(decision.mechanism, decision.multiplier, decision.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repurpose_common::{Drug, FeatureSummary};
    use repurpose_kg::MockKnowledgeGraph;

    fn pred(id: &str, base: f64) -> Prediction {
        Prediction::scored(Drug::new(id, id), base, FeatureSummary::default(), vec![])
    }

    fn policy() -> GuardrailPolicy {
        GuardrailPolicy::new(GuardrailConfig::default())
    }

    #[test]
    fn test_category_by_keyword_or_area() {
        let p = policy();
        assert_eq!(p.category("Parkinson's Disease", &[]), Some("parkinsons"));
        assert_eq!(p.category("juvenile PARKINSONISM", &[]), Some("parkinsons"));
        assert_eq!(p.category("breast carcinoma", &[]), Some("oncology"));
        assert_eq!(p.category("neoplasm of unusual site", &["ONCOLOGY".to_string()]), Some("oncology"));
        assert_eq!(p.category("asthma", &["RESPIRATORY".to_string()]), None);
    }

    #[test]
    fn test_rule_table_is_exact() {
        let p = policy();
        let d = p.decide(Some("parkinsons"), MechanismClass::DopamineAntagonist);
        assert_eq!(d.multiplier, 0.1);
        assert_eq!(d.label.as_deref(), Some("contraindicated"));

        assert_eq!(p.decide(Some("parkinsons"), MechanismClass::Anticholinergic).multiplier, 0.3);
        assert_eq!(p.decide(Some("parkinsons"), MechanismClass::DopamineAgonist).multiplier, 1.2);
        assert_eq!(p.decide(Some("oncology"), MechanismClass::KinaseInhibitor).multiplier, 1.1);
        assert_eq!(p.decide(Some("oncology"), MechanismClass::Antibody).multiplier, 1.1);

        let none = p.decide(Some("oncology"), MechanismClass::DopamineAntagonist);
        assert_eq!(none.multiplier, 1.0);
        assert!(none.label.is_none());
        assert_eq!(p.decide(None, MechanismClass::Antibody).multiplier, 1.0);
    }

    #[tokio::test]
    async fn test_parkinsons_agonist_and_antagonist() {
        let kg = MockKnowledgeGraph::new()
            .with_mechanism("CHEMBL_AG", MechanismClass::DopamineAgonist)
            .with_mechanism("CHEMBL_ANT", MechanismClass::DopamineAntagonist);
        let disease = Disease::new("MONDO_0005180", "Parkinson disease");
        let mut preds = vec![pred("CHEMBL_AG", 0.60), pred("CHEMBL_ANT", 0.60)];

        policy().apply(&kg, &disease, &mut preds).await;

        assert!((preds[0].score - 0.72).abs() < 1e-9);
        assert!((preds[1].score - 0.06).abs() < 1e-9);
        assert_eq!(preds[1].guardrail_label.as_deref(), Some("contraindicated"));
        assert_eq!(preds[0].base_score, 0.60);
        assert_eq!(preds[1].base_score, 0.60);
    }

    #[tokio::test]
    async fn test_mechanism_failure_is_neutral() {
        let kg = MockKnowledgeGraph::new().failing("CHEMBL9");
        let disease = Disease::new("MONDO_0005180", "Parkinson disease");
        let mut preds = vec![pred("CHEMBL9", 0.5)];

        policy().apply(&kg, &disease, &mut preds).await;

        assert_eq!(preds[0].mechanism, MechanismClass::Unknown);
        assert_eq!(preds[0].score, 0.5);
        assert!(preds[0].guardrail_label.is_none());
    }

    #[tokio::test]
    async fn test_area_lookup_selects_oncology() {
        let kg = MockKnowledgeGraph::new()
            .with_area("EFO_0000616", "ONCOLOGY")
            .with_mechanism("CHEMBL941", MechanismClass::KinaseInhibitor);
        let disease = Disease::new("EFO_0000616", "neoplasm");
        let mut preds = vec![pred("CHEMBL941", 0.5)];

        policy().with_concurrency(4).apply(&kg, &disease, &mut preds).await;
        assert!((preds[0].guardrailed_score - 0.55).abs() < 1e-9);
        assert_eq!(preds[0].guardrail_label.as_deref(), Some("aligned"));
    }
}
