/// Core entity types shared by the resolution, scoring and ranking stages.
/// None of these are persisted; they live for the duration of one request.

use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceTier;

// ---------------------------------------------------------------------------
// Disease / Drug
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disease {
    pub id: String,   // e.g. MONDO_0005180
    pub name: String,
}

impl Disease {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drug {
    pub id: String,   // e.g. CHEMBL1200564
    pub name: String,
}

impl Drug {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into() }
    }
}

// ---------------------------------------------------------------------------
// Mechanism class
// ---------------------------------------------------------------------------

/// Coarse mode-of-action label for a drug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MechanismClass {
    DopamineAgonist,
    DopamineAntagonist,
    Anticholinergic,
    KinaseInhibitor,
    Antibody,
    Other,
    Unknown,
}

impl MechanismClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MechanismClass::DopamineAgonist    => "DOPAMINE_AGONIST",
            MechanismClass::DopamineAntagonist => "DOPAMINE_ANTAGONIST",
            MechanismClass::Anticholinergic    => "ANTICHOLINERGIC",
            MechanismClass::KinaseInhibitor    => "KINASE_INHIBITOR",
            MechanismClass::Antibody           => "ANTIBODY",
            MechanismClass::Other              => "OTHER",
            MechanismClass::Unknown            => "UNKNOWN",
        }
    }

    /// Parse a label such as `DOPAMINE_ANTAGONIST` or `dopamine antagonist`.
    pub fn parse(s: &str) -> Self {
        let normalised: String = s
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c.to_ascii_uppercase() })
            .collect();
        match normalised.as_str() {
            "DOPAMINE_AGONIST"    => MechanismClass::DopamineAgonist,
            "DOPAMINE_ANTAGONIST" => MechanismClass::DopamineAntagonist,
            "ANTICHOLINERGIC"     => MechanismClass::Anticholinergic,
            "KINASE_INHIBITOR"    => MechanismClass::KinaseInhibitor,
            "ANTIBODY"            => MechanismClass::Antibody,
            "UNKNOWN" | ""        => MechanismClass::Unknown,
            _                     => MechanismClass::Other,
        }
    }
}

impl Serialize for MechanismClass {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MechanismClass {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(MechanismClass::parse(&s))
    }
}

impl std::fmt::Display for MechanismClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Adjustment chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub name: String,
    pub multiplier: f64,
}

/// Ordered chain of multipliers applied to a base score.
/// final = clamp(base × Π multipliers, 0, 1); every multiplier is > 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentResult {
    pub base_score: f64,
    pub adjustments: Vec<Adjustment>,
    pub clamped: bool,
}

impl AdjustmentResult {
    pub fn new(base_score: f64) -> Self {
        Self { base_score, adjustments: Vec::new(), clamped: false }
    }

    pub fn record(&mut self, name: &str, multiplier: f64) {
        debug_assert!(multiplier.is_finite() && multiplier > 0.0);
        self.adjustments.push(Adjustment { name: name.to_string(), multiplier });
    }

    pub fn unclamped_score(&self) -> f64 {
        self.adjustments
            .iter()
            .fold(self.base_score, |acc, a| acc * a.multiplier)
    }

    pub fn final_score(&mut self) -> f64 {
        let raw = self.unclamped_score();
        let bounded = raw.clamp(0.0, 1.0);
        self.clamped = raw != bounded;
        bounded
    }

    /// `name=multiplier;…` rendering used by the delimited output.
    pub fn describe(&self) -> String {
        self.adjustments
            .iter()
            .map(|a| format!("{}={:.4}", a.name, a.multiplier))
            .collect::<Vec<_>>()
            .join(";")
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// Minimal per-candidate evidence handed to the gate chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub gene_overlap_count: f64,
    pub max_association_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub drug: Drug,
    /// Final score after guardrails and gates, in [0, 1].
    pub score: f64,
    /// Model probability before any adjustment.
    pub base_score: f64,
    pub guardrailed_score: f64,
    pub guardrail_label: Option<String>,
    pub mechanism: MechanismClass,
    pub gate_multiplier: f64,
    pub composite_score: Option<f64>,
    pub confidence_tier: ConfidenceTier,
    pub gene_overlap_count: f64,
    pub max_association_score: f64,
    pub missing_features: Vec<String>,
    pub adjustments: AdjustmentResult,
}

impl Prediction {
    pub fn scored(
        drug: Drug,
        probability: f64,
        summary: FeatureSummary,
        missing_features: Vec<String>,
    ) -> Self {
        let p = probability.clamp(0.0, 1.0);
        Self {
            drug,
            score: p,
            base_score: p,
            guardrailed_score: p,
            guardrail_label: None,
            mechanism: MechanismClass::Unknown,
            gate_multiplier: 1.0,
            composite_score: None,
            confidence_tier: ConfidenceTier::from_score(p),
            gene_overlap_count: summary.gene_overlap_count,
            max_association_score: summary.max_association_score,
            missing_features,
            adjustments: AdjustmentResult::new(p),
        }
    }

    pub fn summary(&self) -> FeatureSummary {
        FeatureSummary {
            gene_overlap_count: self.gene_overlap_count,
            max_association_score: self.max_association_score,
        }
    }

    /// Apply the guardrail multiplier. `base_score` is left untouched.
    pub fn apply_guardrail(&mut self, mechanism: MechanismClass, multiplier: f64, label: Option<String>) {
        self.mechanism = mechanism;
        self.guardrail_label = label;
        self.adjustments.record("guardrail", multiplier);
        self.guardrailed_score = self.adjustments.final_score();
        self.score = self.guardrailed_score;
        self.confidence_tier = ConfidenceTier::from_score(self.score);
    }

    /// Apply the gate-chain multiplier on top of the clamped guardrailed
    /// score. The adjustment chain only records it.
    pub fn apply_gate(&mut self, multiplier: f64) {
        self.gate_multiplier = multiplier;
        self.adjustments.record("gates", multiplier);
        let raw = self.guardrailed_score * multiplier;
        self.score = raw.clamp(0.0, 1.0);
        self.adjustments.clamped |= raw != self.score;
        self.confidence_tier = ConfidenceTier::from_score(self.score);
    }
}
