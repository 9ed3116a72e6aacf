//! Weight vector for the auxiliary composite score.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::normalise::minmax_normalise;

/// Overlap counts at or above this are treated as maximal evidence.
pub const GENE_OVERLAP_CEILING: f64 = 10.0;

/// Weights over the knowledge-graph features. Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    /// Genetic association of shared targets
    pub genetic_score: f64,
    /// Somatic mutation evidence for the disease
    pub somatic_score_raw: f64,
    /// Somatic evidence restricted to the drug's targets
    pub somatic_score_masked: f64,
    /// Strongest association among shared targets
    pub max_association_score: f64,
    /// Number of shared targets (normalised against the ceiling)
    pub gene_overlap_count: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            genetic_score:         0.25,
            somatic_score_raw:     0.10,
            somatic_score_masked:  0.15,
            max_association_score: 0.30,
            gene_overlap_count:    0.20,
        }
    }
}

impl FeatureWeights {
    fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Validate that all weights are non-negative and sum to ~1.0
    pub fn validate(&self) -> bool {
        self.as_array().iter().all(|w| *w >= 0.0) && (self.sum() - 1.0).abs() < 1e-6
    }

    /// Renormalise weights so they sum to 1.0
    pub fn normalise(&mut self) {
        let sum = self.sum();
        if sum > 0.0 {
            self.genetic_score         /= sum;
            self.somatic_score_raw     /= sum;
            self.somatic_score_masked  /= sum;
            self.max_association_score /= sum;
            self.gene_overlap_count    /= sum;
        }
    }

    pub fn as_array(&self) -> [f64; 5] {
        [
            self.genetic_score,
            self.somatic_score_raw,
            self.somatic_score_masked,
            self.max_association_score,
            self.gene_overlap_count,
        ]
    }

    /// Weighted sum of normalised features, clamped to [0, 1].
    /// Missing features count as 0.0; non-finite values are an error.
    pub fn composite(&self, features: &HashMap<String, f64>) -> anyhow::Result<f64> {
        let get = |name: &str| -> anyhow::Result<f64> {
            let v = features.get(name).copied().unwrap_or(0.0);
            if !v.is_finite() {
                anyhow::bail!("feature {name} is not finite");
            }
            Ok(v)
        };

        let normed = [
            get("genetic_score")?.clamp(0.0, 1.0),
            get("somatic_score_raw")?.clamp(0.0, 1.0),
            get("somatic_score_masked")?.clamp(0.0, 1.0),
            get("max_association_score")?.clamp(0.0, 1.0),
            minmax_normalise(get("gene_overlap_count")?, 0.0, GENE_OVERLAP_CEILING),
        ];

        let weighted_sum: f64 = normed
            .iter()
            .zip(self.as_array().iter())
            .map(|(n, w)| n * w)
            .sum();

        Ok(weighted_sum.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = FeatureWeights::default();
        assert!(w.validate(), "Default weights must sum to 1.0");
    }

    #[test]
    fn test_normalise_restores_sum() {
        let mut w = FeatureWeights::default();
        w.genetic_score += 0.10;
        assert!(!w.validate());
        w.normalise();
        assert!(w.validate());
    }

    #[test]
    fn test_composite_range() {
        let w = FeatureWeights::default();
        let mut f = HashMap::new();
        f.insert("max_association_score".to_string(), 0.8);
        f.insert("gene_overlap_count".to_string(), 40.0);
        let c = w.composite(&f).unwrap();
        assert!((c - (0.30 * 0.8 + 0.20)).abs() < 1e-9);

        assert_eq!(w.composite(&HashMap::new()).unwrap(), 0.0);
    }

    #[test]
    fn test_composite_rejects_nan() {
        let mut f = HashMap::new();
        f.insert("genetic_score".to_string(), f64::NAN);
        assert!(FeatureWeights::default().composite(&f).is_err());
    }
}
