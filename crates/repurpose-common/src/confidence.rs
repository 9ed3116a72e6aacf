/// Confidence tiers for final prediction scores.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    /// score ≥ 0.7 → high, ≥ 0.4 → medium, otherwise low.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            ConfidenceTier::High
        } else if score >= 0.4 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High   => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low    => "low",
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(ConfidenceTier::from_score(0.7), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(0.6999), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.4), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(0.39), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_score(0.0), ConfidenceTier::Low);
    }

    #[test]
    fn test_tier_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&ConfidenceTier::High).unwrap(), "\"high\"");
    }
}
