//! Ordered feature schema and the schema-validated feature record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::entities::FeatureSummary;

/// Field order the built-in model artifacts are trained on.
pub const FEATURE_NAMES: [&str; 7] = [
    "genetic_score",
    "somatic_score_raw",
    "somatic_score_masked",
    "max_association_score",
    "gene_overlap_count",
    "mean_plddt",
    "low_confidence_frac",
];

/// Fixed, ordered list of named numeric features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::new(FEATURE_NAMES.iter().map(|s| s.to_string()).collect())
    }
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Feature values in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<f64>,
    missing: Vec<String>,
    unknown: Vec<String>,
}

impl FeatureVector {
    /// Project a name → value map onto `schema`. Absent fields become 0.0
    /// and are listed in `missing()`; keys outside the schema are listed
    /// in `unknown()` and otherwise ignored.
    pub fn from_map(schema: &FeatureSchema, map: &HashMap<String, f64>) -> Self {
        let mut missing = Vec::new();
        let values = schema
            .names()
            .iter()
            .map(|name| match map.get(name) {
                Some(v) => *v,
                None => {
                    missing.push(name.clone());
                    0.0
                }
            })
            .collect();

        let mut unknown: Vec<String> = map
            .keys()
            .filter(|k| schema.index_of(k).is_none())
            .cloned()
            .collect();
        unknown.sort();

        Self { values, missing, unknown }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values, missing: Vec::new(), unknown: Vec::new() }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn missing(&self) -> &[String] {
        &self.missing
    }

    pub fn unknown(&self) -> &[String] {
        &self.unknown
    }

    pub fn get(&self, schema: &FeatureSchema, name: &str) -> Option<f64> {
        schema.index_of(name).and_then(|i| self.values.get(i).copied())
    }

    /// Gene overlap and association score, for the gate chain.
    pub fn summary(&self, schema: &FeatureSchema) -> FeatureSummary {
        FeatureSummary {
            gene_overlap_count: self.get(schema, "gene_overlap_count").unwrap_or(0.0),
            max_association_score: self.get(schema, "max_association_score").unwrap_or(0.0),
        }
    }

    /// Same metadata, transformed values.
    pub fn with_values(&self, values: Vec<f64>) -> Self {
        Self {
            values,
            missing: self.missing.clone(),
            unknown: self.unknown.clone(),
        }
    }
}
