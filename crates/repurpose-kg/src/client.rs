//! Trait for knowledge-graph access.
//!
//! Abstracts the remote disease/drug knowledge graph so that resolution,
//! aggregation and guardrails can run against OpenTargets in production and
//! against in-memory data in tests.

use async_trait::async_trait;
use repurpose_common::{Disease, Drug, MechanismClass};
use std::collections::{HashMap, HashSet};

/// Knowledge-graph queries consumed by the core pipeline.
///
/// Every call may fail with a transport or timeout error; callers decide
/// whether that failure is fatal.
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// Ranked free-text disease search.
    async fn resolve_candidates(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Disease>>;

    /// Does this disease identifier exist (with at least one associated target)?
    async fn verify(&self, disease_id: &str) -> anyhow::Result<bool>;

    /// Drugs with known clinical links to the disease.
    async fn linked_drugs(&self, disease_id: &str, limit: usize) -> anyhow::Result<Vec<Drug>>;

    /// Free-text drug search.
    async fn search_drugs(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Drug>>;

    /// Therapeutic-area codes for a disease (e.g. `ONCOLOGY`).
    async fn therapeutic_areas(&self, disease_id: &str) -> anyhow::Result<Vec<String>>;

    /// Coarse mechanism class of a drug.
    async fn mechanism(&self, drug_id: &str) -> anyhow::Result<MechanismClass>;
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// In-memory knowledge graph with injectable failures.
#[derive(Debug, Default, Clone)]
pub struct MockKnowledgeGraph {
    disease_hits: HashMap<String, Vec<Disease>>,
    known_diseases: HashSet<String>,
    linked: HashMap<String, Vec<Drug>>,
    drug_hits: HashMap<String, Vec<Drug>>,
    areas: HashMap<String, Vec<String>>,
    mechanisms: HashMap<String, MechanismClass>,
    failing_queries: HashSet<String>,
    fail_linked: bool,
}

impl MockKnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disease search results for a query, in rank order.
    pub fn with_disease_hits(mut self, query: &str, hits: Vec<Disease>) -> Self {
        self.disease_hits.insert(query.to_lowercase(), hits);
        self
    }

    pub fn with_known_disease(mut self, disease_id: &str) -> Self {
        self.known_diseases.insert(disease_id.to_string());
        self
    }

    pub fn with_linked(mut self, disease_id: &str, drugs: Vec<Drug>) -> Self {
        self.linked.insert(disease_id.to_string(), drugs);
        self
    }

    pub fn with_drug_hits(mut self, query: &str, drugs: Vec<Drug>) -> Self {
        self.drug_hits.insert(query.to_lowercase(), drugs);
        self
    }

    pub fn with_area(mut self, disease_id: &str, area: &str) -> Self {
        self.areas.entry(disease_id.to_string()).or_default().push(area.to_string());
        self
    }

    pub fn with_mechanism(mut self, drug_id: &str, mechanism: MechanismClass) -> Self {
        self.mechanisms.insert(drug_id.to_string(), mechanism);
        self
    }

    /// Make a drug search query (or a mechanism lookup by drug id) fail.
    pub fn failing(mut self, query_or_id: &str) -> Self {
        self.failing_queries.insert(query_or_id.to_lowercase());
        self
    }

    pub fn failing_linked(mut self) -> Self {
        self.fail_linked = true;
        self
    }

    fn check(&self, key: &str) -> anyhow::Result<()> {
        if self.failing_queries.contains(&key.to_lowercase()) {
            anyhow::bail!("simulated timeout for {key}");
        }
        Ok(())
    }
}

#[async_trait]
impl KnowledgeGraph for MockKnowledgeGraph {
    async fn resolve_candidates(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Disease>> {
        self.check(query)?;
        let mut hits = self.disease_hits.get(&query.to_lowercase()).cloned().unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn verify(&self, disease_id: &str) -> anyhow::Result<bool> {
        self.check(disease_id)?;
        Ok(self.known_diseases.contains(disease_id))
    }

    async fn linked_drugs(&self, disease_id: &str, limit: usize) -> anyhow::Result<Vec<Drug>> {
        if self.fail_linked {
            anyhow::bail!("simulated outage for linked drugs of {disease_id}");
        }
        let mut drugs = self.linked.get(disease_id).cloned().unwrap_or_default();
        drugs.truncate(limit);
        Ok(drugs)
    }

    async fn search_drugs(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Drug>> {
        self.check(query)?;
        let mut drugs = self.drug_hits.get(&query.to_lowercase()).cloned().unwrap_or_default();
        drugs.truncate(limit);
        Ok(drugs)
    }

    async fn therapeutic_areas(&self, disease_id: &str) -> anyhow::Result<Vec<String>> {
        Ok(self.areas.get(disease_id).cloned().unwrap_or_default())
    }

    async fn mechanism(&self, drug_id: &str) -> anyhow::Result<MechanismClass> {
        self.check(drug_id)?;
        Ok(self.mechanisms.get(drug_id).copied().unwrap_or(MechanismClass::Unknown))
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
