//! Candidate aggregation: drugs linked to the disease plus a fixed catalog
//! of representative drug searches, merged and de-duplicated by id.

use regex::Regex;
use repurpose_common::config::CandidateConfig;
use repurpose_common::{Drug, RepurposeError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::client::KnowledgeGraph;
use crate::names::NameResolver;

pub struct CandidateAggregator {
    kg: Arc<dyn KnowledgeGraph>,
    config: CandidateConfig,
    compound_re: Regex,
    names: Option<Arc<NameResolver>>,
}

impl CandidateAggregator {
    pub fn new(kg: Arc<dyn KnowledgeGraph>, config: CandidateConfig) -> Result<Self> {
        let compound_re = Regex::new(&config.compound_id_pattern)
            .map_err(|e| RepurposeError::Config(format!("compound_id_pattern: {e}")))?;
        Ok(Self { kg, config, compound_re, names: None })
    }

    /// Fill empty drug names from `names`.
    pub fn with_names(mut self, names: Arc<NameResolver>) -> Self {
        self.names = Some(names);
        self
    }

    /// Build the candidate set. Collaborator failures shrink the set; they
    /// never fail the call. An empty result means "no candidates".
    #[instrument(skip(self))]
    pub async fn collect(&self, disease_id: &str, limit: usize) -> Vec<Drug> {
        let mut merged = CandidateSet::default();

        match self.kg.linked_drugs(disease_id, self.config.linked_limit).await {
            Ok(drugs) => {
                debug!(count = drugs.len(), "Linked drugs");
                self.merge(&mut merged, drugs);
            }
            Err(e) => {
                let err = RepurposeError::collaborator("linked_drugs", e);
                warn!("{err}; continuing without linked drugs");
            }
        }

        for query in &self.config.seed_queries {
            match self.kg.search_drugs(query, self.config.search_limit).await {
                Ok(drugs) => self.merge(&mut merged, drugs),
                Err(e) => {
                    let err = RepurposeError::collaborator("search_drugs", e);
                    warn!(query = %query, "{err}; skipping query");
                }
            }
        }

        let mut drugs = merged.into_vec();
        drugs.truncate(limit);

        if let Some(names) = &self.names {
            for drug in drugs.iter_mut().filter(|d| d.name.trim().is_empty()) {
                drug.name = names.name_for(&drug.id).await;
            }
        }

        info!(count = drugs.len(), "Aggregated candidate drugs");
        drugs
    }

    fn merge(&self, set: &mut CandidateSet, drugs: Vec<Drug>) {
        for drug in drugs {
            if self.compound_re.is_match(&drug.id) {
                set.insert(drug);
            } else {
                debug!(drug_id = %drug.id, "Dropping non-compound identifier");
            }
        }
    }
}

/// Insertion-ordered map keyed by drug id. A repeated id replaces the
/// stored record but keeps its original position.
#[derive(Default)]
struct CandidateSet {
    order: Vec<Drug>,
    index: HashMap<String, usize>,
}

impl CandidateSet {
    fn insert(&mut self, drug: Drug) {
        match self.index.get(&drug.id) {
            Some(&i) => self.order[i] = drug,
            None => {
                self.index.insert(drug.id.clone(), self.order.len());
                self.order.push(drug);
            }
        }
    }

    fn into_vec(self) -> Vec<Drug> {
        self.order
    }
}
