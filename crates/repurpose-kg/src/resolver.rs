//! Disease resolution: free text or ontology id → canonical `Disease`.

use repurpose_common::config::ResolverConfig;
use repurpose_common::{Disease, RepurposeError, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::client::KnowledgeGraph;
use crate::names::NameResolver;

pub struct DiseaseResolver {
    kg: Arc<dyn KnowledgeGraph>,
    config: ResolverConfig,
    names: Option<Arc<NameResolver>>,
}

impl DiseaseResolver {
    pub fn new(kg: Arc<dyn KnowledgeGraph>, config: ResolverConfig) -> Self {
        Self { kg, config, names: None }
    }

    /// Use `names` for display names of identifier queries.
    pub fn with_names(mut self, names: Arc<NameResolver>) -> Self {
        self.names = Some(names);
        self
    }

    /// Does the query carry one of the recognised ontology prefixes?
    pub fn is_identifier(&self, query: &str) -> bool {
        let upper = query.trim().to_ascii_uppercase();
        self.config
            .id_prefixes
            .iter()
            .any(|p| upper.starts_with(&p.to_ascii_uppercase()))
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, query: &str) -> Result<Disease> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RepurposeError::DiseaseNotFound(query.to_string()));
        }

        if self.is_identifier(query) {
            return self.resolve_identifier(query).await;
        }

        let hits = match self.kg.resolve_candidates(query, self.config.search_limit).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Disease search failed: {e}");
                return Err(RepurposeError::DiseaseNotFound(query.to_string()));
            }
        };

        let idx = select_disease(&hits, &self.config)
            .ok_or_else(|| RepurposeError::DiseaseNotFound(query.to_string()))?;
        let disease = hits[idx].clone();
        info!(disease_id = %disease.id, name = %disease.name, "Resolved disease");
        Ok(disease)
    }

    async fn resolve_identifier(&self, id: &str) -> Result<Disease> {
        match self.kg.verify(id).await {
            Ok(true) => {}
            Ok(false) => return Err(RepurposeError::DiseaseNotFound(id.to_string())),
            Err(e) => {
                warn!(disease_id = id, "Identifier check failed: {e}");
                return Err(RepurposeError::DiseaseNotFound(id.to_string()));
            }
        }

        let name = match &self.names {
            Some(names) => names.name_for(id).await,
            None => id.to_string(),
        };
        debug!(disease_id = id, name = %name, "Verified disease identifier");
        Ok(Disease::new(id, name))
    }
}

fn is_excluded(name: &str, config: &ResolverConfig) -> bool {
    let lower = name.to_lowercase();
    config
        .exclusion_terms
        .iter()
        .any(|t| lower.contains(&t.to_lowercase()))
}

/// Pick a search hit: first non-excluded hit in the disease namespace, else
/// the first non-excluded hit, else the first hit.
pub fn select_disease(hits: &[Disease], config: &ResolverConfig) -> Option<usize> {
    if hits.is_empty() {
        return None;
    }

    let namespace = config.disease_namespace_prefix.to_ascii_uppercase();
    let in_namespace = |d: &Disease| d.id.to_ascii_uppercase().starts_with(&namespace);

    hits.iter()
        .position(|d| !is_excluded(&d.name, config) && in_namespace(d))
        .or_else(|| hits.iter().position(|d| !is_excluded(&d.name, config)))
        .or(Some(0))
}
