//! Human-readable names for disease and compound identifiers.
//!
//! Lookup order: curated table → cache → remote source → the id itself.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::name_cache::NameCache;

/// Remote source of a display name for an identifier.
#[async_trait]
pub trait NameSource: Send + Sync {
    async fn fetch_name(&self, id: &str) -> anyhow::Result<Option<String>>;
}

/// Common diseases, keyed by ontology id.
pub const DISEASE_NAMES: &[(&str, &str)] = &[
    ("EFO_0000249", "Alzheimer's Disease"),
    ("EFO_0002508", "Parkinson's Disease"),
    ("MONDO_0005180", "Parkinson's Disease"),
    ("EFO_0000384", "Crohn's Disease"),
    ("EFO_0000685", "Rheumatoid Arthritis"),
    ("EFO_0001360", "Type 2 Diabetes"),
    ("EFO_0000305", "Breast Carcinoma"),
    ("EFO_0000311", "Cancer"),
    ("MONDO_0004992", "Cancer"),
    ("EFO_0001378", "Multiple Myeloma"),
    ("EFO_0000756", "Melanoma"),
    ("EFO_0003060", "Non-small Cell Lung Carcinoma"),
    ("EFO_0003144", "Heart Failure"),
    ("EFO_0000270", "Asthma"),
    ("MONDO_0005090", "Schizophrenia"),
    ("EFO_0000474", "Epilepsy"),
    ("EFO_0003761", "Unipolar Depression"),
    ("EFO_0000537", "Hypertension"),
    ("EFO_0003767", "Inflammatory Bowel Disease"),
    ("MONDO_0005301", "Multiple Sclerosis"),
];

/// Common drugs, keyed by ChEMBL id.
pub const DRUG_NAMES: &[(&str, &str)] = &[
    ("CHEMBL1009", "Levodopa"),
    ("CHEMBL941", "Imatinib"),
    ("CHEMBL25", "Aspirin"),
    ("CHEMBL521", "Ibuprofen"),
    ("CHEMBL1431", "Metformin"),
    ("CHEMBL1487", "Atorvastatin"),
    ("CHEMBL635", "Prednisone"),
    ("CHEMBL1464", "Warfarin"),
    ("CHEMBL940", "Gabapentin"),
    ("CHEMBL301265", "Pramipexole"),
    ("CHEMBL589", "Ropinirole"),
    ("CHEMBL887", "Rasagiline"),
    ("CHEMBL59", "Dopamine"),
    ("CHEMBL54", "Haloperidol"),
];

/// Resolves display names for one identifier namespace.
pub struct NameResolver {
    curated: HashMap<&'static str, &'static str>,
    cache: Arc<NameCache>,
    source: Option<Arc<dyn NameSource>>,
}

impl NameResolver {
    pub fn new(
        curated: &'static [(&'static str, &'static str)],
        cache: Arc<NameCache>,
        source: Option<Arc<dyn NameSource>>,
    ) -> Self {
        Self {
            curated: curated.iter().copied().collect(),
            cache,
            source,
        }
    }

    /// Best available name, or `None` when only the id is known.
    pub async fn lookup(&self, id: &str) -> Option<String> {
        if let Some(name) = self.curated.get(id) {
            return Some(name.to_string());
        }
        if let Some(name) = self.cache.get(id).await {
            return Some(name);
        }

        let source = self.source.as_ref()?;
        match source.fetch_name(id).await {
            Ok(Some(name)) if !name.is_empty() => {
                self.cache.insert(id, &name).await;
                Some(name)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(id, "Name lookup failed: {e}");
                None
            }
        }
    }

    /// Best available name, falling back to the id itself.
    pub async fn name_for(&self, id: &str) -> String {
        self.lookup(id).await.unwrap_or_else(|| id.to_string())
    }

    pub fn cache(&self) -> &Arc<NameCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name_cache::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl NameSource for CountingSource {
        async fn fetch_name(&self, id: &str) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("timeout");
            }
            Ok(Some(format!("name of {id}")))
        }
    }

    async fn resolver(fail: bool) -> (NameResolver, Arc<CountingSource>) {
        let cache = Arc::new(NameCache::open("test", Box::new(MemoryBackend::new()), 10).await);
        let source = Arc::new(CountingSource { calls: AtomicUsize::new(0), fail });
        (NameResolver::new(DRUG_NAMES, cache, Some(source.clone())), source)
    }

    #[tokio::test]
    async fn test_curated_names_skip_remote() {
        let (names, source) = resolver(false).await;
        assert_eq!(names.name_for("CHEMBL25").await, "Aspirin");
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_result_is_cached() {
        let (names, source) = resolver(false).await;
        assert_eq!(names.name_for("CHEMBL999").await, "name of CHEMBL999");
        assert_eq!(names.name_for("CHEMBL999").await, "name of CHEMBL999");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_id() {
        let (names, _) = resolver(true).await;
        assert_eq!(names.name_for("CHEMBL999").await, "CHEMBL999");
        assert!(names.cache().is_empty().await);
    }
}
