//! Shared fixtures and in-memory collaborators for integration tests.

use repurpose_common::{Disease, Drug, FeatureSchema, MechanismClass, PipelineConfig};
use repurpose_kg::{MemoryBackend, MockKnowledgeGraph, NameCache, NameResolver};
use repurpose_ranker::features::MockFeatureSource;
use repurpose_ranker::model::{LinearModel, MockModel, ModelOutput};
use repurpose_ranker::{ModelBundle, Pipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PARKINSONS_QUERY: &str = "Parkinson's disease";
pub const PARKINSONS_ID: &str = "MONDO_0005180";

pub const PRAMIPEXOLE: &str = "CHEMBL301265";
pub const HALOPERIDOL: &str = "CHEMBL54";
pub const LEVODOPA: &str = "CHEMBL1009";
pub const METFORMIN: &str = "CHEMBL1431";
pub const IMATINIB: &str = "CHEMBL941";

pub fn drug(id: &str, name: &str) -> Drug {
    Drug::new(id, name)
}

/// Search results for the Parkinson's query, phenotype and measurement hits first.
pub fn parkinsons_search_hits() -> Vec<Disease> {
    vec![
        Disease::new("HP_0001300", "Parkinsonism phenotype"),
        Disease::new("EFO_0004587", "Parkinson's disease symptom measurement"),
        Disease::new("EFO_0002508", "Parkinson's disease"),
        Disease::new(PARKINSONS_ID, "Parkinson disease"),
    ]
}

/// Knowledge graph around Parkinson's disease: linked drugs, one catalog
/// query per drug, and mechanism classes.
pub fn parkinsons_kg() -> MockKnowledgeGraph {
    MockKnowledgeGraph::new()
        .with_disease_hits(PARKINSONS_QUERY, parkinsons_search_hits())
        .with_known_disease(PARKINSONS_ID)
        .with_linked(PARKINSONS_ID, vec![
            drug(PRAMIPEXOLE, "PRAMIPEXOLE"),
            drug(LEVODOPA, "LEVODOPA"),
        ])
        .with_drug_hits("haloperidol", vec![drug(HALOPERIDOL, "HALOPERIDOL")])
        .with_drug_hits("levodopa", vec![drug(LEVODOPA, "LEVODOPA")])
        .with_drug_hits("metformin", vec![drug(METFORMIN, "METFORMIN")])
        .with_mechanism(PRAMIPEXOLE, MechanismClass::DopamineAgonist)
        .with_mechanism(HALOPERIDOL, MechanismClass::DopamineAntagonist)
        .with_mechanism(LEVODOPA, MechanismClass::Other)
        .with_mechanism(METFORMIN, MechanismClass::Other)
}

/// Seed queries matching `parkinsons_kg`.
pub fn parkinsons_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.candidates.seed_queries = ["haloperidol", "levodopa", "metformin"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    config
}

/// Features whose `genetic_score` is the intended base probability.
pub fn parkinsons_features() -> MockFeatureSource {
    MockFeatureSource::new()
        .with(PRAMIPEXOLE, &[("genetic_score", 0.60), ("gene_overlap_count", 2.0), ("max_association_score", 0.7)])
        .with(HALOPERIDOL, &[("genetic_score", 0.60), ("gene_overlap_count", 1.0), ("max_association_score", 0.4)])
        .with(LEVODOPA, &[("genetic_score", 0.55), ("gene_overlap_count", 3.0), ("max_association_score", 0.9)])
        .with(METFORMIN, &[("genetic_score", 0.20)])
}

/// Model whose raw output is the `genetic_score` feature.
pub fn passthrough_bundle() -> Arc<ModelBundle> {
    let schema = FeatureSchema::default();
    let model = MockModel::from_fn(&schema, |x| Ok(x[0]));
    Arc::new(ModelBundle::new(Arc::new(model), None, schema).expect("schema matches"))
}

/// JSON linear model equivalent to `passthrough_bundle`.
pub fn passthrough_linear_model() -> LinearModel {
    let schema = FeatureSchema::default();
    let mut weights = vec![0.0; schema.len()];
    weights[0] = 1.0;
    LinearModel {
        name: "Passthrough".to_string(),
        feature_names: schema.names().to_vec(),
        weights,
        bias: 0.0,
        output: ModelOutput::Logit,
    }
}

/// Write `passthrough_linear_model` to `dir/model.json`.
pub fn write_model(dir: &Path) -> PathBuf {
    let path = dir.join("model.json");
    let json = serde_json::to_string_pretty(&passthrough_linear_model()).expect("model serialises");
    std::fs::write(&path, json).expect("model written");
    path
}

/// Name resolver over an in-memory cache.
pub async fn memory_names(curated: &'static [(&'static str, &'static str)]) -> Arc<NameResolver> {
    let cache = Arc::new(NameCache::open("test", Box::new(MemoryBackend::new()), 10).await);
    Arc::new(NameResolver::new(curated, cache, None))
}

/// Full pipeline over the Parkinson's fixtures, no gate chain attached.
pub fn parkinsons_pipeline() -> Pipeline {
    Pipeline::new(
        &parkinsons_config(),
        Arc::new(parkinsons_kg()),
        Arc::new(parkinsons_features()),
        passthrough_bundle(),
    )
    .expect("default config is valid")
}
