//! Disease resolution and candidate aggregation over the Parkinson's fixtures.

use pretty_assertions::assert_eq;
use repurpose_common::config::{CandidateConfig, ResolverConfig};
use repurpose_common::RepurposeError;
use repurpose_kg::{CandidateAggregator, DiseaseResolver, MockKnowledgeGraph};
use repurpose_test_utils::*;
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_parkinsons_resolves_to_disease_namespace() {
    let resolver = DiseaseResolver::new(Arc::new(parkinsons_kg()), ResolverConfig::default());
    let disease = resolver.resolve(PARKINSONS_QUERY).await.unwrap();
    assert_eq!(disease.id, PARKINSONS_ID);
    assert_eq!(disease.name, "Parkinson disease");
}

#[tokio::test]
async fn test_identifier_uses_cached_display_name() {
    let names = memory_names(&[]).await;
    names.cache().insert(PARKINSONS_ID, "Parkinson disease").await;

    let resolver = DiseaseResolver::new(Arc::new(parkinsons_kg()), ResolverConfig::default())
        .with_names(names);
    let disease = resolver.resolve("mondo_0005180").await;
    // Identifiers are verified verbatim; only the prefix check ignores case.
    assert!(matches!(disease, Err(RepurposeError::DiseaseNotFound(_))));

    let disease = resolver.resolve(PARKINSONS_ID).await.unwrap();
    assert_eq!(disease.name, "Parkinson disease");
}

#[tokio::test]
async fn test_search_outage_is_not_found() {
    let kg = parkinsons_kg().failing(PARKINSONS_QUERY);
    let resolver = DiseaseResolver::new(Arc::new(kg), ResolverConfig::default());
    let err = resolver.resolve(PARKINSONS_QUERY).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_aggregation_merges_without_duplicates() {
    let aggregator =
        CandidateAggregator::new(Arc::new(parkinsons_kg()), parkinsons_config().candidates).unwrap();
    let drugs = aggregator.collect(PARKINSONS_ID, 100).await;

    let ids: Vec<&str> = drugs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec![PRAMIPEXOLE, LEVODOPA, HALOPERIDOL, METFORMIN]);
    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
}

#[tokio::test]
async fn test_aggregation_survives_linked_outage() {
    let kg = parkinsons_kg().failing_linked().failing("levodopa");
    let aggregator = CandidateAggregator::new(Arc::new(kg), parkinsons_config().candidates).unwrap();
    let drugs = aggregator.collect(PARKINSONS_ID, 100).await;

    let ids: Vec<&str> = drugs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec![HALOPERIDOL, METFORMIN]);
}

#[tokio::test]
async fn test_unnamed_drugs_get_display_names() {
    let kg = MockKnowledgeGraph::new().with_linked(PARKINSONS_ID, vec![drug(IMATINIB, "")]);
    let config = CandidateConfig {
        seed_queries: vec![],
        ..CandidateConfig::default()
    };
    let names = memory_names(&[(IMATINIB, "Imatinib")]).await;
    let aggregator = CandidateAggregator::new(Arc::new(kg), config).unwrap().with_names(names);

    let drugs = aggregator.collect(PARKINSONS_ID, 10).await;
    assert_eq!(drugs.len(), 1);
    assert_eq!(drugs[0].name, "Imatinib");
}
