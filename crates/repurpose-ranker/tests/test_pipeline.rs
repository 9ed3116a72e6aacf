//! End-to-end pipeline behaviour over in-memory collaborators.

use pretty_assertions::assert_eq;
use repurpose_common::{MechanismClass, RepurposeError};
use repurpose_kg::MockKnowledgeGraph;
use repurpose_ranker::gates::MockGateChain;
use repurpose_ranker::{
    CompositeGateChain, EvidenceGate, Pipeline, PredictOutcome, PredictRequest, RankedResponse,
};
use repurpose_test_utils::*;
use std::sync::Arc;

async fn ranked(pipeline: &Pipeline, request: PredictRequest) -> RankedResponse {
    match pipeline.predict(&request).await.unwrap() {
        PredictOutcome::Ranked(r) => r,
        other => panic!("expected ranked outcome, got {other:?}"),
    }
}

fn ids(response: &RankedResponse) -> Vec<&str> {
    response.predictions.iter().map(|p| p.drug.id.as_str()).collect()
}

fn with_evidence_gate(pipeline: Pipeline) -> Pipeline {
    let chain = CompositeGateChain::new().with_gate(EvidenceGate::new(Default::default()));
    pipeline.with_gates(Arc::new(chain))
}

#[tokio::test]
async fn test_parkinsons_agonist_ranks_above_antagonist() {
    let pipeline = parkinsons_pipeline();
    let response = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY)).await;

    assert_eq!(response.disease.id, PARKINSONS_ID);
    assert_eq!(ids(&response), vec![PRAMIPEXOLE, LEVODOPA, METFORMIN, HALOPERIDOL]);

    let agonist = &response.predictions[0];
    let antagonist = &response.predictions[3];
    assert!((agonist.score - 0.72).abs() < 1e-9);
    assert!((antagonist.score - 0.06).abs() < 1e-9);
    assert_eq!(agonist.mechanism, MechanismClass::DopamineAgonist);
    assert_eq!(antagonist.guardrail_label.as_deref(), Some("contraindicated"));
    assert_eq!(antagonist.base_score, 0.60);

    assert_eq!(response.candidates_considered, 4);
    assert_eq!(response.evaluated, 4);
    assert_eq!(response.skipped, 0);
    assert!(!response.gates_applied);
}

#[tokio::test]
async fn test_every_score_is_a_probability() {
    let pipeline = with_evidence_gate(parkinsons_pipeline());
    let response = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY)).await;
    for p in &response.predictions {
        assert!((0.0..=1.0).contains(&p.score), "{} scored {}", p.drug.id, p.score);
        assert!((0.0..=1.0).contains(&p.guardrailed_score));
    }
}

#[tokio::test]
async fn test_gates_penalise_weak_evidence() {
    let pipeline = with_evidence_gate(parkinsons_pipeline());
    let response = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY)).await;

    assert!(response.gates_applied);
    let metformin = response.predictions.iter().find(|p| p.drug.id == METFORMIN).unwrap();
    assert_eq!(metformin.gate_multiplier, 0.5);
    assert!((metformin.score - 0.10).abs() < 1e-9);
    for p in &response.predictions {
        assert!((p.score - p.guardrailed_score * p.gate_multiplier).abs() < 1e-12);
    }
}

#[tokio::test]
async fn test_disabled_gates_keep_guardrailed_scores() {
    let pipeline = with_evidence_gate(parkinsons_pipeline());
    let response = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY).use_gates(false)).await;

    assert!(!response.gates_applied);
    for p in &response.predictions {
        assert_eq!(p.score, p.guardrailed_score);
        assert_eq!(p.gate_multiplier, 1.0);
    }
}

#[tokio::test]
async fn test_gate_failure_returns_guardrail_only_results() {
    let pipeline = parkinsons_pipeline().with_gates(Arc::new(MockGateChain::Failing));
    let response = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY)).await;

    assert!(!response.gates_applied);
    assert_eq!(response.predictions.len(), 4);
    for p in &response.predictions {
        assert_eq!(p.score, p.guardrailed_score);
    }
}

#[tokio::test]
async fn test_single_feature_failure_skips_one_candidate() {
    let baseline = ranked(&parkinsons_pipeline(), PredictRequest::new(PARKINSONS_QUERY)).await;

    let pipeline = Pipeline::new(
        &parkinsons_config(),
        Arc::new(parkinsons_kg()),
        Arc::new(parkinsons_features().failing(LEVODOPA)),
        passthrough_bundle(),
    )
    .unwrap();
    let response = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY)).await;

    assert_eq!(response.candidates_considered, 4);
    assert_eq!(response.evaluated, 3);
    assert_eq!(response.skipped, 1);
    assert_eq!(ids(&response), vec![PRAMIPEXOLE, METFORMIN, HALOPERIDOL]);
    for p in &response.predictions {
        let before = baseline.predictions.iter().find(|b| b.drug.id == p.drug.id).unwrap();
        assert_eq!(p.score, before.score);
    }
}

#[tokio::test]
async fn test_top_k_truncates_after_sorting() {
    let pipeline = parkinsons_pipeline();
    let response = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY).top_k(2)).await;
    assert_eq!(ids(&response), vec![PRAMIPEXOLE, LEVODOPA]);
    assert_eq!(response.evaluated, 4);
}

#[tokio::test]
async fn test_explain_changes_nothing() {
    let pipeline = parkinsons_pipeline();
    let plain = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY)).await;
    let explained = ranked(&pipeline, PredictRequest::new(PARKINSONS_QUERY).explain(true)).await;

    let scores = |r: &RankedResponse| r.predictions.iter().map(|p| p.score).collect::<Vec<_>>();
    assert_eq!(ids(&plain), ids(&explained));
    assert_eq!(scores(&plain), scores(&explained));
}

#[tokio::test]
async fn test_unknown_disease_is_not_found() {
    let err = parkinsons_pipeline()
        .predict(&PredictRequest::new("unobtainium fever"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepurposeError::DiseaseNotFound(_)));
}

#[tokio::test]
async fn test_empty_outcomes_carry_messages() {
    let kg = MockKnowledgeGraph::new().with_known_disease("EFO_0000001");
    let pipeline = Pipeline::new(
        &parkinsons_config(),
        Arc::new(kg),
        Arc::new(parkinsons_features()),
        passthrough_bundle(),
    )
    .unwrap();
    let outcome = pipeline.predict(&PredictRequest::new("EFO_0000001")).await.unwrap();
    assert!(matches!(outcome, PredictOutcome::NoCandidates { .. }));
    assert_eq!(outcome.message().as_deref(), Some("No candidate drugs found"));

    let features = parkinsons_features()
        .failing(PRAMIPEXOLE)
        .failing(HALOPERIDOL)
        .failing(LEVODOPA)
        .failing(METFORMIN);
    let pipeline = Pipeline::new(
        &parkinsons_config(),
        Arc::new(parkinsons_kg()),
        Arc::new(features),
        passthrough_bundle(),
    )
    .unwrap();
    let outcome = pipeline.predict(&PredictRequest::new(PARKINSONS_QUERY)).await.unwrap();
    assert!(matches!(outcome, PredictOutcome::NoPredictions { considered: 4, .. }));
    assert_eq!(
        outcome.message().as_deref(),
        Some("Could not compute predictions for any candidates")
    );
}
