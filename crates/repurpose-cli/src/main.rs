//! Repurpose — drug repurposing candidate ranking.
//! Entry point for the `repurpose` binary.

mod cli;
mod format;

use clap::Parser;
use repurpose_common::sandbox::SandboxClient;
use repurpose_common::{PipelineConfig, RepurposeError};
use repurpose_kg::chembl::ChemblClient;
use repurpose_kg::names::{DISEASE_NAMES, DRUG_NAMES};
use repurpose_kg::opentargets::OpenTargetsClient;
use repurpose_kg::{JsonFileBackend, KnowledgeGraph, NameCache, NameResolver, NameSource};
use repurpose_ranker::{
    CompositeGateChain, EvidenceGate, ModelBundle, OpenTargetsFeatureEngine, Pipeline, PredictOutcome,
    PredictRequest,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Results go to stdout; logs to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("repurpose=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = cli.load_config()?;

    // The model is a hard dependency: absent → message, invalid → fatal.
    let bundle = match ModelBundle::load(
        &config.scoring.checkpoints_dir,
        &config.scoring.model_file,
        &config.scoring.scaler_file,
    ) {
        Ok(bundle) => Arc::new(bundle),
        Err(e @ RepurposeError::ModelNotFound(_)) => {
            println!("Error: {e}. Train a model first.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!(model = %bundle.name, "✅ Model loaded");

    let http = SandboxClient::new(&config.http)?;
    let opentargets = Arc::new(OpenTargetsClient::new(http.clone(), &config.http.opentargets_url));
    let chembl = Arc::new(ChemblClient::new(http, &config.http.chembl_url));

    let (disease_cache, drug_cache) = open_name_caches(&config).await;
    let disease_source: Arc<dyn NameSource> = opentargets.clone();
    let drug_source: Arc<dyn NameSource> = chembl;
    let disease_names = Arc::new(NameResolver::new(DISEASE_NAMES, disease_cache.clone(), Some(disease_source)));
    let drug_names = Arc::new(NameResolver::new(DRUG_NAMES, drug_cache.clone(), Some(drug_source)));

    let kg: Arc<dyn KnowledgeGraph> = opentargets.clone();
    let features = Arc::new(OpenTargetsFeatureEngine::new(opentargets));

    let mut pipeline = Pipeline::new(&config, kg, features, bundle)?.with_names(disease_names, drug_names);
    if config.gates.enabled {
        let chain = CompositeGateChain::new().with_gate(EvidenceGate::new(config.gates.evidence.clone()));
        pipeline = pipeline.with_gates(Arc::new(chain));
    } else {
        info!("Gate chain disabled in configuration");
    }

    let request = PredictRequest::new(cli.disease.clone())
        .top_k(cli.top_k(&config))
        .use_gates(!cli.no_gates)
        .explain(cli.explain);

    let outcome = pipeline.predict(&request).await;

    disease_cache.flush().await;
    drug_cache.flush().await;

    match outcome {
        Ok(PredictOutcome::Ranked(response)) => {
            print!("{}", format::render(&response, cli.output_format(&config))?);
        }
        Ok(other) => {
            if let Some(message) = other.message() {
                println!("{message}");
            }
        }
        Err(e) if e.is_not_found() => println!("Error: {e}"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Disease and drug name caches under the configured cache directory.
async fn open_name_caches(config: &PipelineConfig) -> (Arc<NameCache>, Arc<NameCache>) {
    let dir = config.cache.resolved_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        warn!(dir = %dir.display(), "Could not create cache directory: {e}");
    }

    let disease = NameCache::open(
        "disease_names",
        Box::new(JsonFileBackend::new(dir.join("disease_names.json"))),
        config.cache.flush_every,
    )
    .await;
    let drug = NameCache::open(
        "drug_names",
        Box::new(JsonFileBackend::new(dir.join("drug_names.json"))),
        config.cache.flush_every,
    )
    .await;
    (Arc::new(disease), Arc::new(drug))
}
