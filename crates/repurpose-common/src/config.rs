//! Pipeline configuration.
//!
//! One immutable `PipelineConfig` is built at startup (from TOML, YAML or
//! JSON, or defaults) and passed by reference into every request.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::entities::MechanismClass;
use crate::error::{RepurposeError, Result};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub candidates: CandidateConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub guardrails: GuardrailConfig,

    #[serde(default)]
    pub gates: GateConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

// ── Disease resolution ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Ontology prefixes that mark a query as an identifier
    #[serde(default = "default_id_prefixes")]
    pub id_prefixes: Vec<String>,

    /// Namespace of true diseases (as opposed to phenotypes)
    #[serde(default = "default_disease_namespace")]
    pub disease_namespace_prefix: String,

    /// Names containing any of these are measurements/phenotypes, not diseases
    #[serde(default = "default_exclusion_terms")]
    pub exclusion_terms: Vec<String>,

    #[serde(default = "default_resolver_search_limit")]
    pub search_limit: usize,
}

fn default_id_prefixes() -> Vec<String> {
    ["EFO_", "MONDO_", "ORPHANET_", "HP_"].iter().map(|s| s.to_string()).collect()
}
fn default_disease_namespace() -> String { "MONDO_".to_string() }
fn default_exclusion_terms() -> Vec<String> {
    ["measurement", "symptom", "phenotype", "trait", "biomarker"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_resolver_search_limit() -> usize { 10 }

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            id_prefixes: default_id_prefixes(),
            disease_namespace_prefix: default_disease_namespace(),
            exclusion_terms: default_exclusion_terms(),
            search_limit: default_resolver_search_limit(),
        }
    }
}

// ── Candidate aggregation ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConfig {
    #[serde(default = "default_candidate_limit")]
    pub limit: usize,

    /// Cap on drugs already linked to the disease
    #[serde(default = "default_linked_limit")]
    pub linked_limit: usize,

    /// Cap per representative catalog query
    #[serde(default = "default_seed_search_limit")]
    pub search_limit: usize,

    /// Representative drug-name queries spanning the major therapeutic categories
    #[serde(default = "default_seed_queries")]
    pub seed_queries: Vec<String>,

    #[serde(default = "default_compound_id_pattern")]
    pub compound_id_pattern: String,
}

fn default_candidate_limit() -> usize { 100 }
fn default_linked_limit() -> usize { 50 }
fn default_seed_search_limit() -> usize { 5 }
fn default_seed_queries() -> Vec<String> {
    [
        // Neurological
        "levodopa", "dopamine", "pramipexole", "ropinirole", "rasagiline",
        // Common therapeutic categories
        "metformin", "atorvastatin", "aspirin", "ibuprofen", "prednisone",
        "adalimumab", "rituximab", "insulin", "warfarin", "gabapentin",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_compound_id_pattern() -> String { r"^CHEMBL\d+$".to_string() }

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            limit: default_candidate_limit(),
            linked_limit: default_linked_limit(),
            search_limit: default_seed_search_limit(),
            seed_queries: default_seed_queries(),
            compound_id_pattern: default_compound_id_pattern(),
        }
    }
}

// ── Scoring ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Candidates scored concurrently; output order never depends on it
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_checkpoints_dir")]
    pub checkpoints_dir: PathBuf,

    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default = "default_scaler_file")]
    pub scaler_file: String,
}

fn default_concurrency() -> usize { 4 }
fn default_checkpoints_dir() -> PathBuf { PathBuf::from("checkpoints") }
fn default_model_file() -> String { "model.json".to_string() }
fn default_scaler_file() -> String { "feature_scaler.json".to_string() }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            checkpoints_dir: default_checkpoints_dir(),
            model_file: default_model_file(),
            scaler_file: default_scaler_file(),
        }
    }
}

// ── Guardrails ───────────────────────────────────────────────────────────────

/// Maps a disease to a category by name keyword or therapeutic area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub therapeutic_areas: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailRule {
    pub category: String,
    pub mechanism: MechanismClass,
    pub multiplier: f64,
    pub label: String,
}

/// Data-driven guardrail table. Categories and rules are both evaluated in
/// order; the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailConfig {
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryRule>,

    #[serde(default = "default_rules")]
    pub rules: Vec<GuardrailRule>,
}

fn default_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule {
            category: "parkinsons".to_string(),
            keywords: vec!["parkinson".to_string()],
            therapeutic_areas: vec![],
        },
        CategoryRule {
            category: "oncology".to_string(),
            keywords: [
                "cancer", "carcinoma", "tumor", "tumour", "leukemia", "lymphoma",
                "melanoma", "sarcoma", "myeloma", "glioblastoma", "neuroblastoma",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            therapeutic_areas: vec!["ONCOLOGY".to_string()],
        },
    ]
}

fn rule(category: &str, mechanism: MechanismClass, multiplier: f64, label: &str) -> GuardrailRule {
    GuardrailRule {
        category: category.to_string(),
        mechanism,
        multiplier,
        label: label.to_string(),
    }
}

fn default_rules() -> Vec<GuardrailRule> {
    vec![
        rule("parkinsons", MechanismClass::DopamineAntagonist, 0.1, "contraindicated"),
        rule("parkinsons", MechanismClass::Anticholinergic,    0.3, "risky"),
        rule("parkinsons", MechanismClass::DopamineAgonist,    1.2, "aligned"),
        rule("oncology",   MechanismClass::KinaseInhibitor,    1.1, "aligned"),
        rule("oncology",   MechanismClass::Antibody,           1.1, "aligned"),
    ]
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            rules: default_rules(),
        }
    }
}

// ── Gates ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub evidence: EvidenceGateConfig,
}

fn default_true() -> bool { true }

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            evidence: EvidenceGateConfig::default(),
        }
    }
}

/// Penalise candidates with neither shared genes nor a meaningful association.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceGateConfig {
    #[serde(default = "default_min_gene_overlap")]
    pub min_gene_overlap: f64,

    #[serde(default = "default_min_association")]
    pub min_association: f64,

    #[serde(default = "default_evidence_penalty")]
    pub penalty: f64,
}

fn default_min_gene_overlap() -> f64 { 1.0 }
fn default_min_association() -> f64 { 0.1 }
fn default_evidence_penalty() -> f64 { 0.5 }

impl Default for EvidenceGateConfig {
    fn default() -> Self {
        Self {
            min_gene_overlap: default_min_gene_overlap(),
            min_association: default_min_association(),
            penalty: default_evidence_penalty(),
        }
    }
}

// ── Output ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (table, json, csv)
    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_format() -> String { "table".to_string() }
fn default_top_k() -> usize { 10 }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            top_k: default_top_k(),
        }
    }
}

// ── HTTP collaborators ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_opentargets_url")]
    pub opentargets_url: String,

    #[serde(default = "default_chembl_url")]
    pub chembl_url: String,
}

fn default_timeout_secs() -> u64 { 10 }
fn default_opentargets_url() -> String {
    "https://api.platform.opentargets.org/api/v4/graphql".to_string()
}
fn default_chembl_url() -> String { "https://www.ebi.ac.uk/chembl/api/data".to_string() }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            opentargets_url: default_opentargets_url(),
            chembl_url: default_chembl_url(),
        }
    }
}

// ── Name cache ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory for the name caches; defaults to the platform cache dir
    pub dir: Option<PathBuf>,

    /// Flush to disk after this many new entries
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

fn default_flush_every() -> usize { 10 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            flush_every: default_flush_every(),
        }
    }
}

impl CacheConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| {
                    warn!("No platform cache directory; using ./.cache");
                    PathBuf::from(".cache")
                })
                .join("repurpose")
        })
    }
}

// ── Helper Methods ───────────────────────────────────────────────────────────

impl PipelineConfig {
    /// Load from a TOML, YAML or JSON file, chosen by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("toml")
            .to_ascii_lowercase();

        let config: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| RepurposeError::Config(format!("{}: {e}", path.display())))?,
            "json" => serde_json::from_str(&content)?,
            other => {
                if other != "toml" {
                    warn!(path = %path.display(), "Unrecognised config extension; parsing as TOML");
                }
                toml::from_str(&content)
                    .map_err(|e| RepurposeError::Config(format!("{}: {e}", path.display())))?
            }
        };
        config.validate()?;
        debug!(path = %path.display(), format = %ext, "Parsed pipeline configuration");
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| RepurposeError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.top_k == 0 {
            return Err(RepurposeError::Config("output.top_k must be positive".into()));
        }
        if self.candidates.limit == 0 {
            return Err(RepurposeError::Config("candidates.limit must be positive".into()));
        }
        if self.scoring.concurrency == 0 {
            return Err(RepurposeError::Config("scoring.concurrency must be positive".into()));
        }
        if let Err(e) = regex::Regex::new(&self.candidates.compound_id_pattern) {
            return Err(RepurposeError::Config(format!(
                "candidates.compound_id_pattern is not a valid regex: {e}"
            )));
        }
        for r in &self.guardrails.rules {
            if !(r.multiplier.is_finite() && r.multiplier > 0.0) {
                return Err(RepurposeError::Config(format!(
                    "guardrail multiplier for {}/{} must be positive, got {}",
                    r.category, r.mechanism, r.multiplier
                )));
            }
        }
        let penalty = self.gates.evidence.penalty;
        if !(penalty.is_finite() && penalty > 0.0) {
            return Err(RepurposeError::Config(format!(
                "gates.evidence.penalty must be positive, got {penalty}"
            )));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
