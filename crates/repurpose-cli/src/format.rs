//! Rendering of a ranked response as a text table, JSON or CSV.
//!
//! All three carry the same predictions in the same order with every field
//! of the prediction record.

use repurpose_common::Prediction;
use repurpose_ranker::RankedResponse;
use serde::Serialize;

use crate::cli::OutputFormat;

const RULE_WIDTH: usize = 148;

pub fn render(response: &RankedResponse, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Table => Ok(render_table(response)),
        OutputFormat::Json => render_json(response),
        OutputFormat::Csv => render_csv(response),
    }
}

// ── Table ───────────────────────────────────────────────────────────────────

pub fn render_table(response: &RankedResponse) -> String {
    let mut out = String::new();
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    out.push_str(&heavy);
    out.push('\n');
    out.push_str(&format!("DRUG REPURPOSING CANDIDATES FOR: {}\n", response.disease.name));
    out.push_str(&format!("Disease ID: {}\n", response.disease.id));
    out.push_str(&heavy);
    out.push('\n');
    out.push_str(&format!(
        "{:<4} {:<15} {:<22} {:>6} {:<6} {:>6} {:>6} {:<15} {:<20} {:>5} {:>9} {:>7} {:>5} {:>7}\n",
        "#", "Drug ID", "Name", "Score", "Tier", "Base", "Guard", "Label", "Mechanism", "Gate",
        "Composite", "Overlap", "Assoc", "Missing"
    ));
    out.push_str(&light);
    out.push('\n');

    for (i, p) in response.predictions.iter().enumerate() {
        out.push_str(&format!(
            "{:<4} {:<15} {:<22} {:>6.3} {:<6} {:>6.3} {:>6.3} {:<15} {:<20} {:>5.2} {:>9} {:>7} {:>5.2} {:>7}\n",
            i + 1,
            p.drug.id,
            truncate(&p.drug.name, 22),
            p.score,
            p.confidence_tier.as_str(),
            p.base_score,
            p.guardrailed_score,
            p.guardrail_label.as_deref().unwrap_or("-"),
            p.mechanism.as_str(),
            p.gate_multiplier,
            p.composite_score.map(|c| format!("{c:.3}")).unwrap_or_else(|| "-".to_string()),
            p.gene_overlap_count,
            p.max_association_score,
            p.missing_features.len(),
        ));
        out.push_str(&format!("     adjustments: {}\n", adjustments(p)));
        if !p.missing_features.is_empty() {
            out.push_str(&format!("     missing: {}\n", p.missing_features.join(", ")));
        }
    }

    out.push_str(&light);
    out.push('\n');
    out.push_str(&format!("Total candidates evaluated: {}\n", response.evaluated));
    out.push_str(&format!(
        "Candidates considered: {} (skipped: {})\n",
        response.candidates_considered, response.skipped
    ));
    out.push_str(&format!(
        "Gates: {}\n",
        if response.gates_applied { "applied" } else { "not applied" }
    ));
    out.push_str(&format!("Model: {}\n", response.model));
    out.push_str(&format!(
        "Request: {} at {}\n",
        response.request_id,
        response.generated_at.to_rfc3339()
    ));
    out
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut t: String = s.chars().take(width - 1).collect();
        t.push('…');
        t
    }
}

fn adjustments(p: &Prediction) -> String {
    let chain = p.adjustments.describe();
    let chain = if chain.is_empty() { "none".to_string() } else { chain };
    if p.adjustments.clamped {
        format!("{chain} (clamped)")
    } else {
        chain
    }
}

// ── JSON ────────────────────────────────────────────────────────────────────

pub fn render_json(response: &RankedResponse) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(response)?)
}

// ── CSV ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    rank: usize,
    drug_id: &'a str,
    drug_name: &'a str,
    score: f64,
    confidence_tier: &'static str,
    base_score: f64,
    guardrailed_score: f64,
    guardrail_label: Option<&'a str>,
    mechanism: &'static str,
    gate_multiplier: f64,
    composite_score: Option<f64>,
    gene_overlap: f64,
    association_score: f64,
    missing_features: String,
    adjustments: String,
    clamped: bool,
}

impl<'a> CsvRow<'a> {
    fn new(rank: usize, p: &'a Prediction) -> Self {
        Self {
            rank,
            drug_id: &p.drug.id,
            drug_name: &p.drug.name,
            score: p.score,
            confidence_tier: p.confidence_tier.as_str(),
            base_score: p.base_score,
            guardrailed_score: p.guardrailed_score,
            guardrail_label: p.guardrail_label.as_deref(),
            mechanism: p.mechanism.as_str(),
            gate_multiplier: p.gate_multiplier,
            composite_score: p.composite_score,
            gene_overlap: p.gene_overlap_count,
            association_score: p.max_association_score,
            missing_features: p.missing_features.join(";"),
            adjustments: p.adjustments.describe(),
            clamped: p.adjustments.clamped,
        }
    }
}

pub fn render_csv(response: &RankedResponse) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for (i, p) in response.predictions.iter().enumerate() {
        writer.serialize(CsvRow::new(i + 1, p))?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("CSV flush failed: {e}"))?;
    Ok(String::from_utf8(bytes)?)
}

// ── Tests ───────────────────────────────────────────────────────────────────
