//! OpenTargets Platform GraphQL client.
//!
//! OpenTargets links diseases (EFO/MONDO), targets and drugs (ChEMBL):
//!   - free-text search over diseases and drugs
//!   - disease ↔ target association scores with per-datatype breakdown
//!   - known drugs per disease (clinical precedence)
//!   - drug mechanisms of action with their targets
//!
//! API docs: https://platform-docs.opentargets.org/data-access/graphql-api
//! Endpoint: https://api.platform.opentargets.org/api/v4/graphql

use async_trait::async_trait;
use repurpose_common::sandbox::SandboxClient;
use repurpose_common::{Disease, Drug, MechanismClass};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::client::KnowledgeGraph;
use crate::names::NameSource;

const SEARCH_QUERY: &str = r#"
query Search($q: String!, $entity: String!, $size: Int!) {
  search(queryString: $q, entityNames: [$entity], page: {index: 0, size: $size}) {
    hits { id name entity }
  }
}"#;

const DISEASE_QUERY: &str = r#"
query Disease($id: String!) {
  disease(efoId: $id) {
    id
    name
    therapeuticAreas { id name }
    associatedTargets(page: {index: 0, size: 1}) { count }
  }
}"#;

const KNOWN_DRUGS_QUERY: &str = r#"
query KnownDrugs($id: String!, $size: Int!) {
  disease(efoId: $id) {
    knownDrugs(size: $size) { rows { drug { id name } } }
  }
}"#;

const ASSOCIATIONS_QUERY: &str = r#"
query Associations($id: String!, $size: Int!) {
  disease(efoId: $id) {
    associatedTargets(page: {index: 0, size: $size}) {
      rows {
        target { id approvedSymbol }
        score
        datatypeScores { id score }
      }
    }
  }
}"#;

const DRUG_QUERY: &str = r#"
query Drug($id: String!) {
  drug(chemblId: $id) {
    id
    name
    drugType
    mechanismsOfAction {
      rows {
        mechanismOfAction
        actionType
        targets { id approvedSymbol }
      }
    }
  }
}"#;

/// Therapeutic-area display names mapped to the codes guardrails match on.
const THERAPEUTIC_AREAS: &[(&str, &str)] = &[
    ("cancer or benign tumor",         "ONCOLOGY"),
    ("nervous system disease",         "NEUROLOGY"),
    ("psychiatric disorder",           "PSYCHIATRY"),
    ("cardiovascular disease",         "CARDIOVASCULAR"),
    ("immune system disease",          "IMMUNOLOGY"),
    ("infectious disease",             "INFECTIOUS"),
    ("metabolic disease",              "METABOLIC"),
    ("endocrine system disease",       "METABOLIC"),
    ("respiratory or thoracic disease", "RESPIRATORY"),
    ("gastrointestinal disease",       "GASTROENTEROLOGY"),
];

// ── Response shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    search: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    name: String,
    #[serde(default)]
    entity: String,
}

#[derive(Debug, Deserialize)]
struct DiseaseData<T> {
    disease: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiseaseRecord {
    name: String,
    #[serde(default)]
    therapeutic_areas: Vec<NamedRef>,
    associated_targets: Option<CountRef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CountRef {
    count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KnownDrugsRecord {
    known_drugs: Option<RowsOf<KnownDrugRow>>,
}

#[derive(Debug, Deserialize)]
struct RowsOf<T> {
    #[serde(default = "Vec::new")]
    rows: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct KnownDrugRow {
    drug: Option<DrugRef>,
}

#[derive(Debug, Deserialize)]
struct DrugRef {
    id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociationsRecord {
    associated_targets: RowsOf<AssociationRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssociationRow {
    target: TargetRef,
    score: f64,
    #[serde(default)]
    datatype_scores: Vec<DatatypeScore>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub id: String,
    pub approved_symbol: String,
}

#[derive(Debug, Deserialize)]
struct DatatypeScore {
    id: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct DrugData {
    drug: Option<DrugRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DrugRecord {
    drug_type: Option<String>,
    mechanisms_of_action: Option<RowsOf<MechanismRow>>,
}

/// One mechanism-of-action row for a drug.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MechanismRow {
    pub mechanism_of_action: String,
    pub action_type: Option<String>,
    #[serde(default)]
    pub targets: Vec<TargetRef>,
}

/// A disease ↔ target association with the datatype scores the feature engine uses.
#[derive(Debug, Clone)]
pub struct TargetAssociation {
    pub target_id: String,
    pub symbol: String,
    pub score: f64,
    pub genetic_score: f64,
    pub somatic_score: f64,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// OpenTargets client for disease, drug and association data.
pub struct OpenTargetsClient {
    client: SandboxClient,
    endpoint: String,
}

impl OpenTargetsClient {
    pub fn new(client: SandboxClient, endpoint: impl Into<String>) -> Self {
        Self { client, endpoint: endpoint.into() }
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: serde_json::Value) -> anyhow::Result<T> {
        let resp = self.client
            .post(&self.endpoint)?
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("OpenTargets returned HTTP {}", resp.status());
        }

        let body: GraphQlResponse<T> = resp.json().await?;
        if let Some(err) = body.errors.first() {
            anyhow::bail!("OpenTargets GraphQL error: {}", err.message);
        }
        body.data.ok_or_else(|| anyhow::anyhow!("OpenTargets response carried no data"))
    }

    async fn search(&self, query: &str, entity: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>> {
        let data: SearchData = self
            .graphql(SEARCH_QUERY, json!({ "q": query, "entity": entity, "size": limit }))
            .await?;
        Ok(data
            .search
            .hits
            .into_iter()
            .filter(|h| h.entity.is_empty() || h.entity == entity)
            .take(limit)
            .collect())
    }

    async fn disease_record(&self, disease_id: &str) -> anyhow::Result<Option<DiseaseRecord>> {
        let data: DiseaseData<DiseaseRecord> = self
            .graphql(DISEASE_QUERY, json!({ "id": disease_id }))
            .await?;
        Ok(data.disease)
    }

    /// Top associated targets for a disease, by overall association score.
    #[instrument(skip(self))]
    pub async fn disease_associations(&self, disease_id: &str, limit: usize) -> anyhow::Result<Vec<TargetAssociation>> {
        let data: DiseaseData<AssociationsRecord> = self
            .graphql(ASSOCIATIONS_QUERY, json!({ "id": disease_id, "size": limit }))
            .await?;
        let Some(record) = data.disease else {
            return Ok(Vec::new());
        };

        Ok(record
            .associated_targets
            .rows
            .into_iter()
            .map(|row| {
                let datatype = |id: &str| {
                    row.datatype_scores
                        .iter()
                        .find(|d| d.id == id)
                        .map(|d| d.score)
                        .unwrap_or(0.0)
                };
                TargetAssociation {
                    genetic_score: datatype("genetic_association"),
                    somatic_score: datatype("somatic_mutation"),
                    target_id: row.target.id.clone(),
                    symbol: row.target.approved_symbol.clone(),
                    score: row.score,
                }
            })
            .collect())
    }

    /// Drug type and mechanism rows for a ChEMBL id.
    #[instrument(skip(self))]
    pub async fn drug_mechanisms(&self, drug_id: &str) -> anyhow::Result<(Option<String>, Vec<MechanismRow>)> {
        let data: DrugData = self.graphql(DRUG_QUERY, json!({ "id": drug_id })).await?;
        let Some(drug) = data.drug else {
            anyhow::bail!("drug {drug_id} not found in OpenTargets");
        };
        let rows = drug.mechanisms_of_action.map(|m| m.rows).unwrap_or_default();
        Ok((drug.drug_type, rows))
    }
}

#[async_trait]
impl KnowledgeGraph for OpenTargetsClient {
    #[instrument(skip(self))]
    async fn resolve_candidates(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Disease>> {
        let hits = self.search(query, "disease", limit).await?;
        debug!(query, hits = hits.len(), "Disease search complete");
        Ok(hits.into_iter().map(|h| Disease::new(h.id, h.name)).collect())
    }

    #[instrument(skip(self))]
    async fn verify(&self, disease_id: &str) -> anyhow::Result<bool> {
        let record = self.disease_record(disease_id).await?;
        Ok(record
            .and_then(|r| r.associated_targets)
            .map(|t| t.count > 0)
            .unwrap_or(false))
    }

    #[instrument(skip(self))]
    async fn linked_drugs(&self, disease_id: &str, limit: usize) -> anyhow::Result<Vec<Drug>> {
        let data: DiseaseData<KnownDrugsRecord> = self
            .graphql(KNOWN_DRUGS_QUERY, json!({ "id": disease_id, "size": limit }))
            .await?;
        let rows = data
            .disease
            .and_then(|d| d.known_drugs)
            .map(|k| k.rows)
            .unwrap_or_default();

        Ok(rows
            .into_iter()
            .filter_map(|r| r.drug)
            .map(|d| {
                let name = d.name.unwrap_or_default();
                Drug::new(d.id, name)
            })
            .take(limit)
            .collect())
    }

    #[instrument(skip(self))]
    async fn search_drugs(&self, query: &str, limit: usize) -> anyhow::Result<Vec<Drug>> {
        let hits = self.search(query, "drug", limit).await?;
        Ok(hits.into_iter().map(|h| Drug::new(h.id, h.name)).collect())
    }

    #[instrument(skip(self))]
    async fn therapeutic_areas(&self, disease_id: &str) -> anyhow::Result<Vec<String>> {
        let record = self.disease_record(disease_id).await?;
        Ok(record
            .map(|r| {
                r.therapeutic_areas
                    .iter()
                    .map(|a| therapeutic_area_code(&a.name))
                    .collect()
            })
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn mechanism(&self, drug_id: &str) -> anyhow::Result<MechanismClass> {
        let (drug_type, rows) = self.drug_mechanisms(drug_id).await?;
        Ok(classify_mechanism(drug_type.as_deref(), &rows))
    }
}

#[async_trait]
impl NameSource for OpenTargetsClient {
    async fn fetch_name(&self, id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.disease_record(id).await?.map(|r| r.name))
    }
}

/// Map an OpenTargets therapeutic-area name to its guardrail code.
pub fn therapeutic_area_code(name: &str) -> String {
    let lower = name.to_lowercase();
    THERAPEUTIC_AREAS
        .iter()
        .find(|(area, _)| *area == lower)
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| "OTHER".to_string())
}

/// Classify a drug's mode of action from its type and mechanism rows.
/// Rows are inspected in order; the first recognised pattern wins.
pub fn classify_mechanism(drug_type: Option<&str>, rows: &[MechanismRow]) -> MechanismClass {
    if drug_type.is_some_and(|t| t.eq_ignore_ascii_case("antibody")) {
        return MechanismClass::Antibody;
    }

    for row in rows {
        let text = row.mechanism_of_action.to_lowercase();
        let action = row.action_type.as_deref().unwrap_or("").to_uppercase();
        let antagonist = action.contains("ANTAGONIST") || action == "INVERSE AGONIST" || action == "BLOCKER";

        if text.contains("dopamine") {
            if antagonist {
                return MechanismClass::DopamineAntagonist;
            }
            if action.contains("AGONIST") {
                return MechanismClass::DopamineAgonist;
            }
        }
        if (text.contains("muscarinic") || text.contains("acetylcholine receptor")) && antagonist {
            return MechanismClass::Anticholinergic;
        }
        if text.contains("kinase") && action.contains("INHIBITOR") {
            return MechanismClass::KinaseInhibitor;
        }
    }

    if rows.is_empty() {
        MechanismClass::Unknown
    } else {
        MechanismClass::Other
    }
}
