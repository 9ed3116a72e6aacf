//! ChEMBL API client, used for human-readable compound names.
//!
//! API docs: https://chembl.gitbook.io/chembl-interface-documentation/web-resources/chembl-api
//! Endpoint: https://www.ebi.ac.uk/chembl/api/data

use async_trait::async_trait;
use repurpose_common::sandbox::SandboxClient;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::names::NameSource;

/// Subset of the ChEMBL molecule record needed for naming.
#[derive(Debug, Clone, Deserialize)]
pub struct MoleculeRecord {
    pub molecule_chembl_id: String,
    pub pref_name: Option<String>,
    #[serde(default)]
    pub molecule_synonyms: Vec<MoleculeSynonym>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoleculeSynonym {
    pub molecule_synonym: String,
    #[serde(default)]
    pub syn_type: String,
}

impl MoleculeRecord {
    /// Preferred name, else an INN/USAN/BAN synonym, else any synonym.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.pref_name.as_ref().filter(|n| !n.is_empty()) {
            return Some(name.clone());
        }
        self.molecule_synonyms
            .iter()
            .find(|s| matches!(s.syn_type.to_uppercase().as_str(), "INN" | "USAN" | "BAN"))
            .or_else(|| self.molecule_synonyms.first())
            .map(|s| s.molecule_synonym.clone())
    }
}

/// ChEMBL client for compound data.
pub struct ChemblClient {
    client: SandboxClient,
    base_url: String,
}

impl ChemblClient {
    pub fn new(client: SandboxClient, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }

    /// Fetch molecule by ChEMBL ID.
    #[instrument(skip(self))]
    pub async fn fetch_molecule(&self, chembl_id: &str) -> anyhow::Result<Option<MoleculeRecord>> {
        let url = format!("{}/molecule/{}.json", self.base_url.trim_end_matches('/'), chembl_id);

        debug!(chembl_id = chembl_id, "Fetching ChEMBL molecule");

        let resp = self.client
            .get(&url)?
            .send()
            .await?;

        if !resp.status().is_success() {
            return Ok(None);
        }

        Ok(Some(resp.json().await?))
    }
}

#[async_trait]
impl NameSource for ChemblClient {
    async fn fetch_name(&self, id: &str) -> anyhow::Result<Option<String>> {
        Ok(self.fetch_molecule(id).await?.and_then(|m| m.display_name()))
    }
}
