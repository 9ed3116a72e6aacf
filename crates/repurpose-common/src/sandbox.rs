use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

use crate::config::HttpConfig;
use crate::error::RepurposeError;

/// An HTTP client capped to the knowledge-graph hosts and bounded by a per-call timeout.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Builds a client allowing the OpenTargets and ChEMBL hosts named in `config`.
    pub fn new(config: &HttpConfig) -> Result<Self, RepurposeError> {
        let mut allowlist = HashSet::new();
        for endpoint in [&config.opentargets_url, &config.chembl_url] {
            if let Some(host) = Url::parse(endpoint).ok().and_then(|u| u.host_str().map(String::from)) {
                allowlist.insert(host);
            }
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repurpose/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RepurposeError::StartupFatal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Validates if a URL is permitted under the current policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(String::from)) else {
            return false;
        };
        self.allowlist
            .iter()
            .any(|allowed| host == *allowed || host.ends_with(&format!(".{allowed}")))
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, RepurposeError> {
        self.check(url)?;
        Ok(self.client.get(url))
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, RepurposeError> {
        self.check(url)?;
        Ok(self.client.post(url))
    }

    fn check(&self, url: &str) -> Result<(), RepurposeError> {
        if self.is_allowed(url) {
            Ok(())
        } else {
            Err(RepurposeError::Security(format!("domain not in allowlist for URL {url}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hosts_allowed() {
        let client = SandboxClient::new(&HttpConfig::default()).unwrap();
        assert!(client.is_allowed("https://api.platform.opentargets.org/api/v4/graphql"));
        assert!(client.is_allowed("https://www.ebi.ac.uk/chembl/api/data/molecule/CHEMBL25.json"));
        assert!(!client.is_allowed("https://example.com/"));
        assert!(!client.is_allowed("not a url"));
    }

    #[test]
    fn test_disallowed_request_is_refused() {
        let client = SandboxClient::new(&HttpConfig::default()).unwrap();
        assert!(matches!(client.get("https://example.com/x"), Err(RepurposeError::Security(_))));
    }

    #[test]
    fn test_allow_domain_covers_subdomains() {
        let mut client = SandboxClient::new(&HttpConfig::default()).unwrap();
        client.allow_domain("localhost");
        assert!(client.is_allowed("http://localhost:8080/graphql"));
    }
}
