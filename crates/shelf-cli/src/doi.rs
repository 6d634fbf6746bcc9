//! DOI metadata lookup
//!
//! Resolves DOIs to CSL-JSON through content negotiation on the DOI
//! resolver (`https://doi.org/<doi>` by default).

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use shelf_core::{Metadata, MetadataSource};

/// Fetch timeout in seconds
pub const FETCH_TIMEOUT: u64 = 20;

pub const USER_AGENT: &str = concat!("shelf/", env!("CARGO_PKG_VERSION"));

const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

/// Fields dropped from resolver responses (large and not bibliographic)
const DROPPED_FIELDS: &[&str] = &["reference", "relation"];

/// HTTP DOI resolver
pub struct DoiResolver {
    client: Client,
    base_url: String,
}

impl DoiResolver {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url_for(&self, doi: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), doi)
    }
}

impl MetadataSource for DoiResolver {
    fn resolve(&self, doi: &str) -> Result<Option<Metadata>> {
        let doi = normalize_doi(doi);
        if !looks_like_doi(doi) {
            return Ok(None);
        }

        let url = self.url_for(doi);
        let response = self
            .client
            .get(&url)
            .header(ACCEPT, CSL_JSON)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            bail!("DOI resolver returned {} for {}", status, doi);
        }

        let body = response.text().context("Failed to read resolver response")?;
        parse_csl(&body)
    }
}

/// Strip URL and `doi:` prefixes from a DOI
pub fn normalize_doi(doi: &str) -> &str {
    let doi = doi.trim();
    let prefixes = [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ];
    prefixes
        .iter()
        .find_map(|prefix| doi.strip_prefix(prefix))
        .unwrap_or(doi)
        .trim()
}

/// DOIs are `10.<registrant>/<suffix>`
fn looks_like_doi(doi: &str) -> bool {
    doi.strip_prefix("10.")
        .and_then(|rest| rest.split_once('/'))
        .is_some_and(|(registrant, suffix)| !registrant.is_empty() && !suffix.is_empty())
}

/// Parse a CSL-JSON response body into metadata
fn parse_csl(body: &str) -> Result<Option<Metadata>> {
    let value: Value = serde_json::from_str(body).context("Resolver did not return JSON")?;
    let Some(mut metadata) = Metadata::from_value(value).map(Metadata::into_map) else {
        bail!("Resolver returned JSON that is not an object");
    };

    for field in DROPPED_FIELDS {
        metadata.remove(*field);
    }

    Ok(Some(Metadata::from_map(metadata)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_doi() {
        assert_eq!(normalize_doi("10.1038/171737a0"), "10.1038/171737a0");
        assert_eq!(normalize_doi(" doi:10.1038/171737a0 "), "10.1038/171737a0");
        assert_eq!(
            normalize_doi("https://doi.org/10.1038/171737a0"),
            "10.1038/171737a0"
        );
        assert_eq!(
            normalize_doi("http://dx.doi.org/10.1038/171737a0"),
            "10.1038/171737a0"
        );
    }

    #[test]
    fn test_looks_like_doi() {
        assert!(looks_like_doi("10.1038/171737a0"));
        assert!(!looks_like_doi("ThisIsNotADOI"));
        assert!(!looks_like_doi("10./x"));
        assert!(!looks_like_doi("10.1038/"));
    }

    #[test]
    fn test_fake_doi_resolves_to_none_without_network() {
        let resolver = DoiResolver::new("http://127.0.0.1:9").unwrap();
        assert!(resolver.resolve("ThisIsNotADOI").unwrap().is_none());
    }

    #[test]
    fn test_url_for() {
        let resolver = DoiResolver::new("https://doi.org/").unwrap();
        assert_eq!(
            resolver.url_for("10.1038/171737a0"),
            "https://doi.org/10.1038/171737a0"
        );
    }

    #[test]
    fn test_parse_csl() {
        let body = r#"{
            "DOI": "10.1038/171737a0",
            "author": [{"family": "Watson", "given": "J. D."}, {"family": "Crick", "given": "F. H. C."}],
            "issued": {"date-parts": [[1953, 4, 25]]},
            "title": "Molecular Structure of Nucleic Acids: A Structure for Deoxyribose Nucleic Acid",
            "reference": [{"key": "ref1"}],
            "id": "https://doi.org/10.1038/171737a0"
        }"#;

        let metadata = parse_csl(body).unwrap().unwrap();
        assert_eq!(metadata.doi(), Some("10.1038/171737a0"));
        assert_eq!(metadata.first_author_surname(), Some("Watson".to_string()));
        assert_eq!(metadata.year(), Some("1953".to_string()));
        assert!(metadata.get("reference").is_none());
        assert!(metadata.get("id").is_none());
    }

    #[test]
    fn test_parse_csl_rejects_garbage() {
        assert!(parse_csl("<html></html>").is_err());
        assert!(parse_csl("[1, 2]").is_err());
    }
}
