//! PDF downloads
//!
//! Downloads full texts from a URL template such as
//! `https://pdfs.example.org/{doi}`. The file is written next to the library
//! so attaching it is a plain rename.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use shelf_core::PdfSource;

use crate::doi::{normalize_doi, FETCH_TIMEOUT, USER_AGENT};

/// Placeholder replaced by the DOI in URL templates
const DOI_PLACEHOLDER: &str = "{doi}";

/// Downloads a PDF per DOI
pub struct PdfFetcher {
    client: Client,
    url_template: String,
    download_dir: PathBuf,
}

impl PdfFetcher {
    pub fn new(url_template: impl Into<String>, download_dir: impl Into<PathBuf>) -> Result<Self> {
        let url_template = url_template.into();
        if !url_template.contains(DOI_PLACEHOLDER) {
            bail!(
                "PDF URL template must contain {}: {}",
                DOI_PLACEHOLDER,
                url_template
            );
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT * 3))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url_template,
            download_dir: download_dir.into(),
        })
    }

    fn url_for(&self, doi: &str) -> String {
        self.url_template
            .replace(DOI_PLACEHOLDER, normalize_doi(doi))
    }
}

impl PdfSource for PdfFetcher {
    fn fetch(&self, doi: &str) -> Result<PathBuf> {
        let url = self.url_for(doi);
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        if !response.status().is_success() {
            bail!("{} returned {}", url, response.status());
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("Failed to download {}", url))?;
        if !is_pdf(&bytes) {
            bail!("{} did not return a PDF", url);
        }

        save_download(&self.download_dir, &bytes)
    }
}

/// PDFs start with the `%PDF` magic bytes
fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

fn save_download(dir: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let path = dir.join(format!("download-{}.part", Uuid::new_v4()));
    fs::write(&path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_template_requires_placeholder() {
        assert!(PdfFetcher::new("https://pdfs.example.org/", ".").is_err());
        assert!(PdfFetcher::new("https://pdfs.example.org/{doi}", ".").is_ok());
    }

    #[test]
    fn test_url_for() {
        let fetcher = PdfFetcher::new("https://pdfs.example.org/{doi}.pdf", ".").unwrap();
        assert_eq!(
            fetcher.url_for("doi:10.1038/171737a0"),
            "https://pdfs.example.org/10.1038/171737a0.pdf"
        );
    }

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"<!DOCTYPE html>"));
        assert!(!is_pdf(b""));
    }

    #[test]
    fn test_save_download() {
        let temp_dir = TempDir::new().unwrap();
        let path = save_download(temp_dir.path(), b"%PDF-1.7").unwrap();

        assert!(path.starts_with(temp_dir.path()));
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7");
    }
}
