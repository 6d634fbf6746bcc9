//! External collaborators
//!
//! The library never talks to the network itself. Callers plug in a
//! `MetadataSource` to turn a DOI into metadata and a `PdfSource` to turn a
//! DOI into a downloaded file.

use std::path::PathBuf;

use anyhow::Result;

use crate::models::Metadata;

/// Resolves a DOI to bibliographic metadata
pub trait MetadataSource {
    /// Returns `Ok(None)` when the DOI is unknown
    fn resolve(&self, doi: &str) -> Result<Option<Metadata>>;
}

/// Downloads the full text of a DOI
pub trait PdfSource {
    /// Returns the path of a local file holding the PDF. The library moves
    /// it into the store.
    fn fetch(&self, doi: &str) -> Result<PathBuf>;
}
