//! Attachment command handlers

use std::path::PathBuf;

use anyhow::{Context, Result};

use shelf_core::{Config, Library};

use crate::commands::resolve_key;
use crate::output::Output;
use crate::pdf::PdfFetcher;

/// Move a local PDF into the library as the attachment of a record
pub fn attach(library: &Library, key: String, file: PathBuf, output: &Output) -> Result<()> {
    let id = resolve_key(library, &key)?;
    let target = library
        .attach(&id, &file)
        .with_context(|| format!("Failed to attach {:?}", file))?;

    output.success(&format!("Attached {}", target.display()));
    Ok(())
}

/// Download the PDF of a record through its DOI
pub fn fetch_pdf(library: &Library, config: &Config, key: String, output: &Output) -> Result<()> {
    let id = resolve_key(library, &key)?;
    let template = config.pdf_url.as_deref().context(
        "No PDF source configured. Set one with:\n  shelf config set pdf_url 'https://host/{doi}'",
    )?;

    let fetcher = PdfFetcher::new(template, library.path())?;
    let target = library.fetch_pdf(&id, &fetcher)?;

    output.success(&format!("Attached {}", target.display()));
    Ok(())
}
