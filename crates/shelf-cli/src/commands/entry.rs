//! Record command handlers

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::Value;

use shelf_core::{Config, Library, Metadata};

use crate::commands::resolve_key;
use crate::doi::DoiResolver;
use crate::editor::edit_file;
use crate::output::Output;

/// Where the metadata of a new record comes from
#[derive(Debug, Default)]
pub struct AddArgs {
    pub doi: Option<String>,
    pub file: Option<PathBuf>,
    pub author: Option<String>,
    pub year: Option<String>,
    pub title: Option<String>,
}

/// List all records
pub fn list(library: &Library, output: &Output) -> Result<()> {
    output.print_entries(library.entries());
    Ok(())
}

/// Show a single record
pub fn show(library: &Library, key: String, output: &Output) -> Result<()> {
    let id = resolve_key(library, &key)?;
    let entry = library
        .entry(&id)
        .ok_or_else(|| anyhow::anyhow!("Record not found: {}", key))?;

    output.print_entry(entry, library.attachment(&id).is_some());
    Ok(())
}

/// Add records from a DOI, a JSON file, or individual fields
pub fn add(library: &mut Library, config: &Config, args: AddArgs, output: &Output) -> Result<()> {
    if let Some(doi) = args.doi {
        let resolver = DoiResolver::new(&config.doi_resolver)?;
        let Some(id) = library.import_doi(&doi, &resolver)? else {
            bail!("DOI not found: {}", doi);
        };
        output.success(&format!("Added {}", id));
        return Ok(());
    }

    let items = match args.file {
        Some(path) => read_metadata_file(&path)?,
        None => {
            let Some(metadata) = metadata_from_fields(args.author, args.year, args.title) else {
                bail!("Nothing to add. Use --doi, --file, or --author/--year/--title.");
            };
            vec![metadata]
        }
    };

    for metadata in items {
        let id = library
            .new_entry(metadata)
            .context("Failed to create record")?;
        output.success(&format!("Added {}", id));
    }

    Ok(())
}

/// Export records to a JSON file
pub fn export(
    library: &Library,
    destination: Option<PathBuf>,
    keys: Vec<String>,
    output: &Output,
) -> Result<()> {
    let ids = keys
        .iter()
        .map(|k| resolve_key(library, k))
        .collect::<Result<Vec<_>>>()?;
    let filter = (!ids.is_empty()).then_some(ids.as_slice());

    let destination = destination.unwrap_or_else(|| library.default_export_path());
    let count = library
        .write(Some(&destination), filter)
        .context("Failed to export library")?;

    output.success(&format!(
        "Exported {} record(s) to {}",
        count,
        destination.display()
    ));
    Ok(())
}

/// Edit a record file in $EDITOR, then reload
///
/// Changing the `id` inside the file renames it on reload.
pub fn edit(library: &mut Library, key: String, output: &Output) -> Result<()> {
    let id = resolve_key(library, &key)?;
    let path = library.store().record_path(&id);

    edit_file(&path)?;

    let report = library.read().context("Failed to reload library")?;
    output.print_load_notes(report);

    match report.renamed.iter().find(|r| r.from == path) {
        Some(rename) => output.success(&format!(
            "Record {} is now {}",
            id,
            rename
                .to
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        )),
        None => output.success(&format!("Updated {}", id)),
    }
    Ok(())
}

/// Open the attached PDF with the system viewer
pub fn open(library: &Library, key: String, output: &Output) -> Result<()> {
    let id = resolve_key(library, &key)?;
    let Some(path) = library.attachment(&id) else {
        bail!("No PDF attached to {}", id);
    };

    open::that(&path).with_context(|| format!("Failed to open {:?}", path))?;
    output.message(&format!("Opened {}", path.display()));
    Ok(())
}

/// Build metadata from command-line fields
fn metadata_from_fields(
    author: Option<String>,
    year: Option<String>,
    title: Option<String>,
) -> Option<Metadata> {
    if author.is_none() && year.is_none() && title.is_none() {
        return None;
    }

    let mut metadata = Metadata::new();
    if let Some(author) = author {
        metadata.set("author", author);
    }
    if let Some(year) = year {
        match year.trim().parse::<u64>() {
            Ok(n) => metadata.set("year", n),
            Err(_) => metadata.set("year", year),
        }
    }
    if let Some(title) = title {
        metadata.set("title", title);
    }
    Some(metadata)
}

/// Read a JSON object, or an array of objects, from a file
fn read_metadata_file(path: &Path) -> Result<Vec<Metadata>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    let value: Value =
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))?;

    let values = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            Metadata::from_value(item)
                .with_context(|| format!("Item {} in {:?} is not a JSON object", i, path))
        })
        .collect()
}
