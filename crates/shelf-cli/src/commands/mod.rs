//! Command handlers

pub mod attach;
pub mod check;
pub mod config;
pub mod entry;

use anyhow::{bail, Result};

use shelf_core::Library;

/// Resolve a key argument (exact key or unique prefix)
pub fn resolve_key(library: &Library, key: &str) -> Result<String> {
    if library.entry(key).is_some() {
        return Ok(key.to_string());
    }

    let mut matches: Vec<&str> = library
        .keys()
        .into_iter()
        .filter(|k| k.starts_with(key))
        .collect();
    matches.sort_unstable();
    matches.dedup();

    match matches.len() {
        0 => bail!("No record found matching: {}", key),
        1 if library.entry(matches[0]).is_some() => Ok(matches[0].to_string()),
        1 => bail!(
            "Key '{}' is used by more than one record. Run `shelf check`.",
            matches[0]
        ),
        _ => {
            eprintln!("Multiple records match '{}':", key);
            for k in &matches {
                eprintln!("  {}", k);
            }
            bail!("Ambiguous key. Please provide more characters.");
        }
    }
}
