//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use shelf_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", describe(&config));
        }
        OutputFormat::Quiet => {
            println!("{}", config.library_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  library_dir:  {}", config.library_dir.display());
            println!("  doi_resolver: {}", config.doi_resolver);
            println!(
                "  pdf_url:      {}",
                config.pdf_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  log_file:     {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Records:     {}", config.records_dir().display());
            println!("Attachments: {}", config.files_dir().display());
            println!("Export:      {}", config.default_export_path().display());
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Settings plus the paths derived from `library_dir`
fn describe(config: &Config) -> serde_json::Value {
    serde_json::json!({
        "library_dir": config.library_dir,
        "doi_resolver": config.doi_resolver,
        "pdf_url": config.pdf_url,
        "log_file": config.log_file,
        "records_dir": config.records_dir(),
        "files_dir": config.files_dir(),
        "default_export": config.default_export_path()
    })
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let optional = |value: &str| {
        if value.is_empty() || value == "none" {
            None
        } else {
            Some(value.to_string())
        }
    };

    match key {
        "library_dir" => {
            config.library_dir = value.into();
        }
        "doi_resolver" => {
            if value.is_empty() {
                bail!("doi_resolver cannot be empty");
            }
            config.doi_resolver = value.to_string();
        }
        "pdf_url" => {
            config.pdf_url = optional(value);
        }
        "log_file" => {
            config.log_file = optional(value).map(PathBuf::from);
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: library_dir, doi_resolver, pdf_url, log_file",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "library_dir", "/data/lib").unwrap();
        apply(&mut config, "pdf_url", "https://pdfs.example.org/{doi}").unwrap();
        apply(&mut config, "log_file", "/tmp/shelf.log").unwrap();

        assert_eq!(config.library_dir, PathBuf::from("/data/lib"));
        assert_eq!(
            config.pdf_url.as_deref(),
            Some("https://pdfs.example.org/{doi}")
        );
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/shelf.log")));

        apply(&mut config, "pdf_url", "none").unwrap();
        assert!(config.pdf_url.is_none());
    }

    #[test]
    fn test_describe_includes_derived_paths() {
        let mut config = Config::default();
        apply(&mut config, "library_dir", "/data/lib").unwrap();

        let described = describe(&config);

        assert_eq!(described["library_dir"], serde_json::json!("/data/lib"));
        assert_eq!(described["records_dir"], serde_json::json!("/data/lib/records"));
        assert_eq!(described["files_dir"], serde_json::json!("/data/lib/files"));
        assert_eq!(
            described["default_export"],
            serde_json::json!("/data/lib/default.json")
        );
        assert!(described["pdf_url"].is_null());
    }

    #[test]
    fn test_apply_rejects_unknown_and_empty() {
        let mut config = Config::default();
        assert!(apply(&mut config, "sync_url", "x").is_err());
        assert!(apply(&mut config, "doi_resolver", "").is_err());
    }
}
