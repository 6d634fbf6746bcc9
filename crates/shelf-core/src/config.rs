//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/shelf/config.toml)
//! 3. Environment variables (SHELF_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "SHELF";

/// Library directory name under the home directory
const DEFAULT_LIBRARY_DIR: &str = ".pandoc";

/// Default DOI resolver (content negotiation endpoint)
pub const DEFAULT_DOI_RESOLVER: &str = "https://doi.org";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Library root holding `records/` and `files/`
    #[serde(default = "default_library_dir")]
    pub library_dir: PathBuf,

    /// Base URL DOIs are resolved against
    #[serde(default = "default_doi_resolver")]
    pub doi_resolver: String,

    /// PDF download URL template; `{doi}` is replaced by the DOI
    #[serde(default)]
    pub pdf_url: Option<String>,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            doi_resolver: default_doi_resolver(),
            pdf_url: None,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SHELF_LIBRARY, SHELF_DOI_RESOLVER, SHELF_PDF_URL, SHELF_LOG_FILE)
    /// 2. Config file (~/.config/shelf/config.toml or SHELF_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit config file path
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // SHELF_LIBRARY
        if let Ok(val) = std::env::var(format!("{}_LIBRARY", ENV_PREFIX)) {
            if !val.is_empty() {
                self.library_dir = PathBuf::from(val);
            }
        }

        // SHELF_DOI_RESOLVER
        if let Ok(val) = std::env::var(format!("{}_DOI_RESOLVER", ENV_PREFIX)) {
            if !val.is_empty() {
                self.doi_resolver = val;
            }
        }

        // SHELF_PDF_URL
        if let Ok(val) = std::env::var(format!("{}_PDF_URL", ENV_PREFIX)) {
            self.pdf_url = if val.is_empty() { None } else { Some(val) };
        }

        // SHELF_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SHELF_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shelf")
            .join("config.toml")
    }

    /// Get the records directory
    pub fn records_dir(&self) -> PathBuf {
        self.library_dir.join(crate::store::RECORDS_DIR)
    }

    /// Get the attachments directory
    pub fn files_dir(&self) -> PathBuf {
        self.library_dir.join(crate::store::FILES_DIR)
    }

    /// Get the default export file
    pub fn default_export_path(&self) -> PathBuf {
        self.library_dir.join(crate::library::DEFAULT_EXPORT)
    }
}

/// Get the default library directory: `$HOME/.pandoc`
fn default_library_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_LIBRARY_DIR)
}

fn default_doi_resolver() -> String {
    DEFAULT_DOI_RESOLVER.to_string()
}
