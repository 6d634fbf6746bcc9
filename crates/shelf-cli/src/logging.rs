//! Tracing setup
//!
//! Filter comes from `SHELF_LOG` when set, otherwise `warn` (or `info` with
//! `--verbose`) for both crates. Logs go to `log_file` when configured,
//! stderr otherwise.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::EnvFilter;

use shelf_core::Config;

const LOG_ENV: &str = "SHELF_LOG";

pub fn init(config: &Config, verbose: bool) {
    let log_level = if verbose { "info" } else { "warn" };
    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(format!("shelf_core={},shelf_cli={}", log_level, log_level))
    });

    let Some(log_path) = config.log_file.as_ref() else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
        return;
    };

    let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
            return;
        }
    };

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init();

    info!("Logging to {:?}", log_path);
}
