//! shelf CLI
//!
//! Command-line interface for shelf - a citation-keyed personal bibliography.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use shelf_core::{Config, Library};

mod commands;
mod doi;
mod editor;
mod logging;
mod output;
mod pdf;

use commands::entry::AddArgs;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "shelf")]
#[command(about = "shelf - a personal bibliography keyed by citation keys")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Library directory (default: ~/.pandoc)
    #[arg(short = 'L', long, global = true)]
    library: Option<PathBuf>,

    /// Config file to use instead of the default
    #[arg(long = "config", global = true)]
    config_file: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log store activity (renames, key assignments)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all records
    #[command(alias = "ls")]
    List,
    /// Show one record
    Show {
        /// Citation key (or unique prefix)
        key: String,
    },
    /// Add a record
    #[command(alias = "new")]
    Add {
        /// Look up metadata for this DOI
        #[arg(long, conflicts_with_all = ["file", "author", "year", "title"])]
        doi: Option<String>,
        /// Read metadata (object or array of objects) from a JSON file
        #[arg(short, long, conflicts_with_all = ["author", "year", "title"])]
        file: Option<PathBuf>,
        /// Author, e.g. "Watson, J. D."
        #[arg(short, long)]
        author: Option<String>,
        /// Publication year
        #[arg(short, long)]
        year: Option<String>,
        /// Title
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Export records to a single JSON file
    Export {
        /// Destination (default: <library>/default.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Keys to export (default: all)
        keys: Vec<String>,
    },
    /// Attach a PDF to a record
    Attach {
        /// Citation key (or unique prefix)
        key: String,
        /// PDF file (moved into the library)
        file: PathBuf,
    },
    /// Download and attach the PDF of a record via its DOI
    FetchPdf {
        /// Citation key (or unique prefix)
        key: String,
    },
    /// Edit a record file in $EDITOR
    Edit {
        /// Citation key (or unique prefix)
        key: String,
    },
    /// Open the attached PDF
    Open {
        /// Citation key (or unique prefix)
        key: String,
    },
    /// Report problems found while loading the library
    Check,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (library_dir, doi_resolver, pdf_url, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands don't need the library
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config_file.as_ref(), &output);
    }

    let mut config = Config::load_with_cli_override(cli.config_file.as_ref())
        .context("Failed to load configuration")?;
    if let Some(library) = cli.library {
        config.library_dir = library;
    }

    logging::init(&config, cli.verbose);

    let mut library = Library::open_with_config(&config)
        .with_context(|| format!("Failed to open library at {:?}", config.library_dir))?;

    if !matches!(cli.command, Commands::Check) {
        output.print_load_notes(library.report());
    }

    match cli.command {
        Commands::List => commands::entry::list(&library, &output),
        Commands::Show { key } => commands::entry::show(&library, key, &output),
        Commands::Add {
            doi,
            file,
            author,
            year,
            title,
        } => {
            let args = AddArgs {
                doi,
                file,
                author,
                year,
                title,
            };
            commands::entry::add(&mut library, &config, args, &output)
        }
        Commands::Export {
            output: destination,
            keys,
        } => commands::entry::export(&library, destination, keys, &output),
        Commands::Attach { key, file } => commands::attach::attach(&library, key, file, &output),
        Commands::FetchPdf { key } => {
            commands::attach::fetch_pdf(&library, &config, key, &output)
        }
        Commands::Edit { key } => commands::entry::edit(&mut library, key, &output),
        Commands::Open { key } => commands::entry::open(&library, key, &output),
        Commands::Check => commands::check::check(&library, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}
