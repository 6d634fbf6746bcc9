//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use shelf_core::{Entry, LoadReport};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Print a single entry
    pub fn print_entry(&self, entry: &Entry, attachment: bool) {
        match self.format {
            OutputFormat::Human => {
                let metadata = entry.metadata();
                println!("ID:      {}", entry.id());
                if let Some(author) = metadata.first_author_surname() {
                    println!("Author:  {}", author);
                }
                if let Some(year) = metadata.year() {
                    println!("Year:    {}", year);
                }
                if let Some(title) = metadata.title() {
                    println!("Title:   {}", title);
                }
                if let Some(doi) = metadata.doi() {
                    println!("DOI:     {}", doi);
                }
                println!("PDF:     {}", if attachment { "attached" } else { "-" });
                println!("Fields:  {}", metadata.as_map().len());
            }
            OutputFormat::Json => {
                println!("{}", to_json(entry));
            }
            OutputFormat::Quiet => {
                println!("{}", entry.id());
            }
        }
    }

    /// Print a list of entries
    pub fn print_entries(&self, entries: &[Entry]) {
        match self.format {
            OutputFormat::Human => {
                if entries.is_empty() {
                    println!("No records found.");
                    return;
                }
                let width = entries.iter().map(|e| e.id().len()).max().unwrap_or(0);
                for entry in entries {
                    let metadata = entry.metadata();
                    println!(
                        "{:width$} | {:4} | {}",
                        entry.id(),
                        metadata.year().unwrap_or_default(),
                        truncate(metadata.title().unwrap_or("(untitled)"), 60),
                        width = width
                    );
                }
                println!("\n{} record(s)", entries.len());
            }
            OutputFormat::Json => {
                println!("{}", to_json(entries));
            }
            OutputFormat::Quiet => {
                for entry in entries {
                    println!("{}", entry.id());
                }
            }
        }
    }

    /// Print the full outcome of a load
    pub fn print_report(&self, report: &LoadReport, orphans: &[String]) {
        match self.format {
            OutputFormat::Human => {
                println!("Records:  {}", report.entries.len());
                println!("Assigned: {}", report.assigned.len());
                for id in &report.assigned {
                    println!("  + {}", id);
                }
                println!("Renamed:  {}", report.renamed.len());
                for rename in &report.renamed {
                    println!("  {} -> {}", rename.from.display(), rename.to.display());
                }
                println!("Problems: {}", report.failures.len());
                for failure in &report.failures {
                    println!("  {}", failure.error);
                    if let Some(hint) = failure.error.recovery_suggestion() {
                        println!("    hint: {}", hint);
                    }
                }
                if !orphans.is_empty() {
                    println!("Orphaned attachments: {}", orphans.len());
                    for id in orphans {
                        println!("  {}.pdf", id);
                    }
                }
            }
            OutputFormat::Json => {
                let failures: Vec<_> = report
                    .failures
                    .iter()
                    .map(|f| {
                        serde_json::json!({
                            "path": f.path,
                            "error": f.error.to_string(),
                            "invariant_violation": f.error.is_invariant_violation()
                        })
                    })
                    .collect();
                let renamed: Vec<_> = report
                    .renamed
                    .iter()
                    .map(|r| serde_json::json!({"from": r.from, "to": r.to}))
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "records": report.entries.len(),
                        "assigned": report.assigned,
                        "renamed": renamed,
                        "failures": failures,
                        "orphans": orphans
                    })
                );
            }
            OutputFormat::Quiet => {
                for failure in &report.failures {
                    println!("{}", failure.path.display());
                }
            }
        }
    }

    /// Summarize what a load changed on disk (stderr, human mode only)
    pub fn print_load_notes(&self, report: &LoadReport) {
        if self.format != OutputFormat::Human {
            return;
        }
        for rename in &report.renamed {
            eprintln!(
                "Renamed {} -> {}",
                rename.from.display(),
                rename.to.display()
            );
        }
        for failure in &report.failures {
            eprintln!("⚠ {}", failure.error);
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Truncate a string to max characters, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
