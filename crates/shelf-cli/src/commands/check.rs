//! Check command handler

use anyhow::{bail, Result};

use shelf_core::Library;

use crate::output::Output;

/// Report what the last load found and fixed
///
/// Fails when any record could not be loaded or reconciled.
pub fn check(library: &Library, output: &Output) -> Result<()> {
    let report = library.report();
    let orphans = library.orphaned_files()?;

    output.print_report(report, &orphans);

    if !report.failures.is_empty() {
        bail!("{} problem(s) found", report.failures.len());
    }
    Ok(())
}
