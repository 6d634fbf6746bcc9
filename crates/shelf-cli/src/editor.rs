//! Interactive editing support
//!
//! Opens $EDITOR on a record file.

use anyhow::{bail, Context, Result};
use std::env;
use std::path::Path;
use std::process::Command;

/// Open a file in the user's preferred editor and wait for it to exit
///
/// Uses $EDITOR, $VISUAL, or falls back to common editors.
pub fn edit_file(path: &Path) -> Result<()> {
    let editor = find_editor()?;

    let status = Command::new(&editor)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to run editor: {}", editor))?;

    if !status.success() {
        bail!(
            "Editor '{}' exited with non-zero status. Check that your editor is configured correctly.",
            editor
        );
    }

    Ok(())
}

/// Find the user's preferred editor
fn find_editor() -> Result<String> {
    for var in ["EDITOR", "VISUAL"] {
        if let Ok(editor) = env::var(var) {
            if !editor.is_empty() {
                return Ok(editor);
            }
        }
    }

    let common_editors = ["nano", "vim", "vi", "emacs", "code", "notepad"];

    for editor in common_editors {
        if command_exists(editor) {
            return Ok(editor.to_string());
        }
    }

    bail!(
        "No editor found. Set $EDITOR environment variable.\n\
         Example: export EDITOR=nano"
    )
}

/// Check if a command exists in PATH
fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
