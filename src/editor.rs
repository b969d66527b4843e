use std::io::Write;
use std::process::Command;

use crate::error::{AppError, Result};

/// The user's editor: `$VISUAL`, then `$EDITOR`, then `vi`.
pub fn editor_command() -> String {
    std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .ok()
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Open `initial` in an external editor and return the saved text, or
/// `None` when it came back unchanged.
pub fn edit_text(initial: &str) -> Result<Option<String>> {
    let mut file = tempfile::Builder::new()
        .prefix("pdfsum-summary-")
        .suffix(".md")
        .tempfile()?;
    file.write_all(initial.as_bytes())?;
    file.flush()?;

    let editor = editor_command();
    let mut parts = editor.split_whitespace();
    let program = parts.next().unwrap_or("vi");
    let status = Command::new(program).args(parts).arg(file.path()).status()?;
    if !status.success() {
        return Err(AppError::Other(anyhow::anyhow!(
            "editor '{}' exited with {}",
            editor,
            status
        )));
    }

    let edited = std::fs::read_to_string(file.path())?;
    Ok(normalize_edit(initial, edited))
}

/// Editors usually append a trailing newline; ignore it when comparing.
fn normalize_edit(initial: &str, edited: String) -> Option<String> {
    let trimmed = edited.trim_end_matches('\n');
    if trimmed == initial.trim_end_matches('\n') {
        None
    } else {
        Some(trimmed.to_string())
    }
}
