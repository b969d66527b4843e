use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Local};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unknown export format '{other}' (expected csv or json)")),
        }
    }
}

/// A file returned by an export endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    /// Write into `dir`, keeping only the final path component of the
    /// server-supplied name.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let name = Path::new(&self.file_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "export".into());
        let path = dir.join(name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// `pdfs_20250301_142233.csv`
pub fn default_export_name(prefix: &str, format: ExportFormat, now: DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, now.format("%Y%m%d_%H%M%S"), format.as_str())
}

/// File name from a `Content-Disposition` header value.
pub fn disposition_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
