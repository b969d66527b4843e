use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfRecord {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub status: PdfStatus,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl PdfRecord {
    pub fn display_name(&self) -> &str {
        if self.original_name.is_empty() {
            &self.filename
        } else {
            &self.original_name
        }
    }

    /// Where the uploaded file can be viewed: the record's own URL when the
    /// backend provides an absolute one, otherwise the backend's uploads path.
    pub fn preview_url(&self, backend_url: &str) -> String {
        match self.url.as_deref() {
            Some(url) if url.starts_with("http") => url.to_string(),
            _ => format!(
                "{}/uploads/{}",
                backend_url.trim_end_matches('/'),
                urlencoding::encode(&self.filename)
            ),
        }
    }

    /// File stem used when saving a summary of this PDF.
    pub fn stem(&self) -> &str {
        let name = self.display_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }
}

impl Identified for PdfRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfStatus {
    #[default]
    Pending,
    Success,
    #[serde(other)]
    Unknown,
}

impl PdfStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfStatus::Pending => "pending",
            PdfStatus::Success => "success",
            PdfStatus::Unknown => "unknown",
        }
    }
}
