use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Identified;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub id: String,
    pub pdf_id: String,
    #[serde(default)]
    pub content: String,
    pub language: Language,
    pub style: Style,
    pub status: SummaryStatus,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Summary {
    /// Failure detail recorded by the backend, either as a top-level
    /// `error_message` or under `metadata.error`.
    pub fn error_detail(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.get("error"))
                    .and_then(|e| e.as_str())
            })
            .filter(|s| !s.trim().is_empty())
    }

    pub fn is_processing(&self) -> bool {
        self.status == SummaryStatus::Processing
    }
}

impl Identified for Summary {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    #[default]
    Processing,
    Completed,
    Failed,
    Timeout,
    #[serde(other)]
    Unknown,
}

impl SummaryStatus {
    pub const FILTERABLE: [SummaryStatus; 4] = [
        SummaryStatus::Processing,
        SummaryStatus::Completed,
        SummaryStatus::Failed,
        SummaryStatus::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStatus::Processing => "processing",
            SummaryStatus::Completed => "completed",
            SummaryStatus::Failed => "failed",
            SummaryStatus::Timeout => "timeout",
            SummaryStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SummaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::FILTERABLE
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown summary status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    En,
    Id,
    Cn,
    Jp,
    Kr,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::En,
        Language::Id,
        Language::Cn,
        Language::Jp,
        Language::Kr,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "EN",
            Language::Id => "ID",
            Language::Cn => "CN",
            Language::Jp => "JP",
            Language::Kr => "KR",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Id => "Indonesian",
            Language::Cn => "Chinese",
            Language::Jp => "Japanese",
            Language::Kr => "Korean",
        }
    }

    pub fn cycle(&self) -> Self {
        let idx = Self::ALL.iter().position(|l| l == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown language '{s}' (expected EN, ID, CN, JP or KR)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    Professional,
    Simple,
}

impl Style {
    pub const ALL: [Style; 2] = [Style::Professional, Style::Simple];

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Professional => "professional",
            Style::Simple => "simple",
        }
    }

    /// None -> professional -> simple -> None
    pub fn cycle(current: Option<Style>) -> Option<Style> {
        match current {
            None => Some(Style::Professional),
            Some(Style::Professional) => Some(Style::Simple),
            Some(Style::Simple) => None,
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown style '{s}' (expected professional or simple)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_summary() {
        let json = r#"{
            "id": "b7e1",
            "pdf_id": "a1",
            "content": "",
            "language": "EN",
            "style": "simple",
            "status": "failed",
            "is_edited": false,
            "metadata": {"error": "no extractable text found"},
            "created_at": "2025-03-01T10:00:00.123456Z",
            "updated_at": "2025-03-01T10:00:05Z",
            "deleted_at": null
        }"#;

        let summary: Summary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.status, SummaryStatus::Failed);
        assert_eq!(summary.style, Style::Simple);
        assert_eq!(summary.error_detail(), Some("no extractable text found"));
    }

    #[test]
    fn unknown_status_decodes_as_unknown() {
        let status: SummaryStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(status, SummaryStatus::Unknown);
    }

    #[test]
    fn error_message_takes_precedence_over_metadata() {
        let json = r#"{
            "id": "s", "pdf_id": "p", "language": "JP", "style": "professional",
            "status": "timeout", "error_message": "took too long",
            "metadata": {"error": "other"}, "created_at": "2025-03-01T10:00:00Z"
        }"#;
        let summary: Summary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.error_detail(), Some("took too long"));
        assert_eq!(summary.language, Language::Jp);
    }

    #[test]
    fn language_cycles_through_all() {
        let mut lang = Language::En;
        for _ in 0..Language::ALL.len() {
            lang = lang.cycle();
        }
        assert_eq!(lang, Language::En);
        assert_eq!("kr".parse::<Language>().unwrap(), Language::Kr);
    }

    #[test]
    fn style_cycle_includes_unselected() {
        assert_eq!(Style::cycle(None), Some(Style::Professional));
        assert_eq!(Style::cycle(Some(Style::Simple)), None);
    }
}
