use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use super::{Language, Style, SummaryStatus};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Query parameters of a list endpoint, minus pagination.
pub trait ListFilter: Clone + Default + PartialEq + Send + Sync {
    /// Every non-empty value, in the backend's parameter names.
    fn query_pairs(&self) -> Vec<(&'static str, String)>;

    fn date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>);

    fn set_search(&mut self, search: &str);

    fn set_date_range(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>);

    /// Whether any field differs from its default.
    fn is_active(&self) -> bool {
        *self != Self::default()
    }
}

fn push_text(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        pairs.push((key, value.to_string()));
    }
}

fn push_dates(
    pairs: &mut Vec<(&'static str, String)>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) {
    if let Some(from) = from {
        pairs.push(("date_from", from.format(DATE_FORMAT).to_string()));
    }
    if let Some(to) = to {
        pairs.push(("date_to", to.format(DATE_FORMAT).to_string()));
    }
}

/// A range is valid unless both ends are set and the start is after the end.
pub fn check_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), String> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => {
            Err(format!("start date {} is after end date {}", from, to))
        }
        _ => Ok(()),
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| format!("invalid date '{}' (expected YYYY-MM-DD)", raw.trim()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PdfSort {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
}

impl PdfSort {
    pub const ALL: [PdfSort; 4] = [
        PdfSort::Newest,
        PdfSort::Oldest,
        PdfSort::NameAsc,
        PdfSort::NameDesc,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PdfSort::Newest => "newest",
            PdfSort::Oldest => "oldest",
            PdfSort::NameAsc => "name_asc",
            PdfSort::NameDesc => "name_desc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PdfSort::Newest => "Newest First",
            PdfSort::Oldest => "Oldest First",
            PdfSort::NameAsc => "Name A-Z",
            PdfSort::NameDesc => "Name Z-A",
        }
    }

    /// Backend `(sort_by, sort_order)` pair.
    pub fn sort_params(&self) -> (&'static str, &'static str) {
        match self {
            PdfSort::Newest => ("uploaded_at", "desc"),
            PdfSort::Oldest => ("uploaded_at", "asc"),
            PdfSort::NameAsc => ("original_name", "asc"),
            PdfSort::NameDesc => ("original_name", "desc"),
        }
    }

    pub fn cycle(&self) -> Self {
        let idx = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for PdfSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PdfSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sort| sort.key() == s.trim())
            .ok_or_else(|| format!("unknown sort '{s}' (expected newest, oldest, name_asc or name_desc)"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummarySort {
    #[default]
    Newest,
    Oldest,
}

impl SummarySort {
    pub fn key(&self) -> &'static str {
        match self {
            SummarySort::Newest => "newest",
            SummarySort::Oldest => "oldest",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SummarySort::Newest => "Newest First",
            SummarySort::Oldest => "Oldest First",
        }
    }

    pub fn sort_params(&self) -> (&'static str, &'static str) {
        match self {
            SummarySort::Newest => ("created_at", "desc"),
            SummarySort::Oldest => ("created_at", "asc"),
        }
    }

    pub fn cycle(&self) -> Self {
        match self {
            SummarySort::Newest => SummarySort::Oldest,
            SummarySort::Oldest => SummarySort::Newest,
        }
    }
}

impl fmt::Display for SummarySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SummarySort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "newest" => Ok(SummarySort::Newest),
            "oldest" => Ok(SummarySort::Oldest),
            other => Err(format!("unknown sort '{other}' (expected newest or oldest)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfFilter {
    pub search: String,
    pub sort: PdfSort,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ListFilter for PdfFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_text(&mut pairs, "search", &self.search);
        let (sort_by, sort_order) = self.sort.sort_params();
        pairs.push(("sort_by", sort_by.to_string()));
        pairs.push(("sort_order", sort_order.to_string()));
        push_dates(&mut pairs, self.date_from, self.date_to);
        pairs
    }

    fn date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (self.date_from, self.date_to)
    }

    fn set_search(&mut self, search: &str) {
        self.search = search.to_string();
    }

    fn set_date_range(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        self.date_from = from;
        self.date_to = to;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryFilter {
    pub search: String,
    pub sort: SummarySort,
    pub status: Option<SummaryStatus>,
    pub language: Option<Language>,
    pub style: Option<Style>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ListFilter for SummaryFilter {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        push_text(&mut pairs, "search", &self.search);
        let (sort_by, sort_order) = self.sort.sort_params();
        pairs.push(("sort_by", sort_by.to_string()));
        pairs.push(("sort_order", sort_order.to_string()));
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(language) = self.language {
            pairs.push(("language", language.code().to_string()));
        }
        if let Some(style) = self.style {
            pairs.push(("style", style.as_str().to_string()));
        }
        push_dates(&mut pairs, self.date_from, self.date_to);
        pairs
    }

    fn date_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        (self.date_from, self.date_to)
    }

    fn set_search(&mut self, search: &str) {
        self.search = search.to_string();
    }

    fn set_date_range(&mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) {
        self.date_from = from;
        self.date_to = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pdf_filter_sends_only_sort() {
        let filter = PdfFilter::default();
        assert!(!filter.is_active());
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("sort_by", "uploaded_at".to_string()),
                ("sort_order", "desc".to_string()),
            ]
        );
    }

    #[test]
    fn name_sort_translates_to_original_name() {
        assert_eq!(PdfSort::NameDesc.sort_params(), ("original_name", "desc"));
        assert_eq!("name_asc".parse::<PdfSort>().unwrap(), PdfSort::NameAsc);
    }

    #[test]
    fn summary_filter_serializes_every_field() {
        let filter = SummaryFilter {
            search: "  climate ".to_string(),
            sort: SummarySort::Oldest,
            status: Some(SummaryStatus::Completed),
            language: Some(Language::Cn),
            style: Some(Style::Professional),
            date_from: Some(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()),
            date_to: Some(NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()),
        };
        assert!(filter.is_active());
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("search", "climate".to_string()),
                ("sort_by", "created_at".to_string()),
                ("sort_order", "asc".to_string()),
                ("status", "completed".to_string()),
                ("language", "CN".to_string()),
                ("style", "professional".to_string()),
                ("date_from", "2025-01-02".to_string()),
                ("date_to", "2025-02-03".to_string()),
            ]
        );
    }

    #[test]
    fn non_default_sort_alone_is_active() {
        let filter = SummaryFilter {
            sort: SummarySort::Oldest,
            ..SummaryFilter::default()
        };
        assert!(filter.is_active());
    }

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(
            parse_date("2024-12-31").unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
        assert!(parse_date("31/12/2024").is_err());
    }
}
