//! In-memory backend for unit tests.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};

use super::SummaryBackend;
use crate::error::{AppError, Result};
use crate::models::{
    ExportFile, ExportFormat, Language, ListFilter, Page, PaginationMeta, PdfFilter, PdfRecord,
    PdfStatus, Style, Summary, SummaryFilter, SummaryStatus,
};

pub fn pdf_fixture(id: &str) -> PdfRecord {
    PdfRecord {
        id: id.to_string(),
        filename: format!("{id}.pdf"),
        original_name: format!("{id}.pdf"),
        file_path: format!("uploads/{id}.pdf"),
        file_size: 4096,
        mime_type: "application/pdf".to_string(),
        status: PdfStatus::Pending,
        uploaded_at: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        updated_at: None,
        url: None,
    }
}

pub fn summary_fixture(id: &str, pdf_id: &str, status: SummaryStatus) -> Summary {
    Summary {
        id: id.to_string(),
        pdf_id: pdf_id.to_string(),
        content: String::new(),
        language: Language::En,
        style: Style::Simple,
        status,
        is_edited: false,
        error_message: None,
        metadata: None,
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap(),
        updated_at: None,
    }
}

#[derive(Default)]
struct State {
    pdfs: Vec<PdfRecord>,
    summaries: Vec<Summary>,
    calls: Vec<String>,
    failing: HashSet<&'static str>,
    next_summary: u32,
    total_pages: u32,
}

/// Records every call as a short string so tests can assert on traffic.
/// Operations named in `fail` return a 500.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().total_pages = 1;
        backend
    }

    pub fn with_pdfs(pdfs: Vec<PdfRecord>) -> Self {
        let backend = Self::new();
        backend.state.lock().unwrap().pdfs = pdfs;
        backend
    }

    pub fn add_summary(&self, summary: Summary) {
        self.state.lock().unwrap().summaries.push(summary);
    }

    pub fn set_total_pages(&self, pages: u32) {
        self.state.lock().unwrap().total_pages = pages;
    }

    /// Resolve a summary the way the backend's worker would.
    pub fn resolve(&self, id: &str, status: SummaryStatus, content: &str, error: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        if let Some(summary) = state.summaries.iter_mut().find(|s| s.id == id) {
            summary.status = status;
            summary.content = content.to_string();
            summary.metadata = error.map(|e| serde_json::json!({ "error": e }));
        }
    }

    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.state.lock().unwrap().failing.remove(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn pdf_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().pdfs.iter().map(|p| p.id.clone()).collect()
    }

    fn record(&self, op: &'static str, call: String) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(AppError::Api {
                status: 500,
                message: format!("{op} failed"),
            });
        }
        Ok(())
    }

    fn meta(&self, page: u32, limit: u32, total: usize) -> PaginationMeta {
        PaginationMeta {
            page,
            limit,
            total_pages: self.state.lock().unwrap().total_pages,
            total_results: Some(total as u64),
        }
    }
}

fn query<F: ListFilter>(filter: &F) -> Vec<String> {
    filter
        .query_pairs()
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect()
}

fn render<F: ListFilter>(filter: &F, page: u32, limit: u32) -> String {
    let mut parts = query(filter);
    parts.push(format!("page={page}"));
    parts.push(format!("limit={limit}"));
    parts.join("&")
}

#[async_trait]
impl SummaryBackend for FakeBackend {
    async fn upload_pdf(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        language: Language,
        style: Option<Style>,
    ) -> Result<PdfRecord> {
        let style = style.map(|s| s.as_str()).unwrap_or("-");
        self.record("upload", format!("upload {file_name} {language} {style}"))?;

        let mut pdf = pdf_fixture(&format!("pdf-{}", bytes.len()));
        pdf.original_name = file_name.to_string();
        pdf.file_size = bytes.len() as u64;
        self.state.lock().unwrap().pdfs.insert(0, pdf.clone());
        Ok(pdf)
    }

    async fn list_pdfs(&self, filter: &PdfFilter, page: u32, limit: u32) -> Result<Page<PdfRecord>> {
        self.record("list_pdfs", format!("list_pdfs {}", render(filter, page, limit)))?;
        let data = self.state.lock().unwrap().pdfs.clone();
        let meta = self.meta(page, limit, data.len());
        Ok(Page { data, meta })
    }

    async fn export_pdfs(&self, filter: Option<&PdfFilter>, format: ExportFormat) -> Result<ExportFile> {
        let query = filter.map(|f| query(f).join("&")).unwrap_or_default();
        self.record("export", format!("export_pdfs {format} {query}"))?;
        Ok(ExportFile {
            file_name: format!("pdfs.{format}"),
            bytes: b"ID,Original Name\n".to_vec(),
        })
    }

    async fn get_pdf(&self, id: &str) -> Result<PdfRecord> {
        self.record("get_pdf", format!("get_pdf {id}"))?;
        self.state
            .lock()
            .unwrap()
            .pdfs
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or(AppError::Api {
                status: 404,
                message: "PDF not found".to_string(),
            })
    }

    async fn delete_pdf(&self, id: &str) -> Result<()> {
        self.record("delete_pdf", format!("delete_pdf {id}"))?;
        self.state.lock().unwrap().pdfs.retain(|p| p.id != id);
        Ok(())
    }

    async fn generate_summary(&self, pdf_id: &str, language: Language, style: Style) -> Result<Summary> {
        self.record("generate", format!("generate {pdf_id} {language} {style}"))?;
        let mut state = self.state.lock().unwrap();
        state.next_summary += 1;
        let mut summary = summary_fixture(
            &format!("sum-{}", state.next_summary),
            pdf_id,
            SummaryStatus::Processing,
        );
        summary.language = language;
        summary.style = style;
        summary.created_at += Duration::minutes(state.next_summary as i64);
        state.summaries.push(summary.clone());
        Ok(summary)
    }

    async fn list_summaries(
        &self,
        pdf_id: &str,
        filter: &SummaryFilter,
        page: u32,
        limit: u32,
    ) -> Result<Page<Summary>> {
        self.record(
            "list_summaries",
            format!("list_summaries {pdf_id} {}", render(filter, page, limit)),
        )?;
        let data: Vec<Summary> = self
            .state
            .lock()
            .unwrap()
            .summaries
            .iter()
            .filter(|s| s.pdf_id == pdf_id)
            .filter(|s| filter.status.map_or(true, |status| s.status == status))
            .cloned()
            .collect();
        let meta = self.meta(page, limit, data.len());
        Ok(Page { data, meta })
    }

    async fn export_summaries(
        &self,
        pdf_id: &str,
        filter: Option<&SummaryFilter>,
        format: ExportFormat,
    ) -> Result<ExportFile> {
        let query = filter.map(|f| query(f).join("&")).unwrap_or_default();
        self.record("export", format!("export_summaries {pdf_id} {format} {query}"))?;
        Ok(ExportFile {
            file_name: format!("summaries.{format}"),
            bytes: b"[]".to_vec(),
        })
    }

    async fn get_summary(&self, id: &str) -> Result<Summary> {
        self.record("get_summary", format!("get_summary {id}"))?;
        self.state
            .lock()
            .unwrap()
            .summaries
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(AppError::Api {
                status: 404,
                message: "Summary not found".to_string(),
            })
    }

    async fn update_summary(&self, id: &str, content: &str) -> Result<()> {
        self.record("update_summary", format!("update_summary {id}"))?;
        let mut state = self.state.lock().unwrap();
        if let Some(summary) = state.summaries.iter_mut().find(|s| s.id == id) {
            summary.content = content.to_string();
            summary.is_edited = true;
        }
        Ok(())
    }

    async fn delete_summary(&self, id: &str) -> Result<()> {
        self.record("delete_summary", format!("delete_summary {id}"))?;
        self.state.lock().unwrap().summaries.retain(|s| s.id != id);
        Ok(())
    }
}
