use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ExportFile, ExportFormat, Language, Page, PdfFilter, PdfRecord, Style, Summary, SummaryFilter,
};

/// The summarization service's REST contract.
///
/// Export methods take `None` to request the unfiltered set.
#[async_trait]
pub trait SummaryBackend: Send + Sync {
    async fn upload_pdf(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        language: Language,
        style: Option<Style>,
    ) -> Result<PdfRecord>;

    async fn list_pdfs(&self, filter: &PdfFilter, page: u32, limit: u32) -> Result<Page<PdfRecord>>;

    async fn export_pdfs(&self, filter: Option<&PdfFilter>, format: ExportFormat) -> Result<ExportFile>;

    async fn get_pdf(&self, id: &str) -> Result<PdfRecord>;

    async fn delete_pdf(&self, id: &str) -> Result<()>;

    /// Starts an asynchronous job; the returned summary is still `processing`.
    async fn generate_summary(&self, pdf_id: &str, language: Language, style: Style) -> Result<Summary>;

    async fn list_summaries(
        &self,
        pdf_id: &str,
        filter: &SummaryFilter,
        page: u32,
        limit: u32,
    ) -> Result<Page<Summary>>;

    async fn export_summaries(
        &self,
        pdf_id: &str,
        filter: Option<&SummaryFilter>,
        format: ExportFormat,
    ) -> Result<ExportFile>;

    async fn get_summary(&self, id: &str) -> Result<Summary>;

    async fn update_summary(&self, id: &str, content: &str) -> Result<()>;

    async fn delete_summary(&self, id: &str) -> Result<()>;
}
