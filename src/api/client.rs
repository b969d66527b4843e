use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::SummaryBackend;
use crate::error::{AppError, Result};
use crate::models::{
    default_export_name, disposition_filename, ExportFile, ExportFormat, Language, ListFilter,
    Page, PdfFilter, PdfRecord, Style, Summary, SummaryFilter,
};
use crate::upload::PDF_MIME_TYPE;

#[derive(Debug, Serialize)]
struct GenerateRequest {
    language: Language,
    style: Style,
}

#[derive(Debug, Serialize)]
struct UpdateSummaryRequest<'a> {
    content: &'a str,
}

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("pdfsum/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Config(format!("backend_url '{}' is not a base URL", base_url)));
        }
        Ok(Self { client, base_url })
    }

    /// `segments` are appended to the base path and percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn export(
        &self,
        url: Url,
        mut pairs: Vec<(&'static str, String)>,
        format: ExportFormat,
        prefix: &str,
    ) -> Result<ExportFile> {
        pairs.push(("export", format.as_str().to_string()));
        tracing::debug!("Exporting {} as {}", url, format);

        let response = check(self.client.get(url).query(&pairs).send().await?).await?;
        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename)
            .unwrap_or_else(|| default_export_name(prefix, format, chrono::Local::now()));
        let bytes = response.bytes().await?.to_vec();

        Ok(ExportFile { file_name, bytes })
    }
}

fn list_pairs<F: ListFilter>(filter: &F, page: u32, limit: u32) -> Vec<(&'static str, String)> {
    let mut pairs = filter.query_pairs();
    pairs.push(("page", page.to_string()));
    pairs.push(("limit", limit.to_string()));
    pairs
}

/// Turn a non-success status into `AppError::Api`, keeping the backend's
/// `message` when the body carries one.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            let text = body.trim();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text.to_string()
            }
        });

    Err(AppError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Single records come wrapped as `{"message": .., "data": record}`; a bare
/// record is accepted too.
fn unwrap_envelope(mut value: Value) -> Value {
    match value.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => data,
        _ => value,
    }
}

async fn read_record<T: DeserializeOwned>(response: Response) -> Result<T> {
    let value: Value = check(response).await?.json().await?;
    serde_json::from_value(unwrap_envelope(value))
        .map_err(|e| AppError::InvalidResponse(e.to_string()))
}

async fn read_page<T: DeserializeOwned>(response: Response) -> Result<Page<T>> {
    let value: Value = check(response).await?.json().await?;
    serde_json::from_value(value).map_err(|e| AppError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl SummaryBackend for ApiClient {
    async fn upload_pdf(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        language: Language,
        style: Option<Style>,
    ) -> Result<PdfRecord> {
        let file = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(PDF_MIME_TYPE)?;
        let mut form = Form::new()
            .part("file", file)
            .text("language", language.code());
        if let Some(style) = style {
            form = form.text("style", style.as_str());
        }

        let response = self
            .client
            .post(self.endpoint(&["v1", "pdfs", "upload"]))
            .multipart(form)
            .send()
            .await?;
        read_record(response).await
    }

    async fn list_pdfs(&self, filter: &PdfFilter, page: u32, limit: u32) -> Result<Page<PdfRecord>> {
        let response = self
            .client
            .get(self.endpoint(&["v1", "pdfs"]))
            .query(&list_pairs(filter, page, limit))
            .send()
            .await?;
        read_page(response).await
    }

    async fn export_pdfs(&self, filter: Option<&PdfFilter>, format: ExportFormat) -> Result<ExportFile> {
        let pairs = filter.map(|f| f.query_pairs()).unwrap_or_default();
        self.export(self.endpoint(&["v1", "pdfs"]), pairs, format, "pdfs")
            .await
    }

    async fn get_pdf(&self, id: &str) -> Result<PdfRecord> {
        let response = self
            .client
            .get(self.endpoint(&["v1", "pdfs", id]))
            .send()
            .await?;
        read_record(response).await
    }

    async fn delete_pdf(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoint(&["v1", "pdfs", id]))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn generate_summary(&self, pdf_id: &str, language: Language, style: Style) -> Result<Summary> {
        let response = self
            .client
            .post(self.endpoint(&["v1", "pdfs", pdf_id, "generate"]))
            .json(&GenerateRequest { language, style })
            .send()
            .await?;
        read_record(response).await
    }

    async fn list_summaries(
        &self,
        pdf_id: &str,
        filter: &SummaryFilter,
        page: u32,
        limit: u32,
    ) -> Result<Page<Summary>> {
        let response = self
            .client
            .get(self.endpoint(&["v1", "pdfs", pdf_id, "summaries"]))
            .query(&list_pairs(filter, page, limit))
            .send()
            .await?;
        read_page(response).await
    }

    async fn export_summaries(
        &self,
        pdf_id: &str,
        filter: Option<&SummaryFilter>,
        format: ExportFormat,
    ) -> Result<ExportFile> {
        let pairs = filter.map(|f| f.query_pairs()).unwrap_or_default();
        self.export(
            self.endpoint(&["v1", "pdfs", pdf_id, "summaries"]),
            pairs,
            format,
            "summaries",
        )
        .await
    }

    async fn get_summary(&self, id: &str) -> Result<Summary> {
        let response = self
            .client
            .get(self.endpoint(&["v1", "summary", id]))
            .send()
            .await?;
        read_record(response).await
    }

    async fn update_summary(&self, id: &str, content: &str) -> Result<()> {
        let response = self
            .client
            .put(self.endpoint(&["v1", "summary", id]))
            .json(&UpdateSummaryRequest { content })
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn delete_summary(&self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoint(&["v1", "summary", id]))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
