//! Local pre-upload checks and the upload flow.
//!
//! Validation runs extension, size, declared MIME type and file signature
//! checks in that order and stops at the first failure. None of it is
//! authoritative: the backend may still reject the file.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::api::SummaryBackend;
use crate::config::Config;
use crate::error::Result;
use crate::models::{Language, PdfRecord, Style};

pub const PDF_MIME_TYPE: &str = "application/pdf";
const PDF_EXTENSION: &str = "pdf";
const PDF_MAGIC_NUMBER: [u8; 4] = [0x25, 0x50, 0x44, 0x46]; // %PDF

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid file extension. Only PDF files are allowed.")]
    InvalidExtension,

    #[error("File is too small. Minimum size is {} KB.", kib(.min_bytes))]
    TooSmall { min_bytes: u64 },

    #[error("File is too large. Maximum size is {} MB.", mib(.max_bytes))]
    TooLarge { max_bytes: u64 },

    #[error("Invalid file type. Only PDF files are allowed.")]
    InvalidMimeType,

    #[error("File is not a valid PDF. The file content does not match PDF format.")]
    NotPdf,

    #[error("Failed to read file content.")]
    Unreadable,
}

fn kib(bytes: &u64) -> f64 {
    *bytes as f64 / 1024.0
}

fn mib(bytes: &u64) -> f64 {
    *bytes as f64 / 1024.0 / 1024.0
}

/// A file picked for upload, with the MIME type it will be declared as.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
}

impl UploadCandidate {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mime_type = mime_for_name(&file_name).to_string();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
            mime_type,
        })
    }
}

fn mime_for_name(name: &str) -> &'static str {
    if has_pdf_extension(name) {
        PDF_MIME_TYPE
    } else {
        "application/octet-stream"
    }
}

fn has_pdf_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case(PDF_EXTENSION))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy)]
pub struct PdfValidator {
    min_size: u64,
    max_size: u64,
}

impl PdfValidator {
    pub fn new(min_size: u64, max_size: u64) -> Self {
        Self { min_size, max_size }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.min_file_size, config.max_file_size)
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn check_extension(&self, file_name: &str) -> std::result::Result<(), ValidationError> {
        if has_pdf_extension(file_name) {
            Ok(())
        } else {
            Err(ValidationError::InvalidExtension)
        }
    }

    pub fn check_size(&self, size: u64) -> std::result::Result<(), ValidationError> {
        if size < self.min_size {
            return Err(ValidationError::TooSmall {
                min_bytes: self.min_size,
            });
        }
        if size > self.max_size {
            return Err(ValidationError::TooLarge {
                max_bytes: self.max_size,
            });
        }
        Ok(())
    }

    pub fn check_mime_type(&self, mime_type: &str) -> std::result::Result<(), ValidationError> {
        if mime_type == PDF_MIME_TYPE {
            Ok(())
        } else {
            Err(ValidationError::InvalidMimeType)
        }
    }

    pub fn check_magic_number(&self, path: &Path) -> std::result::Result<(), ValidationError> {
        let mut header = [0u8; 4];
        let read = File::open(path)
            .and_then(|mut file| file.read_exact(&mut header))
            .map(|_| header);

        match read {
            Ok(bytes) if bytes == PDF_MAGIC_NUMBER => Ok(()),
            Ok(_) => Err(ValidationError::NotPdf),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ValidationError::NotPdf),
            Err(e) => {
                tracing::debug!("Failed to read {:?}: {}", path, e);
                Err(ValidationError::Unreadable)
            }
        }
    }

    pub fn validate(&self, candidate: &UploadCandidate) -> std::result::Result<(), ValidationError> {
        self.check_extension(&candidate.file_name)?;
        self.check_size(candidate.size)?;
        self.check_mime_type(&candidate.mime_type)?;
        self.check_magic_number(&candidate.path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Validating,
    Uploading,
    Complete,
}

impl UploadStage {
    pub fn message(&self) -> &'static str {
        match self {
            UploadStage::Validating => "Validating PDF file...",
            UploadStage::Uploading => "Uploading to server...",
            UploadStage::Complete => "Upload complete!",
        }
    }
}

/// Validate `path` locally, then upload it. Nothing is sent when validation
/// fails.
pub async fn upload_pdf(
    backend: &dyn SummaryBackend,
    validator: &PdfValidator,
    path: &Path,
    language: Language,
    style: Option<Style>,
    mut progress: impl FnMut(UploadStage),
) -> Result<PdfRecord> {
    progress(UploadStage::Validating);
    let candidate = UploadCandidate::from_path(path)?;
    validator.validate(&candidate)?;

    progress(UploadStage::Uploading);
    let bytes = tokio::fs::read(&candidate.path).await?;
    let pdf = backend
        .upload_pdf(&candidate.file_name, bytes, language, style)
        .await?;

    tracing::info!("Uploaded {} as {}", candidate.file_name, pdf.id);
    progress(UploadStage::Complete);
    Ok(pdf)
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
    }
}
