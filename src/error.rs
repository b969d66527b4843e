use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error(transparent)]
    Validation(#[from] crate::upload::ValidationError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Message suitable for a toast: the backend's own text for API errors.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
