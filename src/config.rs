use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::Language;

const BACKEND_URL_ENV: &str = "PDFSUM_BACKEND_URL";
const MAX_FILE_SIZE_ENV: &str = "PDFSUM_MAX_FILE_SIZE";
const MIN_FILE_SIZE_ENV: &str = "PDFSUM_MIN_FILE_SIZE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Upload size bounds, checked locally before upload. The backend
    /// enforces its own limits.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_min_file_size")]
    pub min_file_size: u64,

    #[serde(default = "default_page_limit")]
    pub page_limit: u32,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_ceiling")]
    pub poll_ceiling_secs: u64,
    #[serde(default = "default_resume_skew")]
    pub resume_skew_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub default_language: Language,

    pub download_dir: Option<String>,
}

fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_max_file_size() -> u64 {
    3 * 1024 * 1024
}

fn default_min_file_size() -> u64 {
    1024
}

fn default_page_limit() -> u32 {
    10
}

fn default_poll_interval() -> u64 {
    2
}

fn default_poll_ceiling() -> u64 {
    60
}

fn default_resume_skew() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            max_file_size: default_max_file_size(),
            min_file_size: default_min_file_size(),
            page_limit: default_page_limit(),
            poll_interval_secs: default_poll_interval(),
            poll_ceiling_secs: default_poll_ceiling(),
            resume_skew_secs: default_resume_skew(),
            request_timeout_secs: default_request_timeout(),
            default_language: Language::default(),
            download_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pdfsum")
            .join("config.toml")
    }

    pub fn data_dir() -> PathBuf {
        let dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pdfsum");
        std::fs::create_dir_all(&dir).ok();
        dir
    }

    /// Where exports and saved summaries are written.
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_ceiling(&self) -> Duration {
        Duration::from_secs(self.poll_ceiling_secs)
    }

    pub fn resume_skew(&self) -> Duration {
        Duration::from_secs(self.resume_skew_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.backend_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(MAX_FILE_SIZE_ENV) {
            self.max_file_size = parse_size(MAX_FILE_SIZE_ENV, &raw)?;
        }
        if let Some(raw) = lookup(MIN_FILE_SIZE_ENV) {
            self.min_file_size = parse_size(MIN_FILE_SIZE_ENV, &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.backend_url)
            .map_err(|e| AppError::Config(format!("backend_url '{}': {}", self.backend_url, e)))?;

        if self.min_file_size > self.max_file_size {
            return Err(AppError::Config(format!(
                "min_file_size ({}) is larger than max_file_size ({})",
                self.min_file_size, self.max_file_size
            )));
        }
        if self.page_limit == 0 {
            return Err(AppError::Config("page_limit must be at least 1".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(AppError::Config("poll_interval_secs must be at least 1".to_string()));
        }
        if self.poll_ceiling_secs < self.poll_interval_secs {
            return Err(AppError::Config(
                "poll_ceiling_secs must not be shorter than poll_interval_secs".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_size(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{key} must be a byte count, got '{raw}'")))
}
