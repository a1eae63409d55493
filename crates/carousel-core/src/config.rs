//! Configuration module
//!
//! Upload endpoint, folder and picker settings for the attachment editor,
//! read from the environment (and `.env` when present).

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::intake::PickMode;
use crate::storage_types::UploadBackend;

const API_URL: &str = "http://localhost:3000";
const UPLOAD_PATH: &str = "/api/v0/uploads";
const UPLOAD_FOLDER: &str = "products";
const UPLOAD_TIMEOUT_SECS: u64 = 10;
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarouselConfig {
    pub upload_backend: UploadBackend,
    pub api_url: String,
    pub api_key: Option<String>,
    pub upload_path: String,
    pub upload_folder: String,
    pub upload_timeout_secs: u64,
    pub upload_chunk_bytes: usize,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub pick_mode: PickMode,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self {
            upload_backend: UploadBackend::Http,
            api_url: API_URL.to_string(),
            api_key: None,
            upload_path: UPLOAD_PATH.to_string(),
            upload_folder: UPLOAD_FOLDER.to_string(),
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            upload_chunk_bytes: UPLOAD_CHUNK_BYTES,
            local_storage_path: None,
            local_storage_base_url: None,
            pick_mode: PickMode::Multiple,
        }
    }
}

impl CarouselConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source. Unset or blank
    /// variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let upload_backend = match var("CAROUSEL_UPLOAD_BACKEND") {
            Some(value) => value.parse::<UploadBackend>()?,
            None => UploadBackend::Http,
        };

        let pick_mode = match var("CAROUSEL_PICK_MODE") {
            Some(value) => value.parse::<PickMode>()?,
            None => PickMode::Multiple,
        };

        let upload_timeout_secs = parse_or_default(
            "CAROUSEL_UPLOAD_TIMEOUT_SECS",
            var("CAROUSEL_UPLOAD_TIMEOUT_SECS"),
            UPLOAD_TIMEOUT_SECS,
        );
        let upload_chunk_bytes = parse_or_default(
            "CAROUSEL_UPLOAD_CHUNK_BYTES",
            var("CAROUSEL_UPLOAD_CHUNK_BYTES"),
            UPLOAD_CHUNK_BYTES,
        );

        Ok(Self {
            upload_backend,
            api_url: var("CAROUSEL_API_URL")
                .unwrap_or_else(|| API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: var("CAROUSEL_API_KEY"),
            upload_path: var("CAROUSEL_UPLOAD_PATH").unwrap_or_else(|| UPLOAD_PATH.to_string()),
            upload_folder: var("CAROUSEL_UPLOAD_FOLDER")
                .unwrap_or_else(|| UPLOAD_FOLDER.to_string()),
            upload_timeout_secs,
            upload_chunk_bytes,
            local_storage_path: var("CAROUSEL_LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("CAROUSEL_LOCAL_STORAGE_BASE_URL"),
            pick_mode,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "CAROUSEL_UPLOAD_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.upload_chunk_bytes == 0 {
            return Err(anyhow::anyhow!(
                "CAROUSEL_UPLOAD_CHUNK_BYTES must be greater than zero"
            ));
        }

        if self.upload_folder.contains("..") || self.upload_folder.starts_with('/') {
            return Err(anyhow::anyhow!(
                "CAROUSEL_UPLOAD_FOLDER must be a relative path without '..'"
            ));
        }

        match self.upload_backend {
            UploadBackend::Http => {
                if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
                    return Err(anyhow::anyhow!(
                        "CAROUSEL_API_URL must start with http:// or https://"
                    ));
                }
                if self.api_key.is_none() {
                    return Err(anyhow::anyhow!(
                        "CAROUSEL_API_KEY must be set when using the http upload backend"
                    ));
                }
            }
            UploadBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "CAROUSEL_LOCAL_STORAGE_PATH must be set when using the local upload backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "CAROUSEL_LOCAL_STORAGE_BASE_URL must be set when using the local upload backend"
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn upload_backend(&self) -> UploadBackend {
        self.upload_backend
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// Full URL of the multipart upload endpoint.
    pub fn upload_url(&self) -> String {
        format!("{}{}", self.api_url, self.upload_path)
    }

    pub fn upload_folder(&self) -> &str {
        &self.upload_folder
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn upload_chunk_bytes(&self) -> usize {
        self.upload_chunk_bytes
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.local_storage_base_url.as_deref()
    }

    pub fn pick_mode(&self) -> PickMode {
        self.pick_mode
    }
}

/// Parse an optional numeric setting. A malformed value is logged and
/// replaced by `default`.
fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display + Copy,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(
                variable = name,
                value = %raw,
                default = %default,
                "Ignoring malformed configuration value"
            );
            default
        }
    }
}
