use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Upload backend types
///
/// Defined in core because configuration selects it; the endpoints
/// themselves live in `carousel-storage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    /// Multipart POST to the media API.
    Http,
    /// Files written under a local directory and served from a base URL.
    Local,
}

impl FromStr for UploadBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(UploadBackend::Http),
            "local" => Ok(UploadBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid upload backend: {}", s)),
        }
    }
}

impl Display for UploadBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadBackend::Http => write!(f, "http"),
            UploadBackend::Local => write!(f, "local"),
        }
    }
}
