//! Drop/pick intake
//!
//! Normalises the two input channels (native file picker, drop zone) into a
//! batch of [`NewItem`]s with local previews, ready for
//! [`MediaCollection::append`](crate::collection::MediaCollection::append).

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use bytes::Bytes;

use crate::models::{LocalKey, NewItem, SourceFile};
use crate::preview::PreviewRegistry;

const IMAGE_PREFIX: &str = "image/";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Picker selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PickMode {
    /// Keep only the first file and replace the current list.
    Single,
    #[default]
    Multiple,
}

impl FromStr for PickMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(PickMode::Single),
            "multiple" => Ok(PickMode::Multiple),
            _ => Err(anyhow::anyhow!("Invalid pick mode: {}", s)),
        }
    }
}

impl Display for PickMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PickMode::Single => write!(f, "single"),
            PickMode::Multiple => write!(f, "multiple"),
        }
    }
}

/// A file handed over by the picker or the drop zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub file_name: String,
    /// MIME type reported by the source, if any.
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl CandidateFile {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            data,
        }
    }

    /// Reported MIME type, or one guessed from the file name.
    pub fn resolved_content_type(&self) -> String {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .map(str::to_lowercase)
            .or_else(|| {
                mime_guess::from_path(&self.file_name)
                    .first()
                    .map(|mime| mime.essence_str().to_string())
            })
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
    }

    pub fn is_image(&self) -> bool {
        self.resolved_content_type().starts_with(IMAGE_PREFIX)
    }
}

/// Files accepted from one user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeBatch {
    pub items: Vec<NewItem>,
    /// Replace the current list instead of appending (single picker mode).
    pub replace: bool,
}

impl IntakeBatch {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> Vec<LocalKey> {
        self.items.iter().map(|item| item.local_key).collect()
    }
}

/// Files chosen through the native picker. In single mode only the first
/// file is kept and the batch replaces the current list.
pub fn from_picker(
    files: Vec<CandidateFile>,
    mode: PickMode,
    previews: &mut PreviewRegistry,
) -> IntakeBatch {
    let files: Vec<CandidateFile> = match mode {
        PickMode::Single => files.into_iter().take(1).collect(),
        PickMode::Multiple => files,
    };
    IntakeBatch {
        items: files
            .into_iter()
            .map(|file| to_new_item(file, previews))
            .collect(),
        replace: mode == PickMode::Single,
    }
}

/// Files dropped onto the zone. Non-image files are silently discarded.
pub fn from_drop(files: Vec<CandidateFile>, previews: &mut PreviewRegistry) -> IntakeBatch {
    let total = files.len();
    let items: Vec<NewItem> = files
        .into_iter()
        .filter(CandidateFile::is_image)
        .map(|file| to_new_item(file, previews))
        .collect();
    if items.len() < total {
        tracing::debug!(
            dropped = total,
            accepted = items.len(),
            "Discarded non-image files from drop"
        );
    }
    IntakeBatch {
        items,
        replace: false,
    }
}

fn to_new_item(file: CandidateFile, previews: &mut PreviewRegistry) -> NewItem {
    let content_type = file.resolved_content_type();
    let preview_url = previews.create(&file.file_name);
    NewItem {
        local_key: LocalKey::new(),
        source_file: SourceFile::new(file.file_name, content_type, file.data),
        preview_url,
    }
}
