use std::fmt::{Display, Formatter, Result as FmtResult};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::remote_ref::RemoteRef;

/// Client-side identity of one attachment slot.
///
/// Stable for the lifetime of the item in the editing session and never
/// persisted. Upload results are correlated back to their item through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalKey(Uuid);

impl LocalKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LocalKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for LocalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Whether the item was added in this session or loaded from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    New,
    Existing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionState {
    Active,
    PendingDelete,
}

/// Transfer state of a `New` item that has no remote reference yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Uploading { progress: u8 },
    Failed { reason: String },
}

/// Where the item's thumbnail currently comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "lowercase")]
pub enum PreviewUrl {
    /// Revocable preview generated on the client; must be released exactly once.
    Local(String),
    /// URL served by the object store.
    Persisted(String),
}

impl PreviewUrl {
    pub fn as_str(&self) -> &str {
        match self {
            PreviewUrl::Local(url) | PreviewUrl::Persisted(url) => url,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, PreviewUrl::Local(_))
    }
}

/// Raw bytes of a picked or dropped file, kept on the item so a failed
/// upload can be retried without asking for the file again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl SourceFile {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A file accepted by intake, ready to be appended to the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub local_key: LocalKey,
    pub source_file: SourceFile,
    pub preview_url: PreviewUrl,
}

/// An attachment as delivered by the host form when the editor opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingMedia {
    pub upload_id: String,
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub ordering: u32,
    #[serde(default)]
    pub is_main: bool,
}

/// One attachment slot in the ordered collection.
///
/// Fields are read-only outside this crate; every change goes through
/// [`crate::collection::MediaCollection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    pub(crate) local_key: LocalKey,
    pub(crate) origin: Origin,
    #[serde(skip)]
    pub(crate) source_file: Option<SourceFile>,
    /// Name the file was picked under; kept after the upload drops the data.
    pub(crate) file_name: Option<String>,
    pub(crate) preview_url: PreviewUrl,
    pub(crate) remote_ref: Option<RemoteRef>,
    pub(crate) ordering: u32,
    pub(crate) is_main: bool,
    pub(crate) deletion_state: DeletionState,
    pub(crate) upload_state: UploadState,
}

impl MediaItem {
    pub(crate) fn from_new(item: NewItem, ordering: u32) -> Self {
        Self {
            local_key: item.local_key,
            origin: Origin::New,
            file_name: Some(item.source_file.file_name.clone()),
            source_file: Some(item.source_file),
            preview_url: item.preview_url,
            remote_ref: None,
            ordering,
            is_main: false,
            deletion_state: DeletionState::Active,
            upload_state: UploadState::Idle,
        }
    }

    pub(crate) fn from_existing(media: ExistingMedia) -> Self {
        let remote_ref = RemoteRef::new(media.upload_id, media.path, media.url.clone());
        Self {
            local_key: LocalKey::new(),
            origin: Origin::Existing,
            source_file: None,
            file_name: None,
            preview_url: PreviewUrl::Persisted(media.url),
            remote_ref: Some(remote_ref),
            ordering: media.ordering,
            is_main: media.is_main,
            deletion_state: DeletionState::Active,
            upload_state: UploadState::Idle,
        }
    }

    pub fn local_key(&self) -> LocalKey {
        self.local_key
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn source_file(&self) -> Option<&SourceFile> {
        self.source_file.as_ref()
    }

    /// Original file name of a `New` item, available before and after upload.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn preview_url(&self) -> &PreviewUrl {
        &self.preview_url
    }

    pub fn remote_ref(&self) -> Option<&RemoteRef> {
        self.remote_ref.as_ref()
    }

    pub fn ordering(&self) -> u32 {
        self.ordering
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    pub fn deletion_state(&self) -> DeletionState {
        self.deletion_state
    }

    pub fn upload_state(&self) -> &UploadState {
        &self.upload_state
    }

    pub fn is_active(&self) -> bool {
        self.deletion_state == DeletionState::Active
    }

    /// A `New` item whose transfer has not settled: queued or in flight.
    pub fn is_uploading(&self) -> bool {
        self.origin == Origin::New
            && self.remote_ref.is_none()
            && matches!(
                self.upload_state,
                UploadState::Idle | UploadState::Uploading { .. }
            )
    }

    /// A `New` item whose last transfer failed and which can be retried.
    pub fn is_failed(&self) -> bool {
        self.remote_ref.is_none() && matches!(self.upload_state, UploadState::Failed { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.upload_state {
            UploadState::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn progress(&self) -> Option<u8> {
        match self.upload_state {
            UploadState::Uploading { progress } => Some(progress),
            _ => None,
        }
    }

    /// Display label: the picked file name, or the storage path for persisted items.
    pub fn label(&self) -> &str {
        if let Some(file) = &self.source_file {
            return &file.file_name;
        }
        match &self.remote_ref {
            Some(remote) => remote.file_name(),
            None => self.preview_url.as_str(),
        }
    }
}
