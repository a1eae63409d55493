//! Upload endpoint abstraction
//!
//! This module defines the UploadEndpoint trait that every upload backend
//! implements, plus the progress sink handed to each transfer.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carousel_core::{LocalKey, RemoteRef, SourceFile, UploadBackend};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Upload operation errors
///
/// The `Display` text is the human-readable reason stored on a failed item.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload cancelled")]
    Aborted,

    #[error("Upload timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Server rejected upload ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid server response: {0}")]
    InvalidResponse(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// One file transfer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Correlation key of the item this upload belongs to.
    pub local_key: LocalKey,
    /// Target folder/category string.
    pub folder: String,
    pub file: SourceFile,
}

/// Progress sink for a single transfer.
///
/// Percentages are clamped to 100 and never decrease: a report lower than or
/// equal to the last one is dropped. Clones share the same high-water mark.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Option<Arc<dyn Fn(u8) + Send + Sync>>,
    last: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub fn new(sink: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self {
            sink: Some(Arc::new(sink)),
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    /// A reporter that only tracks the high-water mark.
    pub fn noop() -> Self {
        Self {
            sink: None,
            last: Arc::new(AtomicU8::new(0)),
        }
    }

    pub fn report(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last.fetch_max(percent, Ordering::AcqRel);
        if percent > previous {
            if let Some(sink) = &self.sink {
                sink(percent);
            }
        }
    }

    /// Report `sent` out of `total` bytes. An empty body counts as complete.
    pub fn report_bytes(&self, sent: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (sent.min(total) * 100 / total) as u8
        };
        self.report(percent);
    }

    pub fn last(&self) -> u8 {
        self.last.load(Ordering::Acquire)
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("last", &self.last())
            .finish()
    }
}

/// Upload endpoint trait
///
/// Accepts a file plus a folder string and resolves to the persisted
/// reference (opaque upload id, storage path, public URL). Implementations
/// must stop promptly and return [`UploadError::Aborted`] once `cancel` fires.
#[async_trait]
pub trait UploadEndpoint: Send + Sync {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> UploadResult<RemoteRef>;

    /// Get the upload backend type
    fn backend_type(&self) -> UploadBackend;
}
