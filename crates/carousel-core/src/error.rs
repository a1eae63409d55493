//! Error types module
//!
//! All failures surfaced by the attachment editor are unified under
//! [`CarouselError`]. Each variant self-describes how it should be presented
//! through [`ErrorMetadata`], so the UI can render inline state instead of a
//! generic failure banner.

use std::io;

use crate::collection::CollectionError;
use crate::models::LocalKey;
use crate::submission::SubmissionBlocked;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected races the user can simply retry
    Debug,
    /// Warning level - for recoverable per-item failures
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Where an error should surface in the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// Revert the visual state only; no toast, no persistent error.
    Silent,
    /// Render on the affected item with a retry affordance.
    Inline,
    /// Surfaced by the host form around the submit action.
    HostForm,
    /// Generic failure banner.
    Banner,
}

/// Metadata describing how an error should be presented and logged.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "INVALID_TARGET")
    fn error_code(&self) -> &'static str;

    /// Whether the user can recover by retrying or adjusting the list
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// User-facing message
    fn user_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;

    /// Where the error is shown
    fn presentation(&self) -> Presentation;
}

#[derive(Debug, thiserror::Error)]
pub enum CarouselError {
    #[error(transparent)]
    InvalidTarget(#[from] CollectionError),

    #[error("Upload failed for {key}: {reason}")]
    UploadFailed { key: LocalKey, reason: String },

    #[error(transparent)]
    SubmissionBlocked(#[from] SubmissionBlocked),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for CarouselError {
    fn from(err: io::Error) -> Self {
        CarouselError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for CarouselError {
    fn from(err: serde_json::Error) -> Self {
        CarouselError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level, presentation).
fn carousel_error_static_metadata(
    err: &CarouselError,
) -> (
    &'static str,
    bool,
    Option<&'static str>,
    LogLevel,
    Presentation,
) {
    match err {
        CarouselError::InvalidTarget(_) => (
            "INVALID_TARGET",
            true,
            Some("Wait for the upload to finish and try again"),
            LogLevel::Debug,
            Presentation::Silent,
        ),
        CarouselError::UploadFailed { .. } => (
            "UPLOAD_FAILED",
            true,
            Some("Retry the upload or remove the image"),
            LogLevel::Warn,
            Presentation::Inline,
        ),
        CarouselError::SubmissionBlocked(_) => (
            "SUBMISSION_BLOCKED",
            true,
            Some("Wait for uploads to finish, or retry or remove failed images"),
            LogLevel::Debug,
            Presentation::HostForm,
        ),
        CarouselError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check the provided data and try again"),
            LogLevel::Debug,
            Presentation::Banner,
        ),
        CarouselError::Config(_) => (
            "CONFIG_ERROR",
            false,
            Some("Check the upload configuration"),
            LogLevel::Error,
            Presentation::Banner,
        ),
        CarouselError::Internal(_) => (
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
            Presentation::Banner,
        ),
    }
}

impl ErrorMetadata for CarouselError {
    fn error_code(&self) -> &'static str {
        carousel_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        carousel_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        carousel_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        carousel_error_static_metadata(self).3
    }

    fn presentation(&self) -> Presentation {
        carousel_error_static_metadata(self).4
    }

    fn user_message(&self) -> String {
        match self {
            CarouselError::InvalidTarget(_) => "That image cannot be changed right now".to_string(),
            CarouselError::UploadFailed { reason, .. } => reason.clone(),
            CarouselError::SubmissionBlocked(blocked) => {
                if blocked.uploading.is_empty() {
                    format!("{} image(s) failed to upload", blocked.failed.len())
                } else {
                    format!("{} image(s) are still uploading", blocked.uploading.len())
                }
            }
            CarouselError::InvalidInput(msg) => msg.clone(),
            CarouselError::Config(_) => "Uploads are not configured".to_string(),
            CarouselError::Internal(_) => "Something went wrong".to_string(),
        }
    }
}

impl CarouselError {
    /// Emit this error through `tracing` at its configured level.
    pub fn log(&self) {
        match self.log_level() {
            LogLevel::Debug => tracing::debug!(code = self.error_code(), error = %self, "Operation rejected"),
            LogLevel::Warn => tracing::warn!(code = self.error_code(), error = %self, "Operation failed"),
            LogLevel::Error => tracing::error!(code = self.error_code(), error = %self, "Operation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::MediaCollection;

    #[test]
    fn test_invalid_target_is_silent() {
        let err: CarouselError = MediaCollection::new()
            .set_main(LocalKey::new())
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), "INVALID_TARGET");
        assert!(err.is_recoverable());
        assert_eq!(err.presentation(), Presentation::Silent);
        assert_eq!(err.log_level(), LogLevel::Debug);
    }

    #[test]
    fn test_upload_failed_is_inline_with_reason() {
        let err = CarouselError::UploadFailed {
            key: LocalKey::new(),
            reason: "Upload timed out after 10s".to_string(),
        };
        assert_eq!(err.error_code(), "UPLOAD_FAILED");
        assert_eq!(err.presentation(), Presentation::Inline);
        assert_eq!(err.user_message(), "Upload timed out after 10s");
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_submission_blocked_message() {
        let err = CarouselError::from(SubmissionBlocked {
            uploading: vec![LocalKey::new(), LocalKey::new()],
            failed: vec![],
        });
        assert_eq!(err.error_code(), "SUBMISSION_BLOCKED");
        assert_eq!(err.presentation(), Presentation::HostForm);
        assert_eq!(err.user_message(), "2 image(s) are still uploading");

        let failed_only = CarouselError::from(SubmissionBlocked {
            uploading: vec![],
            failed: vec![LocalKey::new()],
        });
        assert_eq!(failed_only.user_message(), "1 image(s) failed to upload");
    }

    #[test]
    fn test_json_error_maps_to_invalid_input() {
        let err: CarouselError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), "INVALID_INPUT");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_suggested_actions() {
        let err = CarouselError::Config("missing".to_string());
        assert_eq!(err.suggested_action(), Some("Check the upload configuration"));
        assert_eq!(err.user_message(), "Uploads are not configured");
    }
}
