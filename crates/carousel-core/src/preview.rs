//! Local preview resources
//!
//! New items show a client-generated preview until their upload lands. Each
//! preview is owned by the item that created it and is released exactly once,
//! either when the item is removed or when a persisted URL supersedes it.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::PreviewUrl;

const PREVIEW_SCHEME: &str = "blob:carousel/";

/// Issues and tracks outstanding local previews.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    outstanding: HashSet<String>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a preview for a file about to be appended.
    pub fn create(&mut self, file_name: &str) -> PreviewUrl {
        let url = format!("{}{}", PREVIEW_SCHEME, Uuid::new_v4());
        tracing::trace!(preview = %url, file_name = %file_name, "Created local preview");
        self.outstanding.insert(url.clone());
        PreviewUrl::Local(url)
    }

    /// Release a preview. Returns false (and does nothing) for persisted URLs
    /// and for previews already released.
    pub fn release(&mut self, preview: &PreviewUrl) -> bool {
        let PreviewUrl::Local(url) = preview else {
            return false;
        };
        if self.outstanding.remove(url) {
            tracing::trace!(preview = %url, "Released local preview");
            true
        } else {
            tracing::warn!(preview = %url, "Preview already released or unknown");
            false
        }
    }

    /// Release every outstanding preview, returning how many were released.
    pub fn release_all(&mut self) -> usize {
        let count = self.outstanding.len();
        self.outstanding.clear();
        if count > 0 {
            tracing::debug!(count, "Released all outstanding previews");
        }
        count
    }

    pub fn is_outstanding(&self, preview: &PreviewUrl) -> bool {
        match preview {
            PreviewUrl::Local(url) => self.outstanding.contains(url),
            PreviewUrl::Persisted(_) => false,
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }
}
