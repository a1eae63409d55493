//! Ordered collection controller
//!
//! [`MediaCollection`] is the single owner of the attachment list. Every
//! operation borrows the current list and returns a new one that satisfies
//! the collection invariants, or an error that leaves the input untouched:
//!
//! 1. `ordering` of active items is exactly `0..n-1`.
//! 2. Exactly one active item is main when any active item exists; none otherwise.
//! 3. Items still uploading cannot be dragged, removed, or made main.
//! 4. Persisted items are soft-deleted; unpersisted new items are removed outright.

use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

use crate::models::{
    DeletionState, ExistingMedia, LocalKey, MediaItem, NewItem, Origin, PreviewUrl, RemoteRef,
    UploadState,
};

/// What an operation pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Key(LocalKey),
    /// Position within the active, ordering-sorted subsequence.
    Index(usize),
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Target::Key(key) => write!(f, "item {}", key),
            Target::Index(index) => write!(f, "position {}", index),
        }
    }
}

/// Why a target was not eligible for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligible {
    NotFound,
    OutOfRange { len: usize },
    Uploading,
    NotUploading,
    UploadFailed,
    PendingDelete,
    AlreadyUploaded,
    DuplicateKey,
}

impl Display for Ineligible {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Ineligible::NotFound => write!(f, "no such item"),
            Ineligible::OutOfRange { len } => {
                write!(f, "out of range for {} active items", len)
            }
            Ineligible::Uploading => write!(f, "upload still in progress"),
            Ineligible::NotUploading => write!(f, "no upload in progress"),
            Ineligible::UploadFailed => write!(f, "upload failed"),
            Ineligible::PendingDelete => write!(f, "marked for deletion"),
            Ineligible::AlreadyUploaded => write!(f, "already uploaded"),
            Ineligible::DuplicateKey => write!(f, "key already present"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    #[error("Invalid target {target}: {reason}")]
    InvalidTarget { target: Target, reason: Ineligible },
}

impl CollectionError {
    fn key(key: LocalKey, reason: Ineligible) -> Self {
        CollectionError::InvalidTarget {
            target: Target::Key(key),
            reason,
        }
    }

    fn index(index: usize, reason: Ineligible) -> Self {
        CollectionError::InvalidTarget {
            target: Target::Index(index),
            reason,
        }
    }

    pub fn target(&self) -> Target {
        match self {
            CollectionError::InvalidTarget { target, .. } => *target,
        }
    }

    pub fn reason(&self) -> Ineligible {
        match self {
            CollectionError::InvalidTarget { reason, .. } => *reason,
        }
    }
}

pub type CollectionResult<T> = Result<T, CollectionError>;

/// The ordered attachment list.
///
/// Items are stored with the active set first, sorted by `ordering`, followed
/// by pending-delete items in the order they were marked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaCollection {
    items: Vec<MediaItem>,
}

impl MediaCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial list from server data, repairing gaps in `ordering`
    /// and the main flag. The first flagged item wins; with no flag the first
    /// item becomes main.
    pub fn from_existing(media: Vec<ExistingMedia>) -> Self {
        let mut items: Vec<MediaItem> = media.into_iter().map(MediaItem::from_existing).collect();
        items.sort_by_key(|item| item.ordering);

        let main_key = items
            .iter()
            .find(|item| item.is_main)
            .or_else(|| items.first())
            .map(|item| item.local_key);
        for item in &mut items {
            item.is_main = Some(item.local_key) == main_key;
        }

        let mut collection = Self { items };
        collection.normalize();
        collection
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Active items in display order.
    pub fn active(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter().filter(|item| item.is_active())
    }

    pub fn active_len(&self) -> usize {
        self.active().count()
    }

    pub fn pending_deletes(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter().filter(|item| !item.is_active())
    }

    pub fn get(&self, key: LocalKey) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.local_key == key)
    }

    /// Active item at `index` of the display order.
    pub fn active_at(&self, index: usize) -> Option<&MediaItem> {
        self.active().nth(index)
    }

    pub fn main_item(&self) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.is_main)
    }

    pub fn uploading_keys(&self) -> Vec<LocalKey> {
        self.items
            .iter()
            .filter(|item| item.is_uploading())
            .map(|item| item.local_key)
            .collect()
    }

    pub fn failed_keys(&self) -> Vec<LocalKey> {
        self.items
            .iter()
            .filter(|item| item.is_failed())
            .map(|item| item.local_key)
            .collect()
    }

    /// True when no transfer is queued or in flight. Failed items do not
    /// count as unsettled.
    pub fn all_uploads_settled(&self) -> bool {
        !self.items.iter().any(MediaItem::is_uploading)
    }

    /// Local previews held by this list that `next` no longer holds, i.e. the
    /// previews a transition from `self` to `next` must release.
    pub fn released_previews(&self, next: &MediaCollection) -> Vec<PreviewUrl> {
        self.items
            .iter()
            .map(|item| &item.preview_url)
            .filter(|preview| preview.is_local())
            .filter(|preview| !next.items.iter().any(|item| &item.preview_url == *preview))
            .cloned()
            .collect()
    }

    /// Local previews currently owned by items of this list.
    pub fn local_previews(&self) -> Vec<PreviewUrl> {
        self.items
            .iter()
            .map(|item| item.preview_url.clone())
            .filter(PreviewUrl::is_local)
            .collect()
    }

    /// Insert new items after the last active item, preserving batch order.
    /// When the active set was empty the first appended item becomes main.
    pub fn append(&self, new_items: Vec<NewItem>) -> CollectionResult<Self> {
        let mut next = self.clone();
        let was_empty = next.active_len() == 0;
        let mut ordering = next.active_len() as u32;

        for new_item in new_items {
            if next.position(new_item.local_key).is_some() {
                return Err(CollectionError::key(
                    new_item.local_key,
                    Ineligible::DuplicateKey,
                ));
            }
            next.items.push(MediaItem::from_new(new_item, ordering));
            ordering += 1;
        }

        next.normalize();
        if was_empty {
            next.assign_main_to_first_active();
        }
        Ok(next)
    }

    /// Hard-remove an unpersisted new item, or soft-delete a persisted one.
    pub fn remove_or_mark_deleted(&self, key: LocalKey) -> CollectionResult<Self> {
        let index = self.require(key)?;
        let item = &self.items[index];
        if !item.is_active() {
            return Err(CollectionError::key(key, Ineligible::PendingDelete));
        }
        if item.is_uploading() {
            return Err(CollectionError::key(key, Ineligible::Uploading));
        }

        let was_main = item.is_main;
        let hard_remove = item.origin == Origin::New && item.remote_ref.is_none();

        let mut next = self.clone();
        if hard_remove {
            next.items.remove(index);
        } else {
            let target = &mut next.items[index];
            target.deletion_state = DeletionState::PendingDelete;
            target.is_main = false;
        }

        next.normalize();
        if was_main {
            next.assign_main_to_first_active();
        }
        Ok(next)
    }

    /// Bring a pending-delete item back into the active set at its last
    /// position (clamped to the end). It only becomes main if the active set
    /// was empty. Restoring an active item returns an equal list.
    pub fn restore(&self, key: LocalKey) -> CollectionResult<Self> {
        let index = self.require(key)?;
        if self.items[index].is_active() {
            return Ok(self.clone());
        }

        let mut next = self.clone();
        let active_len = next.active_len() as u32;
        let slot = next.items[index].ordering.min(active_len);

        for item in next.items.iter_mut().filter(|item| item.is_active()) {
            if item.ordering >= slot {
                item.ordering += 1;
            }
        }

        let target = &mut next.items[index];
        target.deletion_state = DeletionState::Active;
        target.ordering = slot;
        target.is_main = active_len == 0;

        next.normalize();
        Ok(next)
    }

    pub fn set_main(&self, key: LocalKey) -> CollectionResult<Self> {
        let index = self.require(key)?;
        let item = &self.items[index];
        if !item.is_active() {
            return Err(CollectionError::key(key, Ineligible::PendingDelete));
        }
        if item.is_uploading() {
            return Err(CollectionError::key(key, Ineligible::Uploading));
        }
        if item.is_failed() {
            return Err(CollectionError::key(key, Ineligible::UploadFailed));
        }

        let mut next = self.clone();
        for item in &mut next.items {
            item.is_main = item.local_key == key;
        }
        Ok(next)
    }

    /// Move the active item at `from` to `to` (both positions in the active
    /// display order) and renumber.
    pub fn reorder(&self, from: usize, to: usize) -> CollectionResult<Self> {
        let mut keys: Vec<LocalKey> = self.active().map(|item| item.local_key).collect();
        let len = keys.len();

        for index in [from, to] {
            if index >= len {
                return Err(CollectionError::index(index, Ineligible::OutOfRange { len }));
            }
            if self.active_at(index).is_some_and(MediaItem::is_uploading) {
                return Err(CollectionError::index(index, Ineligible::Uploading));
            }
        }

        let moved = keys.remove(from);
        keys.insert(to, moved);

        let mut next = self.clone();
        for (position, key) in keys.iter().enumerate() {
            if let Some(item) = next.items.iter_mut().find(|item| item.local_key == *key) {
                item.ordering = position as u32;
            }
        }
        next.normalize();
        Ok(next)
    }

    /// Start (or restart after failure) the transfer of a new item.
    pub fn begin_upload(&self, key: LocalKey) -> CollectionResult<Self> {
        let index = self.require(key)?;
        let item = &self.items[index];
        if !item.is_active() {
            return Err(CollectionError::key(key, Ineligible::PendingDelete));
        }
        if item.origin != Origin::New || item.remote_ref.is_some() {
            return Err(CollectionError::key(key, Ineligible::AlreadyUploaded));
        }
        if matches!(item.upload_state, UploadState::Uploading { .. }) {
            return Err(CollectionError::key(key, Ineligible::Uploading));
        }

        let mut next = self.clone();
        next.items[index].upload_state = UploadState::Uploading { progress: 0 };
        Ok(next)
    }

    /// Record transfer progress. Percentages never decrease and clamp to 100.
    pub fn record_progress(&self, key: LocalKey, percent: u8) -> CollectionResult<Self> {
        let index = self.require(key)?;
        let current = match self.items[index].upload_state {
            UploadState::Uploading { progress } => progress,
            _ => return Err(CollectionError::key(key, Ineligible::NotUploading)),
        };

        let mut next = self.clone();
        next.items[index].upload_state = UploadState::Uploading {
            progress: current.max(percent.min(100)),
        };
        Ok(next)
    }

    /// Attach the server reference of a finished upload. The persisted URL
    /// supersedes the local preview and the raw file is dropped; the file
    /// name is kept.
    pub fn attach_upload_result(&self, key: LocalKey, remote_ref: RemoteRef) -> CollectionResult<Self> {
        let index = self.require(key)?;
        let item = &self.items[index];
        if item.origin != Origin::New || item.remote_ref.is_some() {
            return Err(CollectionError::key(key, Ineligible::AlreadyUploaded));
        }

        let mut next = self.clone();
        let target = &mut next.items[index];
        target.preview_url = PreviewUrl::Persisted(remote_ref.url.clone());
        target.remote_ref = Some(remote_ref);
        target.upload_state = UploadState::Idle;
        target.source_file = None;
        Ok(next)
    }

    /// Record a failed transfer. The item keeps its slot and its file so it
    /// can be retried.
    pub fn mark_upload_failed(&self, key: LocalKey, reason: impl Into<String>) -> CollectionResult<Self> {
        let index = self.require(key)?;
        let item = &self.items[index];
        if item.origin != Origin::New || item.remote_ref.is_some() {
            return Err(CollectionError::key(key, Ineligible::AlreadyUploaded));
        }

        let mut next = self.clone();
        next.items[index].upload_state = UploadState::Failed {
            reason: reason.into(),
        };
        Ok(next)
    }

    /// Single-file replacement: every active item is removed or marked
    /// deleted, then `new_items` are appended. Fails while any active item is
    /// still uploading.
    pub fn replace_with(&self, new_items: Vec<NewItem>) -> CollectionResult<Self> {
        if let Some(busy) = self.active().find(|item| item.is_uploading()) {
            return Err(CollectionError::key(busy.local_key, Ineligible::Uploading));
        }

        let keys: Vec<LocalKey> = self.active().map(|item| item.local_key).collect();
        let mut next = self.clone();
        for key in keys {
            next = next.remove_or_mark_deleted(key)?;
        }
        next.append(new_items)
    }

    /// Verify the collection invariants, describing the first violation.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut orderings: Vec<u32> = self.active().map(|item| item.ordering).collect();
        orderings.sort_unstable();
        for (expected, actual) in orderings.iter().enumerate() {
            if *actual != expected as u32 {
                return Err(format!(
                    "active ordering is not dense: expected {} found {}",
                    expected, actual
                ));
            }
        }

        let mains = self.active().filter(|item| item.is_main).count();
        let expected_mains = usize::from(self.active_len() > 0);
        if mains != expected_mains {
            return Err(format!(
                "expected {} main item(s) among active items, found {}",
                expected_mains, mains
            ));
        }

        if self.pending_deletes().any(|item| item.is_main) {
            return Err("pending-delete item flagged as main".to_string());
        }
        Ok(())
    }

    fn position(&self, key: LocalKey) -> Option<usize> {
        self.items.iter().position(|item| item.local_key == key)
    }

    fn require(&self, key: LocalKey) -> CollectionResult<usize> {
        self.position(key)
            .ok_or_else(|| CollectionError::key(key, Ineligible::NotFound))
    }

    /// Active items first in `ordering` order, then pending deletes in their
    /// current relative order; active orderings renumbered densely.
    fn normalize(&mut self) {
        self.items.sort_by_key(|item| match item.deletion_state {
            DeletionState::Active => (0, item.ordering),
            DeletionState::PendingDelete => (1, 0),
        });
        for (position, item) in self
            .items
            .iter_mut()
            .filter(|item| item.is_active())
            .enumerate()
        {
            item.ordering = position as u32;
        }
    }

    fn assign_main_to_first_active(&mut self) {
        for item in &mut self.items {
            item.is_main = false;
        }
        if let Some(first) = self.items.iter_mut().find(|item| item.is_active()) {
            first.is_main = true;
        }
    }
}
