//! Drag reorder controller
//!
//! Turns a press / hover / release gesture over the active items into a
//! single [`MediaCollection::reorder`] call. Indices are positions in the
//! active display order. The dragged and hovered positions are transient and
//! exist only for visual feedback.

use crate::collection::{CollectionError, MediaCollection};

/// Result of releasing a drag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// The list was reordered.
    Reordered(MediaCollection),
    /// Dropped where it started, or no drag was in progress.
    Unchanged,
    /// The collection refused the move; visual state has been cleared.
    Rejected(CollectionError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragReorder {
    dragging: Option<usize>,
    hovered: Option<usize>,
}

impl DragReorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dragging(&self) -> Option<usize> {
        self.dragging
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Begin dragging the item at `index`. Returns false, leaving no drag in
    /// progress, when the item is missing or still uploading.
    pub fn drag_start(&mut self, collection: &MediaCollection, index: usize) -> bool {
        self.clear();
        if !Self::is_valid_target(collection, index) {
            tracing::debug!(index, "Drag start rejected");
            return false;
        }
        self.dragging = Some(index);
        true
    }

    /// Track the hovered position. Invalid positions clear the hover marker.
    pub fn drag_over(&mut self, collection: &MediaCollection, index: usize) -> bool {
        if self.dragging.is_none() {
            return false;
        }
        if Self::is_valid_target(collection, index) {
            self.hovered = Some(index);
            true
        } else {
            self.hovered = None;
            false
        }
    }

    /// Release over `index`. Visual state is always cleared.
    pub fn drop(&mut self, collection: &MediaCollection, index: usize) -> DropOutcome {
        let from = self.dragging;
        self.clear();

        let Some(from) = from else {
            return DropOutcome::Unchanged;
        };
        if from == index {
            return DropOutcome::Unchanged;
        }

        match collection.reorder(from, index) {
            Ok(next) => DropOutcome::Reordered(next),
            Err(err) => {
                tracing::debug!(from, to = index, error = %err, "Drop rejected");
                DropOutcome::Rejected(err)
            }
        }
    }

    /// Abandon the gesture (pointer left the zone, escape pressed).
    pub fn cancel(&mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        self.dragging = None;
        self.hovered = None;
    }

    fn is_valid_target(collection: &MediaCollection, index: usize) -> bool {
        collection
            .active_at(index)
            .is_some_and(|item| !item.is_uploading())
    }
}
