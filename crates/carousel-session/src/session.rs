//! Editing session
//!
//! [`EditingSession`] owns the attachment list for one host form. Every
//! change goes through a [`MediaCollection`] operation; the session adds
//! the effects around it: starting upload tasks, applying their events,
//! releasing local previews, and guarding submission.

use std::collections::HashMap;
use std::sync::Arc;

use carousel_core::intake::{self, IntakeBatch};
use carousel_core::{
    build_instructions, CandidateFile, CarouselConfig, CarouselError, CollectionError, DragReorder,
    DropOutcome, ExistingMedia, Ineligible, Instruction, LocalKey, MediaCollection, PickMode,
    PreviewRegistry, Target,
};
use carousel_storage::{UploadEndpoint, UploadRequest};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::runner::{UploadEvent, UploadTaskRunner};

pub struct EditingSession {
    collection: MediaCollection,
    previews: PreviewRegistry,
    drag: DragReorder,
    runner: UploadTaskRunner,
    folder: String,
    pick_mode: PickMode,
    event_tx: UnboundedSender<UploadEvent>,
    event_rx: UnboundedReceiver<UploadEvent>,
    inflight: HashMap<LocalKey, CancellationToken>,
}

impl EditingSession {
    /// Open a session over the host's existing attachments.
    pub fn new(
        existing: Vec<ExistingMedia>,
        runner: UploadTaskRunner,
        folder: impl Into<String>,
        pick_mode: PickMode,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let collection = MediaCollection::from_existing(existing);
        tracing::debug!(items = collection.len(), "Editing session opened");
        Self {
            collection,
            previews: PreviewRegistry::new(),
            drag: DragReorder::new(),
            runner,
            folder: folder.into(),
            pick_mode,
            event_tx,
            event_rx,
            inflight: HashMap::new(),
        }
    }

    pub fn from_config(
        existing: Vec<ExistingMedia>,
        endpoint: Arc<dyn UploadEndpoint>,
        config: &CarouselConfig,
    ) -> Self {
        Self::new(
            existing,
            UploadTaskRunner::from_config(endpoint, config),
            config.upload_folder(),
            config.pick_mode(),
        )
    }

    pub fn collection(&self) -> &MediaCollection {
        &self.collection
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn drag_state(&self) -> &DragReorder {
        &self.drag
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn pick_mode(&self) -> PickMode {
        self.pick_mode
    }

    /// Number of upload tasks whose result has not been applied yet.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Files chosen through the picker. Returns the keys of the new items,
    /// whose uploads have already started.
    pub fn intake_picked(&mut self, files: Vec<CandidateFile>) -> Result<Vec<LocalKey>, CarouselError> {
        let batch = intake::from_picker(files, self.pick_mode, &mut self.previews);
        self.accept(batch)
    }

    /// Files dropped on the zone; non-images are discarded.
    pub fn intake_dropped(&mut self, files: Vec<CandidateFile>) -> Result<Vec<LocalKey>, CarouselError> {
        let batch = intake::from_drop(files, &mut self.previews);
        self.accept(batch)
    }

    fn accept(&mut self, batch: IntakeBatch) -> Result<Vec<LocalKey>, CarouselError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let keys = batch.keys();
        let previews: Vec<_> = batch.items.iter().map(|item| item.preview_url.clone()).collect();
        let result = if batch.replace {
            self.collection.replace_with(batch.items)
        } else {
            self.collection.append(batch.items)
        };

        let next = match result {
            Ok(next) => next,
            Err(e) => {
                for preview in &previews {
                    self.previews.release(preview);
                }
                return Err(self.rejected(e));
            }
        };
        self.apply(next);
        tracing::info!(count = keys.len(), replace = batch.replace, "Files added");

        for key in &keys {
            self.start_upload(*key)?;
        }
        Ok(keys)
    }

    fn start_upload(&mut self, key: LocalKey) -> Result<(), CarouselError> {
        let file = self
            .collection
            .get(key)
            .and_then(|item| item.source_file())
            .cloned()
            .ok_or_else(|| CarouselError::Internal(format!("No source file retained for {}", key)))?;

        let next = self.collection.begin_upload(key).map_err(|e| self.rejected(e))?;
        self.apply(next);

        let cancel = CancellationToken::new();
        self.inflight.insert(key, cancel.clone());
        let request = UploadRequest {
            local_key: key,
            folder: self.folder.clone(),
            file,
        };
        self.runner.spawn(request, cancel, self.event_tx.clone());
        Ok(())
    }

    /// Re-run the upload of a failed item with the file it retained.
    pub fn retry(&mut self, key: LocalKey) -> Result<(), CarouselError> {
        if self.inflight.contains_key(&key) {
            return Err(self.rejected(CollectionError::InvalidTarget {
                target: Target::Key(key),
                reason: Ineligible::Uploading,
            }));
        }
        tracing::info!(local_key = %key, "Retrying upload");
        self.start_upload(key)
    }

    /// Abort one in-flight upload. The item fails with a retryable reason
    /// once the task reports back; siblings are unaffected.
    pub fn cancel_upload(&mut self, key: LocalKey) -> bool {
        match self.inflight.get(&key) {
            Some(cancel) => {
                cancel.cancel();
                tracing::debug!(local_key = %key, "Upload cancellation requested");
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: LocalKey) -> Result<(), CarouselError> {
        let next = self
            .collection
            .remove_or_mark_deleted(key)
            .map_err(|e| self.rejected(e))?;
        self.apply(next);
        Ok(())
    }

    pub fn restore(&mut self, key: LocalKey) -> Result<(), CarouselError> {
        let next = self.collection.restore(key).map_err(|e| self.rejected(e))?;
        self.apply(next);
        Ok(())
    }

    pub fn set_main(&mut self, key: LocalKey) -> Result<(), CarouselError> {
        let next = self.collection.set_main(key).map_err(|e| self.rejected(e))?;
        self.apply(next);
        Ok(())
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), CarouselError> {
        let next = self.collection.reorder(from, to).map_err(|e| self.rejected(e))?;
        self.apply(next);
        Ok(())
    }

    pub fn drag_start(&mut self, index: usize) -> bool {
        self.drag.drag_start(&self.collection, index)
    }

    pub fn drag_over(&mut self, index: usize) -> bool {
        self.drag.drag_over(&self.collection, index)
    }

    pub fn drag_cancel(&mut self) {
        self.drag.cancel();
    }

    /// Release the drag over `index`. Returns whether the list changed.
    pub fn drop(&mut self, index: usize) -> Result<bool, CarouselError> {
        match self.drag.drop(&self.collection, index) {
            DropOutcome::Reordered(next) => {
                self.apply(next);
                Ok(true)
            }
            DropOutcome::Unchanged => Ok(false),
            DropOutcome::Rejected(e) => Err(self.rejected(e)),
        }
    }

    /// Apply every event already delivered, without waiting.
    pub fn poll(&mut self) -> Vec<UploadEvent> {
        let mut applied = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply_event(&event);
            applied.push(event);
        }
        applied
    }

    /// Wait for and apply the next event. Returns `None` once no upload is in
    /// flight and nothing is queued.
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        let event = if self.inflight.is_empty() {
            self.event_rx.try_recv().ok()?
        } else {
            self.event_rx.recv().await?
        };
        self.apply_event(&event);
        Some(event)
    }

    /// Wait until every started upload has finished, applying events as they
    /// arrive. Never short-circuits on a failure.
    pub async fn settle(&mut self) -> Vec<UploadEvent> {
        let mut applied = Vec::new();
        while let Some(event) = self.next_event().await {
            applied.push(event);
        }
        tracing::debug!(
            failed = self.collection.failed_keys().len(),
            "All uploads settled"
        );
        applied
    }

    /// Why a failed item is failed, as a presentable error.
    pub fn failure(&self, key: LocalKey) -> Option<CarouselError> {
        let reason = self.collection.get(key)?.failure_reason()?;
        Some(CarouselError::UploadFailed {
            key,
            reason: reason.to_string(),
        })
    }

    /// The instruction list for the host form, or `SubmissionBlocked`.
    pub fn submit(&self) -> Result<Vec<Instruction>, CarouselError> {
        let instructions = build_instructions(&self.collection).map_err(|blocked| {
            let err = CarouselError::from(blocked);
            err.log();
            err
        })?;
        tracing::info!(instructions = instructions.len(), "Submission payload built");
        Ok(instructions)
    }

    /// Close the session. Pending uploads are left to finish unobserved;
    /// every outstanding preview is released. Returns how many were released.
    pub fn discard(mut self) -> usize {
        let released = self.previews.release_all();
        tracing::debug!(
            released,
            unobserved_uploads = self.inflight.len(),
            "Editing session discarded"
        );
        released
    }

    fn apply_event(&mut self, event: &UploadEvent) {
        let next = match event {
            UploadEvent::Started { key, total_bytes } => {
                tracing::debug!(local_key = %key, total_bytes, "Upload started");
                return;
            }
            UploadEvent::Progress { key, percent } => {
                tracing::trace!(local_key = %key, progress = percent, "Upload progress");
                self.collection.record_progress(*key, *percent)
            }
            UploadEvent::Finished { key, result } => {
                self.inflight.remove(key);
                match result {
                    Ok(remote) => {
                        tracing::info!(local_key = %key, upload_id = %remote.upload_id, "Upload attached");
                        self.collection.attach_upload_result(*key, remote.clone())
                    }
                    Err(e) => {
                        CarouselError::UploadFailed {
                            key: *key,
                            reason: e.to_string(),
                        }
                        .log();
                        self.collection.mark_upload_failed(*key, e.to_string())
                    }
                }
            }
        };

        match next {
            Ok(next) => self.apply(next),
            Err(e) => {
                tracing::debug!(local_key = %event.key(), error = %e, "Discarding stale upload event");
            }
        }
    }

    /// Install `next`, releasing the local previews it no longer holds.
    fn apply(&mut self, next: MediaCollection) {
        for preview in self.collection.released_previews(&next) {
            self.previews.release(&preview);
        }
        self.collection = next;
        debug_assert!(self.collection.check_invariants().is_ok());
    }

    fn rejected(&self, e: CollectionError) -> CarouselError {
        let err = CarouselError::from(e);
        err.log();
        err
    }
}
