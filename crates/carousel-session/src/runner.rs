//! Upload task runner
//!
//! Drives one file's transfer per spawned task. Each task reports
//! [`UploadEvent`]s tagged with the item's [`LocalKey`] over an unbounded
//! channel and always ends with exactly one `Finished` event. Tasks share
//! nothing but the endpoint, so a failure or timeout in one never touches
//! its siblings.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use carousel_core::{CarouselConfig, LocalKey, RemoteRef};
use carousel_storage::{ProgressReporter, UploadEndpoint, UploadError, UploadRequest, UploadResult};
use futures::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long a timed-out endpoint gets to wind down after cancellation.
const CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Update emitted by a running upload task.
#[derive(Debug)]
pub enum UploadEvent {
    Started { key: LocalKey, total_bytes: u64 },
    Progress { key: LocalKey, percent: u8 },
    Finished {
        key: LocalKey,
        result: Result<RemoteRef, UploadError>,
    },
}

impl UploadEvent {
    pub fn key(&self) -> LocalKey {
        match self {
            UploadEvent::Started { key, .. }
            | UploadEvent::Progress { key, .. }
            | UploadEvent::Finished { key, .. } => *key,
        }
    }
}

#[derive(Clone)]
pub struct UploadTaskRunner {
    endpoint: Arc<dyn UploadEndpoint>,
    timeout: Duration,
}

impl UploadTaskRunner {
    pub fn new(endpoint: Arc<dyn UploadEndpoint>, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }

    pub fn from_config(endpoint: Arc<dyn UploadEndpoint>, config: &CarouselConfig) -> Self {
        Self::new(endpoint, config.upload_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one transfer to completion, enforcing the timeout. On expiry the
    /// token is cancelled so the endpoint aborts the in-flight request.
    ///
    /// A transfer that still completes during the cancel grace period is
    /// reported as timed out; the object it stored is logged at `warn` since
    /// nothing will reference it.
    pub async fn run(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> UploadResult<RemoteRef> {
        let key = request.local_key;
        let upload = self.endpoint.upload(request, progress, cancel.clone());
        tokio::pin!(upload);

        tokio::select! {
            result = &mut upload => result,
            _ = tokio::time::sleep(self.timeout) => {
                cancel.cancel();
                match tokio::time::timeout(CANCEL_GRACE, upload).await {
                    Ok(Ok(remote)) => tracing::warn!(
                        local_key = %key,
                        upload_id = %remote.upload_id,
                        path = %remote.path,
                        "Upload finished after timeout; stored object is orphaned"
                    ),
                    Ok(Err(_)) => {}
                    Err(_) => tracing::warn!(local_key = %key, "Upload endpoint ignored cancellation"),
                }
                Err(UploadError::TimedOut(self.timeout))
            }
        }
    }

    /// Spawn the transfer and report its events on `events`. A panic in the
    /// endpoint is reported as a failed `Finished` event.
    pub fn spawn(
        &self,
        request: UploadRequest,
        cancel: CancellationToken,
        events: UnboundedSender<UploadEvent>,
    ) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            let key = request.local_key;
            let file_name = request.file.file_name.clone();
            let total_bytes = request.file.size() as u64;
            // A closed channel means the session was discarded; the upload
            // still runs to completion.
            let _ = events.send(UploadEvent::Started { key, total_bytes });

            let progress_tx = events.clone();
            let progress = ProgressReporter::new(move |percent| {
                let _ = progress_tx.send(UploadEvent::Progress { key, percent });
            });

            let start = Instant::now();
            let result = AssertUnwindSafe(runner.run(request, progress, cancel))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(UploadError::Transport("Upload task panicked".to_string())));
            let duration_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(remote) => tracing::debug!(
                    local_key = %key,
                    upload_id = %remote.upload_id,
                    duration_ms,
                    "Upload task succeeded"
                ),
                Err(e) => tracing::warn!(
                    local_key = %key,
                    file_name = %file_name,
                    error = %e,
                    duration_ms,
                    "Upload task failed"
                ),
            }

            let _ = events.send(UploadEvent::Finished { key, result });
        })
    }
}
