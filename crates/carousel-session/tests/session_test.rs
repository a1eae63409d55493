//! End-to-end editing session tests against a scripted upload endpoint.
//!
//! Time is paused, so the 10 s upload timeout elapses instantly once every
//! task is idle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use carousel_core::{
    CandidateFile, CarouselError, DeletionState, ErrorMetadata, ExistingMedia, Ineligible,
    Instruction, LocalKey, PickMode, Presentation, RemoteRef, UploadBackend, UploadState,
};
use carousel_session::{EditingSession, UploadEvent, UploadTaskRunner};
use carousel_storage::{
    LocalUploadEndpoint, ProgressReporter, UploadEndpoint, UploadError, UploadRequest, UploadResult,
};
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Behaviour of one attempt for a given file name.
#[derive(Clone, Copy, Debug)]
enum Step {
    Succeed(Duration),
    Reject(u16),
    /// Never finishes on its own; only cancellation ends it.
    Hang,
    /// The endpoint itself panics mid-transfer.
    Panic,
}

/// Endpoint whose behaviour is scripted per file name and per attempt.
/// Files without a script succeed after 10ms.
#[derive(Default)]
struct ScriptedEndpoint {
    scripts: Mutex<HashMap<String, Vec<Step>>>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl ScriptedEndpoint {
    fn script(self, file_name: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(file_name.to_string(), steps);
        self
    }

    fn attempts(&self, file_name: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(file_name)
            .copied()
            .unwrap_or(0)
    }

    fn next_step(&self, file_name: &str) -> Step {
        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts.entry(file_name.to_string()).or_insert(0);
        *attempt += 1;
        self.scripts
            .lock()
            .unwrap()
            .get(file_name)
            .and_then(|steps| steps.get(*attempt - 1).copied())
            .unwrap_or(Step::Succeed(Duration::from_millis(10)))
    }
}

#[async_trait]
impl UploadEndpoint for ScriptedEndpoint {
    async fn upload(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> UploadResult<RemoteRef> {
        let name = request.file.file_name.clone();
        let step = self.next_step(&name);
        progress.report(25);

        match step {
            Step::Succeed(delay) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(UploadError::Aborted),
                    _ = tokio::time::sleep(delay) => {
                        progress.report(100);
                        let id = format!("id-{}", name);
                        Ok(RemoteRef::new(
                            id.clone(),
                            format!("{}/{}", request.folder, id),
                            format!("https://cdn.example.com/{}/{}", request.folder, id),
                        ))
                    }
                }
            }
            Step::Reject(status) => Err(UploadError::Server {
                status,
                message: "rejected".to_string(),
            }),
            Step::Hang => {
                cancel.cancelled().await;
                Err(UploadError::Aborted)
            }
            Step::Panic => panic!("endpoint bug while uploading {}", name),
        }
    }

    fn backend_type(&self) -> UploadBackend {
        UploadBackend::Http
    }
}

fn session(endpoint: Arc<ScriptedEndpoint>, existing: Vec<ExistingMedia>) -> EditingSession {
    EditingSession::new(
        existing,
        UploadTaskRunner::new(endpoint, TIMEOUT),
        "products",
        PickMode::Multiple,
    )
}

fn png(name: &str) -> CandidateFile {
    CandidateFile::new(name, Some("image/png".to_string()), Bytes::from_static(b"\x89PNG"))
}

fn existing(upload_id: &str, ordering: u32, is_main: bool) -> ExistingMedia {
    ExistingMedia {
        upload_id: upload_id.to_string(),
        path: format!("products/{}.jpg", upload_id),
        url: format!("https://cdn.example.com/products/{}.jpg", upload_id),
        ordering,
        is_main,
    }
}

fn upload_id(session: &EditingSession, key: LocalKey) -> Option<String> {
    session
        .collection()
        .get(key)
        .and_then(|item| item.remote_ref())
        .map(|remote| remote.upload_id.clone())
}

#[tokio::test(start_paused = true)]
async fn append_three_then_timeout_and_retry() {
    let endpoint = Arc::new(
        ScriptedEndpoint::default()
            .script("b.png", vec![Step::Hang, Step::Succeed(Duration::from_millis(5))]),
    );
    let mut session = session(endpoint.clone(), Vec::new());

    let keys = session
        .intake_picked(vec![png("a.png"), png("b.png"), png("c.png")])
        .unwrap();
    assert_eq!(keys.len(), 3);

    let orderings: Vec<u32> = session.collection().active().map(|i| i.ordering()).collect();
    assert_eq!(orderings, vec![0, 1, 2]);
    assert!(session.collection().get(keys[0]).unwrap().is_main());
    assert_eq!(session.in_flight(), 3);

    session.settle().await;

    let failed = session.collection().get(keys[1]).unwrap();
    assert!(failed.is_failed());
    assert_eq!(failed.failure_reason(), Some("Upload timed out after 10s"));
    assert_eq!(upload_id(&session, keys[0]).as_deref(), Some("id-a.png"));
    assert_eq!(upload_id(&session, keys[2]).as_deref(), Some("id-c.png"));

    let err = session.failure(keys[1]).unwrap();
    assert_eq!(err.presentation(), Presentation::Inline);

    session.retry(keys[1]).unwrap();
    assert!(session.collection().get(keys[1]).unwrap().is_uploading());
    session.settle().await;

    let retried = session.collection().get(keys[1]).unwrap();
    assert_eq!(upload_id(&session, keys[1]).as_deref(), Some("id-b.png"));
    assert_eq!(retried.ordering(), 1);
    assert_eq!(endpoint.attempts("b.png"), 2);
    assert_eq!(session.previews().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn out_of_order_completions_update_only_their_item() {
    let endpoint = Arc::new(
        ScriptedEndpoint::default()
            .script("first.png", vec![Step::Succeed(Duration::from_millis(300))])
            .script("second.png", vec![Step::Reject(500)])
            .script("third.png", vec![Step::Succeed(Duration::from_millis(100))]),
    );
    let mut session = session(endpoint, Vec::new());
    let keys = session
        .intake_dropped(vec![png("first.png"), png("second.png"), png("third.png")])
        .unwrap();

    let mut finished = Vec::new();
    while let Some(event) = session.next_event().await {
        if let UploadEvent::Finished { key, .. } = event {
            finished.push(key);
        }
    }
    assert_eq!(finished, vec![keys[1], keys[2], keys[0]]);

    assert_eq!(upload_id(&session, keys[0]).as_deref(), Some("id-first.png"));
    assert_eq!(upload_id(&session, keys[2]).as_deref(), Some("id-third.png"));
    let second = session.collection().get(keys[1]).unwrap();
    assert!(second.remote_ref().is_none());
    assert!(matches!(second.upload_state(), UploadState::Failed { reason } if reason.contains("500")));
}

#[tokio::test(start_paused = true)]
async fn uploading_items_are_locked() {
    let endpoint = Arc::new(ScriptedEndpoint::default().script("slow.png", vec![Step::Hang]));
    let mut session = session(endpoint, vec![existing("e0", 0, true), existing("e1", 1, false)]);
    let keys = session.intake_picked(vec![png("slow.png")]).unwrap();
    let before = session.collection().clone();

    let err = session.set_main(keys[0]).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_TARGET");
    assert_eq!(err.presentation(), Presentation::Silent);
    assert!(matches!(
        session.reorder(2, 0),
        Err(CarouselError::InvalidTarget(ref e)) if e.reason() == Ineligible::Uploading
    ));
    assert!(session.remove(keys[0]).is_err());

    assert!(!session.drag_start(2));
    assert!(session.drag_start(0));
    assert!(session.drop(2).is_err());
    assert_eq!(session.collection(), &before);

    assert!(session.cancel_upload(keys[0]));
    session.settle().await;
    let item = session.collection().get(keys[0]).unwrap();
    assert_eq!(item.failure_reason(), Some("Upload cancelled"));

    session.remove(keys[0]).unwrap();
    assert!(session.collection().get(keys[0]).is_none());
    assert_eq!(session.previews().outstanding(), 0);
}

#[tokio::test(start_paused = true)]
async fn removing_main_existing_promotes_next() {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    let mut session = session(endpoint, vec![existing("e0", 0, true), existing("e1", 1, false)]);
    let keys = session.intake_picked(vec![png("n.png")]).unwrap();
    session.settle().await;

    let e0 = session.collection().active_at(0).unwrap().local_key();
    let e1 = session.collection().active_at(1).unwrap().local_key();
    session.remove(e0).unwrap();

    let removed = session.collection().get(e0).unwrap();
    assert_eq!(removed.deletion_state(), DeletionState::PendingDelete);
    assert!(session.collection().get(e1).unwrap().is_main());
    let orderings: Vec<u32> = session.collection().active().map(|i| i.ordering()).collect();
    assert_eq!(orderings, vec![0, 1]);
    assert_eq!(session.collection().active_at(1).unwrap().local_key(), keys[0]);

    session.restore(e0).unwrap();
    assert_eq!(session.collection().active_len(), 3);
    assert!(session.collection().get(e1).unwrap().is_main());
}

#[tokio::test(start_paused = true)]
async fn drag_reorders_three_items() {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    let mut session = session(
        endpoint,
        vec![existing("A", 0, true), existing("B", 1, false), existing("C", 2, false)],
    );

    assert!(session.drag_start(0));
    assert!(session.drag_over(1));
    assert!(session.drag_over(2));
    assert!(session.drop(2).unwrap());

    let ids: Vec<String> = session
        .collection()
        .active()
        .map(|i| i.remote_ref().unwrap().upload_id.clone())
        .collect();
    assert_eq!(ids, vec!["B", "C", "A"]);
    assert_eq!(session.drag_state().dragging(), None);
}

#[tokio::test(start_paused = true)]
async fn submission_blocked_until_settled() {
    let endpoint = Arc::new(
        ScriptedEndpoint::default()
            .script("ok.png", vec![Step::Succeed(Duration::from_millis(50))])
            .script("bad.png", vec![Step::Reject(502)]),
    );
    let mut session = session(endpoint, vec![existing("e0", 0, true)]);
    let keys = session.intake_picked(vec![png("ok.png"), png("bad.png")]).unwrap();

    let err = session.submit().unwrap_err();
    assert_eq!(err.presentation(), Presentation::HostForm);
    match err {
        CarouselError::SubmissionBlocked(blocked) => assert_eq!(blocked.uploading.len(), 2),
        other => panic!("unexpected error: {other:?}"),
    }

    session.settle().await;
    match session.submit().unwrap_err() {
        CarouselError::SubmissionBlocked(blocked) => {
            assert!(blocked.uploading.is_empty());
            assert_eq!(blocked.failed, vec![keys[1]]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    session.remove(keys[1]).unwrap();
    let e0 = session.collection().active_at(0).unwrap().local_key();
    session.remove(e0).unwrap();

    let instructions = session.submit().unwrap();
    assert_eq!(
        instructions,
        vec![
            Instruction::Create {
                upload_id: "id-ok.png".to_string(),
                ordering: 0,
                is_main: true,
            },
            Instruction::Delete {
                upload_id: "e0".to_string(),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn single_pick_replaces_list() {
    let endpoint = Arc::new(ScriptedEndpoint::default());
    let mut session = EditingSession::new(
        vec![existing("old", 0, true)],
        UploadTaskRunner::new(endpoint, TIMEOUT),
        "avatars",
        PickMode::Single,
    );

    let keys = session
        .intake_picked(vec![png("one.png"), png("two.png")])
        .unwrap();
    assert_eq!(keys.len(), 1);
    session.settle().await;

    assert_eq!(session.collection().active_len(), 1);
    let item = session.collection().active_at(0).unwrap();
    assert!(item.is_main());
    assert_eq!(item.remote_ref().unwrap().path, "avatars/id-one.png");
    assert_eq!(session.collection().pending_deletes().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn drop_discards_non_images_and_discard_releases_previews() {
    let endpoint = Arc::new(ScriptedEndpoint::default().script("hang.png", vec![Step::Hang]));
    let mut session = session(endpoint, Vec::new());

    let keys = session
        .intake_dropped(vec![
            png("hang.png"),
            CandidateFile::new("notes.txt", None, Bytes::from_static(b"hello")),
        ])
        .unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(session.previews().outstanding(), 1);

    let empty = session
        .intake_dropped(vec![CandidateFile::new("a.pdf", None, Bytes::new())])
        .unwrap();
    assert!(empty.is_empty());

    assert_eq!(session.discard(), 1);
}

#[tokio::test(start_paused = true)]
async fn progress_is_recorded_while_uploading() {
    let endpoint = Arc::new(
        ScriptedEndpoint::default().script("p.png", vec![Step::Succeed(Duration::from_secs(1))]),
    );
    let mut session = session(endpoint, Vec::new());
    let keys = session.intake_picked(vec![png("p.png")]).unwrap();

    // Started, then the first progress report.
    session.next_event().await;
    session.next_event().await;
    assert_eq!(session.collection().get(keys[0]).unwrap().progress(), Some(25));

    session.settle().await;
    assert_eq!(session.collection().get(keys[0]).unwrap().progress(), None);
    assert!(session.poll().is_empty());
}

#[tokio::test(start_paused = true)]
async fn panicking_upload_fails_item_and_settles() {
    let endpoint = Arc::new(ScriptedEndpoint::default().script("boom.png", vec![Step::Panic]));
    let mut session = session(endpoint.clone(), Vec::new());
    let keys = session
        .intake_picked(vec![png("ok.png"), png("boom.png")])
        .unwrap();

    tokio::time::timeout(Duration::from_secs(3), session.settle())
        .await
        .expect("settle returns after a panicked upload");

    assert_eq!(session.in_flight(), 0);
    let failed = session.collection().get(keys[1]).unwrap();
    assert!(failed.is_failed());
    assert!(!failed.is_uploading());
    assert_eq!(failed.failure_reason(), Some("Network error: Upload task panicked"));
    assert_eq!(upload_id(&session, keys[0]).as_deref(), Some("id-ok.png"));

    session.retry(keys[1]).unwrap();
    session.settle().await;
    assert_eq!(upload_id(&session, keys[1]).as_deref(), Some("id-boom.png"));
    assert_eq!(endpoint.attempts("boom.png"), 2);
}

#[tokio::test]
async fn local_endpoint_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let endpoint = LocalUploadEndpoint::new(dir.path(), "http://localhost:3000/media", 2)
        .await
        .unwrap();
    let mut session = EditingSession::new(
        Vec::new(),
        UploadTaskRunner::new(Arc::new(endpoint), TIMEOUT),
        "products",
        PickMode::Multiple,
    );

    let keys = session.intake_picked(vec![png("cat.png")]).unwrap();
    session.settle().await;

    let remote = session.collection().get(keys[0]).unwrap().remote_ref().unwrap().clone();
    assert!(dir.path().join(&remote.path).exists());
    assert_eq!(
        session.collection().get(keys[0]).unwrap().preview_url().as_str(),
        remote.url
    );

    let instructions = session.submit().unwrap();
    assert!(matches!(&instructions[0], Instruction::Create { is_main: true, ordering: 0, .. }));
}
