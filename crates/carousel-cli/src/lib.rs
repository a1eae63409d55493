use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use carousel_core::{CandidateFile, ExistingMedia, LocalKey, MediaCollection};
use serde::Serialize;

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for CLI binaries. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read the host's existing attachments from a JSON array file.
pub async fn load_existing(path: Option<&Path>) -> anyhow::Result<Vec<ExistingMedia>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid attachment list in {}", path.display()))
}

/// Load a file from disk as an intake candidate. The content type is left
/// for intake to infer from the file name.
pub async fn read_candidate(path: &Path) -> anyhow::Result<CandidateFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .with_context(|| format!("No usable file name in {}", path.display()))?;
    Ok(CandidateFile::new(file_name, None, Bytes::from(data)))
}

/// Find the active item addressed by upload id, original file name or
/// display label, in that order of preference.
pub fn find_active(collection: &MediaCollection, selector: &str) -> Option<LocalKey> {
    let by_id = collection.active().find(|item| {
        item.remote_ref()
            .is_some_and(|remote| remote.upload_id == selector)
    });
    by_id
        .or_else(|| collection.active().find(|item| item.file_name() == Some(selector)))
        .or_else(|| collection.active().find(|item| item.label() == selector))
        .map(|item| item.local_key())
}

/// One row of the active view printed by `carousel check`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ActiveEntry {
    pub ordering: u32,
    pub is_main: bool,
    pub upload_id: Option<String>,
    pub label: String,
    pub url: String,
}

pub fn active_view(collection: &MediaCollection) -> Vec<ActiveEntry> {
    collection
        .active()
        .map(|item| ActiveEntry {
            ordering: item.ordering(),
            is_main: item.is_main(),
            upload_id: item.remote_ref().map(|remote| remote.upload_id.clone()),
            label: truncate_string(item.label(), 48),
            url: item.preview_url().as_str().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use carousel_core::{intake, PickMode, PreviewRegistry, RemoteRef};

    use super::*;

    #[test]
    fn truncate_string_short() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("", 5), "");
    }

    #[test]
    fn truncate_string_long() {
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("abc", 2), "...");
    }

    #[test]
    fn truncate_string_multibyte() {
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }

    #[tokio::test]
    async fn load_existing_normalises() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("existing.json");
        std::fs::write(
            &path,
            r#"[
                {"upload_id": "b", "path": "products/b.jpg", "url": "https://cdn/b.jpg", "ordering": 5},
                {"upload_id": "a", "path": "products/a.jpg", "url": "https://cdn/a.jpg", "ordering": 2}
            ]"#,
        )
        .unwrap();

        let existing = load_existing(Some(&path)).await.unwrap();
        let view = active_view(&MediaCollection::from_existing(existing));
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].upload_id.as_deref(), Some("a"));
        assert_eq!(view[0].ordering, 0);
        assert!(view[0].is_main);
        assert_eq!(view[1].label, "b.jpg");
        assert_eq!(view[1].ordering, 1);
    }

    #[tokio::test]
    async fn load_existing_without_path_is_empty() {
        assert!(load_existing(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_existing_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{").unwrap();
        assert!(load_existing(Some(&path)).await.is_err());
    }

    #[tokio::test]
    async fn read_candidate_keeps_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.jpg");
        std::fs::write(&path, b"jpeg").unwrap();

        let candidate = read_candidate(&path).await.unwrap();
        assert_eq!(candidate.file_name, "cat.jpg");
        assert_eq!(candidate.resolved_content_type(), "image/jpeg");
        assert_eq!(candidate.data.as_ref(), b"jpeg");
    }

    #[test]
    fn find_active_by_upload_id() {
        let collection = MediaCollection::from_existing(vec![ExistingMedia {
            upload_id: "abc".to_string(),
            path: "products/abc-cat.jpg".to_string(),
            url: "https://cdn/abc-cat.jpg".to_string(),
            ordering: 0,
            is_main: true,
        }]);
        let key = collection.active_at(0).unwrap().local_key();
        assert_eq!(find_active(&collection, "abc"), Some(key));
        assert_eq!(find_active(&collection, "abc-cat.jpg"), Some(key));
        assert_eq!(find_active(&collection, "zzz"), None);
    }

    #[test]
    fn find_active_by_original_name_after_upload() {
        let candidate = CandidateFile::new("cat.jpg", Some("image/jpeg".to_string()), Bytes::from_static(b"jpeg"));
        let mut previews = PreviewRegistry::new();
        let batch = intake::from_picker(vec![candidate], PickMode::Multiple, &mut previews);
        let collection = MediaCollection::new().append(batch.items).unwrap();
        let key = collection.active_at(0).unwrap().local_key();
        let collection = collection
            .begin_upload(key)
            .unwrap()
            .attach_upload_result(
                key,
                RemoteRef::new("u1", "products/u1-cat.jpg", "https://cdn/products/u1-cat.jpg"),
            )
            .unwrap();

        assert_eq!(collection.get(key).unwrap().label(), "u1-cat.jpg");
        assert_eq!(find_active(&collection, "cat.jpg"), Some(key));
        assert_eq!(find_active(&collection, "u1"), Some(key));
        assert_eq!(find_active(&collection, "u1-cat.jpg"), Some(key));
    }
}
