//! Shared key generation for upload backends.
//!
//! Key format: `{folder}/{upload_id}-{file_name}`. Folders must be relative
//! and free of `..`; path separators in file names are flattened.

use crate::traits::{UploadError, UploadResult};

/// Generate the storage key for an upload.
pub fn generate_storage_key(folder: &str, upload_id: &str, file_name: &str) -> UploadResult<String> {
    let folder = folder.trim_matches('/');
    if folder.split('/').any(|segment| segment == "..") || folder.starts_with('\\') {
        return Err(UploadError::InvalidKey(format!(
            "Folder contains invalid segments: {}",
            folder
        )));
    }

    let file_name = sanitize_file_name(file_name);
    if folder.is_empty() {
        Ok(format!("{}-{}", upload_id, file_name))
    } else {
        Ok(format!("{}/{}-{}", folder, upload_id, file_name))
    }
}

fn sanitize_file_name(file_name: &str) -> String {
    let cleaned: String = file_name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
