//! Submission payload
//!
//! Serialises the attachment list into the ordered instruction list the host
//! form submits: active items first (in display order), then deletions.

use crate::collection::MediaCollection;
use crate::models::{Instruction, LocalKey, MediaItem, Origin};

/// Submission attempted while uploads are unresolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Submission blocked: {} upload(s) in progress, {} failed", uploading.len(), failed.len())]
pub struct SubmissionBlocked {
    pub uploading: Vec<LocalKey>,
    pub failed: Vec<LocalKey>,
}

/// Build the instruction list, or explain why the list cannot be submitted yet.
pub fn build_instructions(collection: &MediaCollection) -> Result<Vec<Instruction>, SubmissionBlocked> {
    let uploading = collection.uploading_keys();
    let failed = collection.failed_keys();
    if !uploading.is_empty() || !failed.is_empty() {
        return Err(SubmissionBlocked { uploading, failed });
    }

    let mut instructions: Vec<Instruction> = collection.active().filter_map(active_instruction).collect();
    instructions.extend(collection.pending_deletes().filter_map(|item| {
        item.remote_ref().map(|remote| Instruction::Delete {
            upload_id: remote.upload_id.clone(),
        })
    }));
    Ok(instructions)
}

fn active_instruction(item: &MediaItem) -> Option<Instruction> {
    let upload_id = item.remote_ref()?.upload_id.clone();
    let ordering = item.ordering();
    let is_main = item.is_main();
    Some(match item.origin() {
        Origin::New => Instruction::Create {
            upload_id,
            ordering,
            is_main,
        },
        Origin::Existing => Instruction::Keep {
            upload_id,
            ordering,
            is_main,
        },
    })
}
