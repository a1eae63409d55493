//! Data models for the attachment editor
//!
//! The attachment slot itself, its remote reference, and the instruction
//! payload handed back to the host form on submission.

mod instruction;
mod media_item;
mod remote_ref;

pub use instruction::Instruction;
pub use media_item::{
    DeletionState, ExistingMedia, LocalKey, MediaItem, NewItem, Origin, PreviewUrl, SourceFile,
    UploadState,
};
pub use remote_ref::RemoteRef;
