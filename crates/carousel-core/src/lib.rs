//! Carousel Core Library
//!
//! Domain model for an ordered set of image attachments edited alongside a
//! host form: the item model, the pure collection controller, drag reorder,
//! file intake, preview bookkeeping, error types, configuration and the
//! submission payload. No I/O happens here; uploads live in
//! `carousel-storage` and are orchestrated by `carousel-session`.

pub mod collection;
pub mod config;
pub mod drag;
pub mod error;
pub mod intake;
pub mod models;
pub mod preview;
pub mod storage_types;
pub mod submission;

// Re-export commonly used types
pub use collection::{CollectionError, CollectionResult, Ineligible, MediaCollection, Target};
pub use config::CarouselConfig;
pub use drag::{DragReorder, DropOutcome};
pub use error::{CarouselError, ErrorMetadata, LogLevel, Presentation};
pub use intake::{CandidateFile, IntakeBatch, PickMode};
pub use models::{
    DeletionState, ExistingMedia, Instruction, LocalKey, MediaItem, NewItem, Origin, PreviewUrl,
    RemoteRef, SourceFile, UploadState,
};
pub use preview::PreviewRegistry;
pub use storage_types::UploadBackend;
pub use submission::{build_instructions, SubmissionBlocked};
