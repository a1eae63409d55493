//! Carousel Session Library
//!
//! Runs uploads concurrently, one task per file, and hosts the editing
//! session that applies their results to the attachment list.

pub mod runner;
pub mod session;

pub use runner::{UploadEvent, UploadTaskRunner};
pub use session::EditingSession;
