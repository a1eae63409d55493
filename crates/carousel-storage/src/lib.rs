//! Carousel Storage Library
//!
//! Upload endpoint abstraction and backends. The task runner in
//! `carousel-session` depends only on the [`UploadEndpoint`] trait, so tests
//! can substitute a scripted endpoint.
//!
//! # Storage key format
//!
//! The local backend places files at `{folder}/{upload_id}-{file_name}`.
//! Keys must not contain `..` or a leading `/`. The HTTP backend leaves key
//! assignment to the server and returns whatever path it reports.

pub mod factory;
#[cfg(feature = "upload-http")]
pub mod http;
#[cfg(feature = "upload-local")]
pub(crate) mod keys;
#[cfg(feature = "upload-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use carousel_core::UploadBackend;
pub use factory::create_endpoint;
#[cfg(feature = "upload-http")]
pub use http::{Auth, HttpUploadEndpoint};
#[cfg(feature = "upload-local")]
pub use local::LocalUploadEndpoint;
pub use traits::{ProgressReporter, UploadEndpoint, UploadError, UploadRequest, UploadResult};
