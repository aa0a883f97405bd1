//! Pagecraft SDK
//!
//! Shared library providing the request/bundle data model, the engine error
//! type and the admission handle. This crate is used by both the engine and
//! the ingress server.

/// Admission handle used by ingress to reach the engine
pub mod admission;

/// Error types and handling
pub mod errors;

/// Request, bundle and notification types
pub mod types;

// Re-export commonly used types
pub use admission::{AdmissionHandle, AdmissionHandleImpl};
pub use errors::{EngineError, ErrorExt};
pub use types::{
    Attachment, Bundle, EvaluatorNotification, GeneratedFile, QueueStats, Round, SiteRequest,
    INDEX_FILENAME, README_FILENAME, TRACKED_FILES,
};
