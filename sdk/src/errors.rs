//! Error types and handling
//!
//! This module provides the process-level error type shared by the engine and
//! the ingress. Every variant implements `ErrorExt`, which supplies a hint that
//! is safe to hand back to a remote caller and tells whether retrying the
//! operation can succeed.
//!
//! Pipeline failures have their own error types inside the engine; only
//! startup, configuration and admission problems surface here.

use thiserror::Error;

/// Extensions every engine error provides
pub trait ErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint never includes secrets, internal paths or raw upstream bodies.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried by the caller without operator
    /// intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: invalid or missing configuration and secrets
/// - **Startup**: a collaborator failed its connectivity check
/// - **Admission**: the queue refused or dropped a submission
/// - **Ingress**: malformed or unauthenticated submissions
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ErrorExt};
///
/// let error = EngineError::QueueBusy;
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::Startup {
///     collaborator: "hosting".to_string(),
///     reason: "no repositories visible".to_string(),
/// };
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Secret unavailable: {0}")]
    Secret(String),

    // Startup errors
    #[error("Startup check failed for {collaborator}: {reason}")]
    Startup {
        collaborator: String,
        reason: String,
    },

    // Admission errors
    #[error("Queue busy: no slot accepted the job in time")]
    QueueBusy,

    #[error("Queue closed")]
    QueueClosed,

    // Ingress errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid secret")]
    InvalidSecret,

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Secret(_) => "Set the missing secret in the environment or the keychain",
            Self::Startup { .. } => "A backing service is unreachable. Check credentials and network",
            Self::QueueBusy => "The service is busy. Retry the submission shortly",
            Self::QueueClosed => "The service is shutting down",
            Self::InvalidRequest(_) => "The submission is malformed",
            Self::InvalidSecret => "The shared secret does not match",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Startup { .. } | Self::QueueClosed | Self::InvalidSecret => false,
            _ => true,
        }
    }
}
