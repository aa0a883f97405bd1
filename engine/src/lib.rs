//! Pagecraft Engine Library
//!
//! Admission queue, worker pool and round pipelines behind the `pagecraft`
//! binary. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret management module
pub mod secrets;

/// Telemetry and Observability
pub mod telemetry;

/// Retry and polling helpers
pub mod retry;

/// Data URL attachments
pub mod attachments;

/// Bundle validation
pub mod bundle;

/// Repository hosting client
pub mod hosting;

/// Site generation client
pub mod generation;

/// Evaluator notification
pub mod notifier;

/// Round 1 and Round 2 pipelines
pub mod orchestrator;

/// Admission queue and worker pool
pub mod queue;

/// Service lifecycle module
pub mod daemon;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
