//! Admission handle
//!
//! The ingress never sees the engine's queue directly. It receives an
//! `AdmissionHandle`, a cloneable wrapper around whatever the engine plugs in,
//! and can only verify the shared secret, submit requests and read queue
//! statistics through it.

use crate::errors::EngineError;
use crate::types::{QueueStats, SiteRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Handle for submitting work to the engine
#[derive(Clone)]
pub struct AdmissionHandle {
    inner: Arc<dyn AdmissionHandleImpl>,
}

impl AdmissionHandle {
    /// Create a new AdmissionHandle with the given implementation
    pub fn new(inner: Arc<dyn AdmissionHandleImpl>) -> Self {
        Self { inner }
    }

    /// Check a presented shared secret
    pub fn verify_secret(&self, presented: &str) -> bool {
        self.inner.verify_secret(presented)
    }

    /// Hand a request to the engine, waiting at most `timeout` for a slot
    ///
    /// `Ok` only means the request was admitted, not that it completed.
    pub async fn submit(&self, request: SiteRequest, timeout: Duration) -> Result<(), EngineError> {
        self.inner.submit(request, timeout).await
    }

    /// Current queue statistics
    pub fn stats(&self) -> QueueStats {
        self.inner.stats()
    }
}

/// Trait for admission implementation (to be implemented by engine)
#[async_trait]
pub trait AdmissionHandleImpl: Send + Sync {
    /// Whether `presented` equals the configured shared secret
    fn verify_secret(&self, presented: &str) -> bool;

    /// Admit a request or fail with `EngineError::QueueBusy` after `timeout`
    async fn submit(&self, request: SiteRequest, timeout: Duration) -> Result<(), EngineError>;

    /// Report queue capacity, occupancy and worker count
    fn stats(&self) -> QueueStats;
}
