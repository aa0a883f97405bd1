use super::{Job, JobQueue};
use crate::secrets::SecretString;
use async_trait::async_trait;
use sdk::admission::AdmissionHandleImpl;
use sdk::errors::EngineError;
use sdk::types::{QueueStats, SiteRequest};
use std::sync::Arc;
use std::time::Duration;

/// Connects the ingress admission handle to the job queue
pub struct QueueAdmission {
    queue: Arc<JobQueue>,
    secret: SecretString,
}

impl QueueAdmission {
    pub fn new(queue: Arc<JobQueue>, secret: SecretString) -> Self {
        Self { queue, secret }
    }
}

#[async_trait]
impl AdmissionHandleImpl for QueueAdmission {
    fn verify_secret(&self, presented: &str) -> bool {
        self.secret.matches(presented)
    }

    async fn submit(&self, request: SiteRequest, timeout: Duration) -> Result<(), EngineError> {
        let job = Job::new(request);
        let id = job.id();
        self.queue.try_enqueue(job, timeout).await?;
        tracing::debug!(job_id = %id, "Job admitted");
        Ok(())
    }

    fn stats(&self) -> QueueStats {
        self.queue.stats()
    }
}
