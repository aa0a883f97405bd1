//! Evaluator notification
//!
//! One POST per completed round, retried with exponential backoff. Any 2xx
//! response counts as delivered; the body is ignored.

use crate::config::NotifierConfig;
use crate::retry::{with_backoff, RetryError};
use crate::secrets::scrub;
use async_trait::async_trait;
use sdk::types::EvaluatorNotification;
use std::time::Duration;
use thiserror::Error;

/// Why a single delivery attempt failed
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("network error: {0}")]
    Network(String),

    #[error("evaluator returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Failure after every attempt was spent
pub type NotifyError = RetryError<DeliveryError>;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `notification` to `evaluation_url`
    async fn notify(
        &self,
        evaluation_url: &str,
        notification: &EvaluatorNotification,
    ) -> Result<(), NotifyError>;
}

/// HTTP implementation of [`Notifier`]
pub struct EvaluatorNotifier {
    client: reqwest::Client,
    max_attempts: u32,
    base_delay: Duration,
}

impl EvaluatorNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
        })
    }

    async fn deliver(
        &self,
        evaluation_url: &str,
        notification: &EvaluatorNotification,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(evaluation_url)
            .json(notification)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(scrub(&e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = scrub(&body).chars().take(512).collect();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Notifier for EvaluatorNotifier {
    async fn notify(
        &self,
        evaluation_url: &str,
        notification: &EvaluatorNotification,
    ) -> Result<(), NotifyError> {
        with_backoff(self.max_attempts, self.base_delay, |attempt| {
            tracing::debug!(attempt, url = evaluation_url, "Notifying evaluator");
            self.deliver(evaluation_url, notification)
        })
        .await?;

        tracing::info!(
            task = %notification.task,
            round = %notification.round,
            commit = %notification.commit_sha,
            "Evaluator notified"
        );
        Ok(())
    }
}
