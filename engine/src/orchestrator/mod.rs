//! Round pipelines
//!
//! The orchestrator runs one submission end to end against the hosting,
//! generation and evaluator collaborators it was built with:
//!
//! - **Round 1** resets the task repository and publishes a fresh bundle
//! - **Round 2** revises the published bundle under optimistic concurrency
//!
//! Every step's failure aborts the run. The evaluator hears about a round
//! only after every earlier step succeeded, so a failed run is visible to it
//! only as a missing notification.

mod license;
pub mod locks;
mod round1;
mod round2;

pub use license::mit_license;
pub use locks::TaskLocks;

use crate::attachments::{DataUrlError, PreparedAttachment};
use crate::bundle::{describe, BundleViolation};
use crate::config::Config;
use crate::generation::{AttachmentRef, GenerationError, SiteGenerator};
use crate::hosting::{HostError, RepoHost};
use crate::notifier::{Notifier, NotifyError};
use crate::retry::{wait_until, WaitOutcome};
use sdk::types::{Attachment, EvaluatorNotification, Round, SiteRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a pipeline run was abandoned
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("hosting unreachable: {0}")]
    Unreachable(#[source] HostError),

    #[error("{step} failed: {source}")]
    Hosting {
        step: String,
        #[source]
        source: HostError,
    },

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("attachment '{name}' rejected: {source}")]
    Attachment {
        name: String,
        #[source]
        source: DataUrlError,
    },

    #[error("bundle rejected: {}", describe(.0))]
    InvalidBundle(Vec<BundleViolation>),

    #[error("unexpected file in revision: {0}")]
    UnexpectedFile(String),

    #[error("version conflict on {0}")]
    Conflict(String),

    #[error("evaluator notification failed: {0}")]
    Notification(#[from] NotifyError),

    #[error("cancelled by shutdown")]
    Cancelled,

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

impl PipelineError {
    fn hosting(step: impl Into<String>) -> impl FnOnce(HostError) -> Self {
        let step = step.into();
        move |source| match source {
            HostError::VersionConflict { path } => PipelineError::Conflict(path),
            source => PipelineError::Hosting { step, source },
        }
    }
}

/// Tunables the pipelines read
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub build_poll_attempts: u32,
    pub build_poll_interval: Duration,
    /// `Name <email>` written into the seeded license
    pub license_holder: String,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            build_poll_attempts: config.pipeline.build_poll_attempts,
            build_poll_interval: config.pipeline.build_poll_interval(),
            license_holder: format!(
                "{} <{}>",
                config.github.committer_name, config.github.committer_email
            ),
        }
    }
}

/// Runs Round 1 and Round 2 pipelines
pub struct Orchestrator {
    host: Arc<dyn RepoHost>,
    generator: Arc<dyn SiteGenerator>,
    notifier: Arc<dyn Notifier>,
    settings: PipelineSettings,
    locks: TaskLocks,
}

impl Orchestrator {
    pub fn new(
        host: Arc<dyn RepoHost>,
        generator: Arc<dyn SiteGenerator>,
        notifier: Arc<dyn Notifier>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            host,
            generator,
            notifier,
            settings,
            locks: TaskLocks::new(),
        }
    }

    /// Run the round `request` asks for and return what the evaluator was sent
    pub async fn run(
        &self,
        request: &SiteRequest,
        cancel: &CancellationToken,
    ) -> Result<EvaluatorNotification, PipelineError> {
        let _guard = self.locks.acquire(&request.task).await;

        match request.round {
            Round::Bootstrap => self.bootstrap(request, cancel).await,
            Round::Revision => self.revise(request, cancel).await,
        }
    }

    /// Decode and upload every attachment, returning how the page may reference them
    async fn upload_attachments(
        &self,
        repo: &str,
        attachments: &[Attachment],
    ) -> Result<Vec<AttachmentRef>, PipelineError> {
        let mut refs = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let prepared =
                PreparedAttachment::prepare(attachment).map_err(|source| {
                    PipelineError::Attachment {
                        name: attachment.name.clone(),
                        source,
                    }
                })?;

            self.host
                .create_file(
                    repo,
                    &prepared.stored_name,
                    &prepared.bytes,
                    &format!("feat: add attachment {}", prepared.original_name),
                )
                .await
                .map_err(PipelineError::hosting(format!(
                    "upload attachment {}",
                    prepared.stored_name
                )))?;

            tracing::debug!(
                attachment = %prepared.original_name,
                stored = %prepared.stored_name,
                bytes = prepared.bytes.len(),
                "Uploaded attachment"
            );

            refs.push(AttachmentRef {
                filename: prepared.original_name.clone(),
                url: prepared.relative_url(),
            });
        }

        Ok(refs)
    }

    async fn latest_commit(&self, repo: &str) -> Result<String, PipelineError> {
        self.host
            .latest_commit(repo)
            .await
            .map_err(PipelineError::hosting("resolve latest commit"))
    }

    /// Wait for the newest page build to report `built` for `commit`.
    ///
    /// Never fails: a slow or erroring build service only produces a warning.
    async fn await_build(&self, repo: &str, commit: &str, cancel: &CancellationToken) {
        let outcome = wait_until(
            self.settings.build_poll_attempts,
            self.settings.build_poll_interval,
            cancel,
            |_| async move {
                let builds = self.host.page_builds(repo).await?;
                Ok::<_, HostError>(
                    builds
                        .first()
                        .map(|b| b.is_built_for(commit))
                        .unwrap_or(false),
                )
            },
        )
        .await;

        match outcome {
            WaitOutcome::Satisfied { attempts } => {
                tracing::info!(commit, attempts, "Pages build complete");
            }
            WaitOutcome::Exhausted { attempts } => {
                tracing::warn!(commit, attempts, "Pages build did not complete in time");
            }
            WaitOutcome::Cancelled => {
                tracing::warn!(commit, "Stopped waiting for pages build");
            }
        }
    }

    /// Poll the build, re-resolve the head commit and notify the evaluator
    async fn publish_and_notify(
        &self,
        request: &SiteRequest,
        cancel: &CancellationToken,
    ) -> Result<EvaluatorNotification, PipelineError> {
        let repo = request.task.as_str();

        let commit = self.latest_commit(repo).await?;
        self.await_build(repo, &commit, cancel).await;
        let commit = self.latest_commit(repo).await?;

        let notification = EvaluatorNotification {
            email: request.email.clone(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: self.host.repo_url(repo),
            commit_sha: commit,
            pages_url: self.host.pages_url(repo),
        };

        self.notifier
            .notify(&request.evaluation_url, &notification)
            .await?;

        Ok(notification)
    }
}
