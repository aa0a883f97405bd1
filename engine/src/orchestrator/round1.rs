use super::{mit_license, Orchestrator, PipelineError};
use crate::bundle;
use crate::generation::GenerationRequest;
use chrono::Datelike;
use sdk::types::{EvaluatorNotification, SiteRequest, TRACKED_FILES};
use tokio_util::sync::CancellationToken;

const LICENSE_PATH: &str = "LICENSE";

impl Orchestrator {
    /// Round 1: reset the repository and publish a freshly generated bundle
    pub(super) async fn bootstrap(
        &self,
        request: &SiteRequest,
        cancel: &CancellationToken,
    ) -> Result<EvaluatorNotification, PipelineError> {
        let repo = request.task.as_str();

        self.host
            .check_connectivity()
            .await
            .map_err(PipelineError::Unreachable)?;

        let existing = self
            .host
            .list_repositories()
            .await
            .map_err(PipelineError::hosting("list repositories"))?;

        if existing.iter().any(|r| r.name == repo) {
            tracing::info!(repo, "Repository exists, deleting before bootstrap");
            self.host
                .delete_repository(repo)
                .await
                .map_err(PipelineError::hosting("delete repository"))?;
        }

        self.host
            .create_repository(repo)
            .await
            .map_err(PipelineError::hosting("create repository"))?;

        let license = mit_license(chrono::Utc::now().year(), &self.settings.license_holder);
        self.host
            .create_file(repo, LICENSE_PATH, license.as_bytes(), "init: add license")
            .await
            .map_err(PipelineError::hosting("add license"))?;

        self.host
            .enable_pages(repo)
            .await
            .map_err(PipelineError::hosting("enable pages"))?;

        let attachments = self.upload_attachments(repo, &request.attachments).await?;

        let generation = GenerationRequest {
            brief: request.brief.clone(),
            checks: request.joined_checks(),
            attachments,
        };
        let files = self.generator.generate(&generation).await?;

        let violations = bundle::validate(&files);
        if !violations.is_empty() {
            for violation in &violations {
                tracing::warn!(repo, %violation, "Generated bundle violation");
            }
            return Err(PipelineError::InvalidBundle(violations));
        }

        for filename in TRACKED_FILES {
            let Some(file) = files.iter().find(|f| f.filename == filename) else {
                continue;
            };
            self.host
                .create_file(
                    repo,
                    &file.filename,
                    file.content.as_bytes(),
                    &format!("feat: add {}", file.filename),
                )
                .await
                .map_err(PipelineError::hosting(format!("commit {}", file.filename)))?;
        }

        self.publish_and_notify(request, cancel).await
    }
}
