use super::{Orchestrator, PipelineError};
use crate::bundle;
use crate::generation::GenerationRequest;
use crate::hosting::VersionToken;
use sdk::types::{EvaluatorNotification, GeneratedFile, SiteRequest, INDEX_FILENAME, TRACKED_FILES};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

impl Orchestrator {
    /// Round 2: revise the published bundle in place
    pub(super) async fn revise(
        &self,
        request: &SiteRequest,
        cancel: &CancellationToken,
    ) -> Result<EvaluatorNotification, PipelineError> {
        let repo = request.task.as_str();

        let mut tokens = HashMap::new();
        let mut current = Vec::with_capacity(TRACKED_FILES.len());
        for filename in TRACKED_FILES {
            let handle = self
                .host
                .read_file(repo, filename)
                .await
                .map_err(PipelineError::hosting(format!("read {}", filename)))?;

            let kind = if filename == INDEX_FILENAME { "html" } else { "markdown" };
            current.push(GeneratedFile::new(kind, filename, handle.content));
            tokens.insert(handle.filename, handle.version_token);
        }

        let attachments = self.upload_attachments(repo, &request.attachments).await?;

        let generation = GenerationRequest {
            brief: request.brief.clone(),
            checks: request.joined_checks(),
            attachments,
        };
        let files = self.generator.modify(&generation, &current).await?;

        let violations = bundle::validate(&files);
        if !violations.is_empty() {
            for violation in &violations {
                tracing::warn!(repo, %violation, "Revised bundle violation");
            }
            return Err(PipelineError::InvalidBundle(violations));
        }

        self.apply_revision(repo, &files, &tokens).await?;

        self.publish_and_notify(request, cancel).await
    }

    /// Write `files` back using the tokens captured when they were read.
    ///
    /// Every filename is checked against `tokens` before the first write, so
    /// an unknown file leaves the repository untouched. A stale token aborts
    /// the remaining writes with [`PipelineError::Conflict`].
    pub async fn apply_revision(
        &self,
        repo: &str,
        files: &[GeneratedFile],
        tokens: &HashMap<String, VersionToken>,
    ) -> Result<(), PipelineError> {
        if let Some(unknown) = files.iter().find(|f| !tokens.contains_key(&f.filename)) {
            return Err(PipelineError::UnexpectedFile(unknown.filename.clone()));
        }

        let ordered = TRACKED_FILES
            .iter()
            .filter_map(|name| files.iter().find(|f| f.filename == *name));

        for file in ordered {
            let Some(token) = tokens.get(&file.filename) else {
                return Err(PipelineError::UnexpectedFile(file.filename.clone()));
            };
            self.host
                .update_file(
                    repo,
                    &file.filename,
                    file.content.as_bytes(),
                    &format!("chore: update {} for round 2", file.filename),
                    token,
                )
                .await
                .map_err(PipelineError::hosting(format!("update {}", file.filename)))?;

            tracing::debug!(repo, file = %file.filename, "Updated file");
        }

        Ok(())
    }
}
