//! Generation collaborator
//!
//! A [`SiteGenerator`] turns a brief into a two-file bundle, or revises an
//! existing bundle. Replies arrive as free text that may be wrapped in a
//! markdown fence; [`parse_bundle`] extracts and decodes the JSON array
//! inside.

pub mod openai;
mod prompts;

pub use openai::OpenAIGenerator;

use async_trait::async_trait;
use sdk::types::{Bundle, GeneratedFile};
use serde::{Deserialize, Serialize};

/// Result type for generation operations
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Errors that can occur while generating a bundle
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// An uploaded attachment as the generator should reference it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Name the attachment was submitted under
    pub filename: String,
    /// Path relative to the published site
    pub url: String,
}

/// Inputs shared by `generate` and `modify`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub brief: String,
    /// Evaluation checks, one per line
    pub checks: String,
    pub attachments: Vec<AttachmentRef>,
}

#[async_trait]
pub trait SiteGenerator: Send + Sync {
    /// Verify the service accepts our credentials
    async fn check_health(&self) -> Result<()>;

    /// Produce a fresh README.md and index.html
    async fn generate(&self, request: &GenerationRequest) -> Result<Bundle>;

    /// Revise `current` to satisfy the new brief, keeping its filenames
    async fn modify(&self, request: &GenerationRequest, current: &[GeneratedFile])
        -> Result<Bundle>;
}

/// Strip a byte-order mark and an optional code fence from a reply.
///
/// A leading fence may carry a language tag on its first line; everything
/// from the last closing fence onward is dropped. Replies that open with
/// prose fall back to the first fenced block.
pub fn extract_reply(raw: &str) -> &str {
    let s = raw.trim_start_matches('\u{feff}').trim();

    if let Some(after) = s.strip_prefix("```") {
        let body = match after.find('\n') {
            Some(nl) if is_language_tag(&after[..nl]) => &after[nl + 1..],
            _ => after,
        };
        let body = match body.rfind("```") {
            Some(end) => &body[..end],
            None => body,
        };
        return body.trim();
    }

    if !s.starts_with('[') {
        if let Some(fenced) = extract_fenced(s) {
            return fenced.trim();
        }
    }

    s
}

fn is_language_tag(line: &str) -> bool {
    let tag = line.trim();
    tag.is_empty()
        || tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn extract_fenced(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];
    let body_start = fence_start + 3 + after_opening.find('\n')? + 1;
    let closing = content[body_start..].find("```")?;
    Some(&content[body_start..body_start + closing])
}

/// Decode a generator reply into typed files
pub fn parse_bundle(raw: &str) -> Result<Bundle> {
    let clean = extract_reply(raw);
    serde_json::from_str::<Vec<GeneratedFile>>(clean).map_err(|e| {
        tracing::debug!(reply = raw, "Undecodable generation reply");
        GenerationError::ParseError(format!("reply is not a JSON array of files: {}", e))
    })
}
