//! Repository hosting collaborator
//!
//! The pipeline talks to the hosting service only through [`RepoHost`].
//! File writes are guarded by a [`VersionToken`] captured at read time, and a
//! write whose token is stale fails with [`HostError::VersionConflict`].

pub mod github;

pub use github::GitHubHost;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors returned by a hosting collaborator
#[derive(Debug, Error)]
pub enum HostError {
    #[error("version conflict on {path}: the file changed since it was read")]
    VersionConflict { path: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("hosting unavailable: {0}")]
    Unavailable(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("hosting API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Opaque token authorizing a write against the state it was read from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file read from a repository together with its version token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFileHandle {
    pub filename: String,
    pub version_token: VersionToken,
    pub content: String,
}

/// Minimal view of a repository listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSummary {
    pub name: String,
}

/// One static-page build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBuild {
    pub status: String,
    #[serde(default)]
    pub commit: String,
}

impl PageBuild {
    /// Status string the hosting service uses for a finished build
    pub const BUILT: &'static str = "built";

    pub fn is_built_for(&self, commit: &str) -> bool {
        self.status == Self::BUILT && self.commit == commit
    }
}

/// Operations the pipeline needs from a repository host
#[async_trait]
pub trait RepoHost: Send + Sync {
    /// Fail unless the host is reachable with the configured credentials
    async fn check_connectivity(&self) -> Result<(), HostError>;

    /// Repositories owned by the configured account
    async fn list_repositories(&self) -> Result<Vec<RepoSummary>, HostError>;

    /// Create an empty public repository
    async fn create_repository(&self, name: &str) -> Result<(), HostError>;

    async fn delete_repository(&self, name: &str) -> Result<(), HostError>;

    /// Create a new file; fails if `path` already exists
    async fn create_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), HostError>;

    /// Read a text file and the token needed to overwrite it
    async fn read_file(&self, repo: &str, path: &str) -> Result<RepoFileHandle, HostError>;

    /// Overwrite a file; fails with `VersionConflict` if `token` is stale
    async fn update_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
        token: &VersionToken,
    ) -> Result<(), HostError>;

    /// Serve the repository's default branch as a static site
    async fn enable_pages(&self, repo: &str) -> Result<(), HostError>;

    /// Hash of the newest commit on the default branch
    async fn latest_commit(&self, repo: &str) -> Result<String, HostError>;

    /// Static-page builds, newest first
    async fn page_builds(&self, repo: &str) -> Result<Vec<PageBuild>, HostError>;

    /// Browser URL of the repository
    fn repo_url(&self, repo: &str) -> String;

    /// Public URL of the published site
    fn pages_url(&self, repo: &str) -> String;
}
