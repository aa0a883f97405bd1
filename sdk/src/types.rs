//! Request, bundle and notification types shared by ingress and engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Filename of the markdown half of a bundle
pub const README_FILENAME: &str = "README.md";

/// Filename of the HTML entry point of a bundle
pub const INDEX_FILENAME: &str = "index.html";

/// The exact filename set a bundle is made of, in write order
pub const TRACKED_FILES: [&str; 2] = [README_FILENAME, INDEX_FILENAME];

/// Pipeline phase requested by a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Round {
    /// Round 1: reset the repository and publish a fresh bundle
    Bootstrap,

    /// Round 2: revise the bundle already in the repository
    Revision,
}

impl Round {
    /// Numeric round as it appears on the wire
    pub fn number(self) -> u8 {
        match self {
            Round::Bootstrap => 1,
            Round::Revision => 2,
        }
    }
}

impl TryFrom<u8> for Round {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Round::Bootstrap),
            2 => Ok(Round::Revision),
            other => Err(format!("unsupported round: {}", other)),
        }
    }
}

impl From<Round> for u8 {
    fn from(round: Round) -> Self {
        round.number()
    }
}

impl fmt::Display for Round {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Inline attachment carried by a submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original filename
    pub name: String,

    /// Base64 data URL holding the payload
    pub url: String,
}

/// A validated task submission
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRequest {
    pub email: String,
    pub secret: String,
    pub task: String,
    pub round: Round,
    pub nonce: String,
    pub brief: String,

    #[serde(default)]
    pub checks: Vec<String>,

    pub evaluation_url: String,

    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl SiteRequest {
    /// Checks joined into one newline-delimited block
    pub fn joined_checks(&self) -> String {
        self.checks.join("\n")
    }
}

impl fmt::Debug for SiteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteRequest")
            .field("email", &self.email)
            .field("secret", &"[REDACTED]")
            .field("task", &self.task)
            .field("round", &self.round)
            .field("nonce", &self.nonce)
            .field("brief", &self.brief)
            .field("checks", &self.checks)
            .field("evaluation_url", &self.evaluation_url)
            .field("attachments", &self.attachments.len())
            .finish()
    }
}

/// One typed file produced by the generation service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Declared type, expected to be "markdown" or "html"
    #[serde(rename = "type")]
    pub kind: String,

    pub filename: String,

    pub content: String,
}

impl GeneratedFile {
    /// Create a file with an arbitrary declared type
    pub fn new(
        kind: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Create a markdown file
    pub fn markdown(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new("markdown", filename, content)
    }

    /// Create an HTML file
    pub fn html(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new("html", filename, content)
    }
}

/// The two-file artifact produced and consumed per round
pub type Bundle = Vec<GeneratedFile>;

/// Completion report sent to the evaluator once per finished round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorNotification {
    pub email: String,
    pub task: String,
    pub round: Round,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

/// Snapshot of the admission queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub capacity: usize,
    pub len: usize,
    pub workers: usize,
}
