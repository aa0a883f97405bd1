//! Bundle validation
//!
//! A bundle is exactly two files: `README.md` declared as markdown and
//! `index.html` declared as html, both non-empty and parseable. `validate`
//! reports every problem it finds rather than stopping at the first one.

pub mod syntax;

use sdk::types::{GeneratedFile, INDEX_FILENAME, README_FILENAME};
use std::fmt;

/// Number of files every bundle carries
pub const BUNDLE_SIZE: usize = 2;

/// One reason a bundle is unacceptable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleViolation {
    /// The bundle does not hold exactly two files
    FileCount { found: usize },
    /// A required filename is absent
    MissingFile { filename: String },
    /// A file outside the required set
    UnexpectedFile { filename: String },
    /// A required file declares the wrong type
    WrongType {
        filename: String,
        expected: &'static str,
        found: String,
    },
    /// A required file is blank
    EmptyContent { filename: String },
    /// A required file does not parse
    Unparseable { filename: String, reason: String },
}

impl fmt::Display for BundleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileCount { found } => {
                write!(f, "expected {} files, found {}", BUNDLE_SIZE, found)
            }
            Self::MissingFile { filename } => write!(f, "missing {}", filename),
            Self::UnexpectedFile { filename } => write!(f, "unexpected file {}", filename),
            Self::WrongType {
                filename,
                expected,
                found,
            } => write!(
                f,
                "{} must be declared as {}, found '{}'",
                filename, expected, found
            ),
            Self::EmptyContent { filename } => write!(f, "{} is empty", filename),
            Self::Unparseable { filename, reason } => {
                write!(f, "{} does not parse: {}", filename, reason)
            }
        }
    }
}

/// Join violations for a single log line or error message
pub fn describe(violations: &[BundleViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

struct Requirement {
    filename: &'static str,
    kind: &'static str,
    parse: fn(&str) -> Result<(), syntax::SyntaxError>,
}

fn check_markdown(source: &str) -> Result<(), syntax::SyntaxError> {
    syntax::parse_markdown(source).map(|_| ())
}

fn check_html(source: &str) -> Result<(), syntax::SyntaxError> {
    syntax::parse_html(source).map(|_| ())
}

const REQUIREMENTS: [Requirement; 2] = [
    Requirement {
        filename: README_FILENAME,
        kind: "markdown",
        parse: check_markdown,
    },
    Requirement {
        filename: INDEX_FILENAME,
        kind: "html",
        parse: check_html,
    },
];

/// Check a bundle; an empty result means it is valid
pub fn validate(files: &[GeneratedFile]) -> Vec<BundleViolation> {
    let mut violations = Vec::new();

    if files.len() != BUNDLE_SIZE {
        violations.push(BundleViolation::FileCount { found: files.len() });
    }

    for file in files {
        if !REQUIREMENTS.iter().any(|r| r.filename == file.filename) {
            violations.push(BundleViolation::UnexpectedFile {
                filename: file.filename.clone(),
            });
        }
    }

    for requirement in &REQUIREMENTS {
        let Some(file) = files.iter().find(|f| f.filename == requirement.filename) else {
            violations.push(BundleViolation::MissingFile {
                filename: requirement.filename.to_string(),
            });
            continue;
        };

        if !file.kind.eq_ignore_ascii_case(requirement.kind) {
            violations.push(BundleViolation::WrongType {
                filename: file.filename.clone(),
                expected: requirement.kind,
                found: file.kind.clone(),
            });
        }

        if file.content.trim().is_empty() {
            violations.push(BundleViolation::EmptyContent {
                filename: file.filename.clone(),
            });
            continue;
        }

        if let Err(e) = (requirement.parse)(&file.content) {
            violations.push(BundleViolation::Unparseable {
                filename: file.filename.clone(),
                reason: e.to_string(),
            });
        }
    }

    violations
}
