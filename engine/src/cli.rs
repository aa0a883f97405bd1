//! CLI interface for Pagecraft
//!
//! This module provides the command-line interface using clap's derive API.

use crate::secrets::SecretKey;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pagecraft site service
///
/// Admits site-building submissions over HTTP and publishes the generated
/// pages to GitHub.
#[derive(Parser, Debug)]
#[command(name = "pagecraft")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Defaults to `serve`
    #[command(subcommand)]
    pub command: Option<Command>,
}

static DEFAULT_COMMAND: Command = Command::Serve;

impl Cli {
    /// The requested command, or `serve` when none was given
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&DEFAULT_COMMAND)
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the ingress and worker pool until interrupted
    Serve,

    /// Verify hosting and generation credentials, then exit
    Check,

    /// Validate a README and index page as a site bundle
    Validate {
        /// Markdown file published as README.md
        readme: PathBuf,

        /// HTML file published as index.html
        index: PathBuf,
    },

    /// Manage stored credentials
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum SecretAction {
    /// Store a credential in the OS keychain, reading the value from stdin
    Set {
        #[arg(value_enum)]
        name: SecretName,
    },
}

/// Credential names accepted on the command line
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecretName {
    IngressSecret,
    GithubToken,
    OpenaiApiKey,
}

impl From<SecretName> for SecretKey {
    fn from(name: SecretName) -> Self {
        match name {
            SecretName::IngressSecret => SecretKey::IngressSecret,
            SecretName::GithubToken => SecretKey::GitHubToken,
            SecretName::OpenaiApiKey => SecretKey::OpenAIApiKey,
        }
    }
}
