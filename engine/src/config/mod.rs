//! Configuration management
//!
//! This module handles loading, validation, and management of the Pagecraft
//! configuration. Configuration is stored in TOML format at
//! ~/.pagecraft/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: log level
//! - **server**: ingress bind address, port and admission timeout
//! - **queue**: queue capacity, worker count and per-job deadline
//! - **github**: hosting API location, repository owner and committer identity
//! - **openai**: generation API location, model and request timeout
//! - **pipeline**: page build polling parameters
//! - **notifier**: evaluator delivery retry parameters
//!
//! Secrets (ingress shared secret, hosting token, generation key) are never
//! read from this file. See [`crate::secrets`].
//!
//! # Examples
//!
//! ```no_run
//! use pagecraft_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Workers: {}", config.queue.workers);
//! println!("Model: {}", config.openai.model);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Ingress server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Admission queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Repository hosting settings
    pub github: GitHubConfig,

    /// Generation service settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Pipeline timing settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Evaluator delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Ingress server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long a submission may wait for a queue slot
    #[serde(default = "default_enqueue_timeout_ms")]
    pub enqueue_timeout_ms: u64,
}

/// Admission queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of buffered jobs
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Number of workers draining the queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound on one pipeline run
    #[serde(default = "default_job_deadline_secs")]
    pub job_deadline_secs: u64,
}

/// Repository hosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Base URL of the REST API
    #[serde(default = "default_github_api_base_url")]
    pub api_base_url: String,

    /// Account that owns every task repository
    pub owner: String,

    /// Name recorded on commits and in the license
    pub committer_name: String,

    /// Email recorded on commits and in the license
    pub committer_email: String,

    /// Value of the `X-GitHub-Api-Version` header
    #[serde(default = "default_github_api_version")]
    pub api_version: String,

    /// Branch served by static-page hosting
    #[serde(default = "default_pages_branch")]
    pub pages_branch: String,

    /// Client-level timeout for every hosting call
    #[serde(default = "default_github_timeout_secs")]
    pub request_timeout_secs: u64,
    // Note: token comes from GITHUB_TOKEN or the keychain, not from config
}

/// Generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for OpenAI API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Timeout for a single generation request
    #[serde(default = "default_openai_timeout_secs")]
    pub request_timeout_secs: u64,
    // Note: API key comes from OPENAI_API_KEY or the keychain, not from config
}

/// Pipeline timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// How many times to look for a finished page build
    #[serde(default = "default_build_poll_attempts")]
    pub build_poll_attempts: u32,

    /// Pause before each page build lookup
    #[serde(default = "default_build_poll_interval_secs")]
    pub build_poll_interval_secs: u64,
}

/// Evaluator delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Total delivery attempts
    #[serde(default = "default_notifier_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt, doubled after each failure
    #[serde(default = "default_notifier_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Timeout for a single delivery attempt
    #[serde(default = "default_notifier_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            workers: default_workers(),
            job_deadline_secs: default_job_deadline_secs(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            request_timeout_secs: default_openai_timeout_secs(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            build_poll_attempts: default_build_poll_attempts(),
            build_poll_interval_secs: default_build_poll_interval_secs(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_notifier_attempts(),
            base_delay_ms: default_notifier_base_delay_ms(),
            request_timeout_secs: default_notifier_timeout_secs(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_enqueue_timeout_ms() -> u64 {
    200
}

fn default_capacity() -> usize {
    100
}

fn default_workers() -> usize {
    3
}

fn default_job_deadline_secs() -> u64 {
    300
}

fn default_github_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_api_version() -> String {
    "2022-11-28".to_string()
}

fn default_pages_branch() -> String {
    "main".to_string()
}

fn default_github_timeout_secs() -> u64 {
    10
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-5-mini".to_string()
}

fn default_openai_timeout_secs() -> u64 {
    320
}

fn default_build_poll_attempts() -> u32 {
    24
}

fn default_build_poll_interval_secs() -> u64 {
    5
}

fn default_notifier_attempts() -> u32 {
    5
}

fn default_notifier_base_delay_ms() -> u64 {
    2000
}

fn default_notifier_timeout_secs() -> u64 {
    10
}

impl ServerConfig {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

impl QueueConfig {
    pub fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.job_deadline_secs)
    }
}

impl PipelineConfig {
    pub fn build_poll_interval(&self) -> Duration {
        Duration::from_secs(self.build_poll_interval_secs)
    }
}

impl NotifierConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl Config {
    /// Load configuration from the default location (~/.pagecraft/config.toml)
    ///
    /// If the configuration file doesn't exist, a template is written there
    /// and an error asks the operator to fill in the hosting identity, which
    /// has no sensible default.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or written
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::write_template(&config_path)?;
            Err(EngineError::Config(format!(
                "Created a configuration template at {}. Fill in the [github] section and restart",
                config_path.display()
            )))
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Write a configuration template with placeholder hosting identity
    fn write_template(path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(&Self::template())
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get the default configuration file path (~/.pagecraft/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".pagecraft").join("config.toml"))
    }

    /// Configuration with every default and an empty hosting identity
    fn template() -> Self {
        Self {
            core: CoreConfig::default(),
            server: ServerConfig::default(),
            queue: QueueConfig::default(),
            github: GitHubConfig {
                api_base_url: default_github_api_base_url(),
                owner: String::new(),
                committer_name: String::new(),
                committer_email: String::new(),
                api_version: default_github_api_version(),
                pages_branch: default_pages_branch(),
                request_timeout_secs: default_github_timeout_secs(),
            },
            openai: OpenAIConfig::default(),
            pipeline: PipelineConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error if a value is out of range or a required field is
    /// empty.
    fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.queue.capacity == 0 {
            return Err(EngineError::Config(
                "queue.capacity must be at least 1".to_string(),
            ));
        }
        if self.queue.workers == 0 {
            return Err(EngineError::Config(
                "queue.workers must be at least 1".to_string(),
            ));
        }
        if self.queue.job_deadline_secs == 0 {
            return Err(EngineError::Config(
                "queue.job_deadline_secs must be at least 1".to_string(),
            ));
        }

        let required = [
            ("github.api_base_url", &self.github.api_base_url),
            ("github.owner", &self.github.owner),
            ("github.committer_name", &self.github.committer_name),
            ("github.committer_email", &self.github.committer_email),
            ("github.pages_branch", &self.github.pages_branch),
            ("openai.base_url", &self.openai.base_url),
            ("openai.model", &self.openai.model),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(EngineError::Config(format!("{} must not be empty", key)));
            }
        }

        if self.pipeline.build_poll_attempts == 0 {
            return Err(EngineError::Config(
                "pipeline.build_poll_attempts must be at least 1".to_string(),
            ));
        }
        if self.notifier.max_attempts == 0 {
            return Err(EngineError::Config(
                "notifier.max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
