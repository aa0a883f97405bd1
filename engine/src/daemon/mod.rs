//! Service lifecycle
//!
//! The `DaemonManager` wires the collaborators together, verifies them before
//! accepting work, and runs the ingress and worker pool until a shutdown
//! signal arrives.
//!
//! # Startup
//!
//! 1. Build the hosting, generation and evaluator clients from config and
//!    credentials
//! 2. Check hosting and generation connectivity; either failure is fatal
//! 3. Start the worker pool against the root cancellation token
//! 4. Bind the ingress and serve until shutdown
//!
//! # Shutdown
//!
//! SIGTERM or Ctrl-C cancels the root token. The ingress stops accepting
//! connections, workers stop taking jobs and any job in flight is abandoned.
//! Jobs still queued are lost.
//!
//! # Examples
//!
//! ```no_run
//! use pagecraft_engine::config::Config;
//! use pagecraft_engine::daemon::DaemonManager;
//! use pagecraft_engine::secrets::{Credentials, SecretManager, SERVICE_NAME};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! let credentials = Credentials::load(&SecretManager::new(SERVICE_NAME))?;
//! let manager = DaemonManager::new(config);
//! manager.run(credentials).await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::generation::{OpenAIGenerator, SiteGenerator};
use crate::hosting::{GitHubHost, RepoHost};
use crate::notifier::{EvaluatorNotifier, Notifier};
use crate::orchestrator::{Orchestrator, PipelineSettings};
use crate::queue::{JobQueue, QueueAdmission};
use crate::secrets::{Credentials, SecretString};
use sdk::admission::AdmissionHandle;
use sdk::errors::EngineError;

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// How long workers get to wind down after the ingress stops
const WORKER_GRACE: Duration = Duration::from_secs(5);

/// Collaborators and the ingress secret the service runs with
pub struct Components {
    pub host: Arc<dyn RepoHost>,
    pub generator: Arc<dyn SiteGenerator>,
    pub notifier: Arc<dyn Notifier>,
    pub ingress_secret: SecretString,
}

impl Components {
    /// Build the production collaborators
    pub fn from_config(config: &Config, credentials: Credentials) -> Result<Self> {
        let host = GitHubHost::new(config.github.clone(), credentials.github_token)
            .map_err(|e| EngineError::Config(format!("Failed to build hosting client: {}", e)))?;
        let generator = OpenAIGenerator::new(config.openai.clone(), credentials.openai_api_key)
            .map_err(|e| {
                EngineError::Config(format!("Failed to build generation client: {}", e))
            })?;
        let notifier = EvaluatorNotifier::new(&config.notifier)
            .map_err(|e| EngineError::Config(format!("Failed to build evaluator client: {}", e)))?;

        Ok(Self {
            host: Arc::new(host),
            generator: Arc::new(generator),
            notifier: Arc::new(notifier),
            ingress_secret: credentials.ingress_secret,
        })
    }
}

/// Daemon manager for lifecycle operations
pub struct DaemonManager {
    config: Config,

    /// Root lifetime of the ingress and every worker
    shutdown: CancellationToken,
}

impl DaemonManager {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token cancelled when the service shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Signals the service to shut down
    pub fn signal_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown_signaled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Fail unless both backing services accept our credentials
    pub async fn check_collaborators(
        host: &dyn RepoHost,
        generator: &dyn SiteGenerator,
    ) -> Result<()> {
        host.check_connectivity()
            .await
            .map_err(|e| EngineError::Startup {
                collaborator: "hosting".to_string(),
                reason: e.to_string(),
            })?;
        tracing::info!("Hosting connectivity verified");

        generator
            .check_health()
            .await
            .map_err(|e| EngineError::Startup {
                collaborator: "generation".to_string(),
                reason: e.to_string(),
            })?;
        tracing::info!("Generation service verified");

        Ok(())
    }

    /// Build the production collaborators, check them and serve
    pub async fn run(&self, credentials: Credentials) -> Result<()> {
        let components = Components::from_config(&self.config, credentials)?;
        Self::check_collaborators(components.host.as_ref(), components.generator.as_ref())
            .await?;

        let addr = self.bind_addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| EngineError::Network(format!("Failed to bind to {}: {}", addr, e)))?;

        let _signal_handle = Self::setup_signal_handler(self.shutdown.clone());
        self.serve(components, listener).await
    }

    /// Run the worker pool and the ingress on `listener` until shutdown
    pub async fn serve(
        &self,
        components: Components,
        listener: tokio::net::TcpListener,
    ) -> Result<()> {
        let queue = Arc::new(JobQueue::from_config(&self.config.queue));
        let orchestrator = Arc::new(Orchestrator::new(
            components.host,
            components.generator,
            components.notifier,
            PipelineSettings::from_config(&self.config),
        ));
        let workers = queue.start(self.shutdown.clone(), orchestrator);

        let admission = AdmissionHandle::new(Arc::new(QueueAdmission::new(
            Arc::clone(&queue),
            components.ingress_secret,
        )));
        let app = api_server::router(
            admission,
            api_server::ServerOptions {
                enqueue_timeout: self.config.server.enqueue_timeout(),
            },
        );

        let result = api_server::serve(listener, app, self.shutdown.clone().cancelled_owned()).await;

        // the ingress can also stop on its own error
        self.signal_shutdown();
        Self::join_workers(workers).await;

        tracing::info!("Shutdown complete");
        result
    }

    async fn join_workers(workers: Vec<JoinHandle<()>>) {
        let joined = tokio::time::timeout(WORKER_GRACE, futures::future::join_all(workers)).await;
        match joined {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!("Worker task failed: {}", e);
                    }
                }
            }
            Err(_) => tracing::warn!("Workers did not stop within {:?}", WORKER_GRACE),
        }
    }

    /// Address the ingress will bind to
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.server.bind, self.config.server.port)
            .parse()
            .map_err(|e| EngineError::Config(format!("Invalid bind address: {}", e)))
    }

    /// Cancel `token` on SIGTERM or Ctrl-C
    #[cfg(unix)]
    pub fn setup_signal_handler(token: CancellationToken) -> JoinHandle<()> {
        use tokio::signal::unix::{signal, SignalKind};

        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("Received Ctrl-C");
                        token.cancel();
                    }
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl-C"),
                _ = token.cancelled() => return,
            }
            token.cancel();
        })
    }

    /// Cancel `token` on Ctrl-C
    #[cfg(windows)]
    pub fn setup_signal_handler(token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received Ctrl-C");
                    token.cancel();
                }
                _ = token.cancelled() => {}
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_toml_str(
            r#"
[server]
bind = "127.0.0.1"
port = 9123

[github]
owner = "acme"
committer_name = "Acme Bot"
committer_email = "bot@acme.dev"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_bind_addr() {
        let manager = DaemonManager::new(config());
        assert_eq!(manager.bind_addr().unwrap().port(), 9123);
    }

    #[test]
    fn test_signal_shutdown() {
        let manager = DaemonManager::new(config());
        let token = manager.shutdown_token();
        assert!(!manager.is_shutdown_signaled());
        manager.signal_shutdown();
        assert!(manager.is_shutdown_signaled());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_handler_exits_on_cancel() {
        let token = CancellationToken::new();
        let handle = DaemonManager::setup_signal_handler(token.clone());
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
