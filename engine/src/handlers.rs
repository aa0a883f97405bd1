//! Command handlers for CLI operations
//!
//! - serve: run the service until interrupted
//! - check: verify credentials against both backing services
//! - validate: check a README and index page as a bundle
//! - secret set: store a credential in the keychain

use anyhow::{bail, Context, Result};
use std::io::BufRead;
use std::path::Path;

use crate::bundle::{self, BundleViolation};
use crate::config::Config;
use crate::daemon::{Components, DaemonManager};
use crate::secrets::{Credentials, SecretKey, SecretManager, SERVICE_NAME};
use sdk::types::{GeneratedFile, INDEX_FILENAME, README_FILENAME};

/// Run the ingress and worker pool until SIGTERM or Ctrl-C
pub async fn handle_serve(config: Config) -> Result<()> {
    let credentials = Credentials::load(&SecretManager::new(SERVICE_NAME))
        .context("Failed to resolve credentials")?;

    tracing::info!(
        bind = %config.server.bind,
        port = config.server.port,
        workers = config.queue.workers,
        capacity = config.queue.capacity,
        "Starting service"
    );

    DaemonManager::new(config).run(credentials).await?;
    Ok(())
}

/// Verify hosting and generation credentials without serving
pub async fn handle_check(config: &Config) -> Result<()> {
    let credentials = Credentials::load(&SecretManager::new(SERVICE_NAME))
        .context("Failed to resolve credentials")?;
    let components = Components::from_config(config, credentials)?;

    DaemonManager::check_collaborators(components.host.as_ref(), components.generator.as_ref())
        .await?;

    println!("Hosting:    ok ({})", config.github.owner);
    println!("Generation: ok ({})", config.openai.model);
    Ok(())
}

/// Load two files from disk as a README/index bundle and validate it
pub fn bundle_violations(readme: &Path, index: &Path) -> Result<Vec<BundleViolation>> {
    let readme_content = std::fs::read_to_string(readme)
        .with_context(|| format!("Failed to read {}", readme.display()))?;
    let index_content = std::fs::read_to_string(index)
        .with_context(|| format!("Failed to read {}", index.display()))?;

    let files = vec![
        GeneratedFile::markdown(README_FILENAME, readme_content),
        GeneratedFile::html(INDEX_FILENAME, index_content),
    ];
    Ok(bundle::validate(&files))
}

/// Validate a bundle and report every violation
pub fn handle_validate(readme: &Path, index: &Path) -> Result<()> {
    let violations = bundle_violations(readme, index)?;

    if violations.is_empty() {
        println!("Bundle is valid");
        return Ok(());
    }

    for violation in &violations {
        println!("  - {}", violation);
    }
    bail!("bundle has {} violation(s)", violations.len())
}

/// Store one credential in the keychain, reading its value from stdin
pub fn handle_secret_set(key: SecretKey) -> Result<()> {
    let mut value = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut value)
        .context("Failed to read secret from stdin")?;

    let value = value.trim();
    if value.is_empty() {
        bail!("no value provided for {}", key.keychain_key());
    }

    SecretManager::new(SERVICE_NAME).set_secret(key, value)?;
    println!("Stored {}", key.keychain_key());
    Ok(())
}
