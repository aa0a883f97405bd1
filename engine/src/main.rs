// Pagecraft
// Main entry point for the pagecraft binary

use clap::Parser;
use pagecraft_engine::cli::{Cli, Command, SecretAction};
use pagecraft_engine::config::Config;
use pagecraft_engine::handlers::{handle_check, handle_secret_set, handle_serve, handle_validate};
use pagecraft_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Credentials may live in a local .env file
    dotenvy::dotenv().ok();

    // Validation runs without a config file
    if let Command::Validate { readme, index } = cli.command() {
        init_telemetry_with_level(cli.log.as_deref().unwrap_or("warn"));
        return handle_validate(readme, index);
    }

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over config; RUST_LOG wins over both
    let log_level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(log_level);

    tracing::info!(
        "Pagecraft v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match cli.command() {
        Command::Serve => handle_serve(config).await,
        Command::Check => handle_check(&config).await,
        Command::Secret {
            action: SecretAction::Set { name },
        } => handle_secret_set((*name).into()),
        Command::Validate { .. } => Ok(()),
    }
}
