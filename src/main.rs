//! # guildkeeper entry point
//!
//! Loads configuration, installs tracing and runs either the long-lived
//! service or a single compliance pass.

use anyhow::Result;
use clap::{Parser, Subcommand};
use guildkeeper::{config::ConfigLoader, runtime, telemetry};

#[derive(Debug, Parser)]
#[command(name = "guildkeeper", version, about = "Guild compliance and weather alerting")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the monitors and the operator API (default)
    Run,
    /// Run one compliance enforcement pass, print the report and exit
    EnforceOnce,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new().load()?;
    telemetry::init_tracing(&config)?;

    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => runtime::run(config).await,
        Command::EnforceOnce => {
            let report = runtime::enforce_once(config).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
