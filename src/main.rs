//! CrewAI Studio CLI entry point.

use clap::Parser;
use tracing::error;

use crewai_studio::cli::{Cli, StudioContext};
use crewai_studio::infrastructure::config::SettingsLoader;
use crewai_studio::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    // A missing .env file is normal; the process environment still applies.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let loader = SettingsLoader::from_env();
    let settings = match loader.load() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("Configuration error: {err}");
            std::process::exit(2);
        }
    };

    let _logger = match LoggerImpl::init(&settings.logging, settings.database.echo) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("Failed to initialize logging: {err:#}");
            std::process::exit(2);
        }
    };

    let ctx = match StudioContext::build(settings).await {
        Ok(ctx) => ctx,
        Err(err) => {
            error!(error = %format!("{err:#}"), "database unavailable");
            crewai_studio::cli::handle_error(err, cli.json);
        }
    };

    if let Err(err) = crewai_studio::cli::dispatch(cli.command, &ctx, cli.json).await {
        crewai_studio::cli::handle_error(err, cli.json);
    }
}
