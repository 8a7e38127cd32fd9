//! Implementation of the `crewai-studio init` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::sqlite::{database_file, initialize_database, Migrator};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Settings;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Database URL to initialize instead of DB_URL
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub database_url: String,
    pub created: bool,
    pub schema_version: i64,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        lines.push(format!("  Database: {}", self.database_url));
        lines.push(format!("  Schema version: {}", self.schema_version));
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, settings: &Settings, json_mode: bool) -> Result<()> {
    let url = args.url.unwrap_or_else(|| settings.database.url.clone());
    let existed = database_file(&url).is_some_and(|path| path.exists());

    let engine = initialize_database(&url)
        .await
        .context("Failed to initialize database")?;
    let schema_version = Migrator::new(engine.pool().clone())
        .get_current_version()
        .await
        .context("Failed to read schema version")?;
    engine.close().await;

    let message = if existed {
        "Database already initialized; schema is up to date".to_string()
    } else {
        "Database created".to_string()
    };
    let out = InitOutput {
        success: true,
        message,
        database_url: url,
        created: !existed,
        schema_version,
    };
    output(&out, json_mode);
    Ok(())
}
