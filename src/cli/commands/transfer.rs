//! Transfer page: export and import the whole configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::output::{output, CommandOutput};
use crate::cli::StudioContext;
use crate::services::TransferSummary;

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[command(subcommand)]
    pub command: TransferCommands,
}

#[derive(Subcommand, Debug)]
pub enum TransferCommands {
    /// Write every entity to a JSON file
    Export {
        #[arg(default_value = "crewai-studio-export.json")]
        path: PathBuf,
    },
    /// Read entities from a JSON file, replacing those with the same id
    Import { path: PathBuf },
}

#[derive(Debug, serde::Serialize)]
pub struct TransferOutput {
    pub action: &'static str,
    pub path: PathBuf,
    pub counts: TransferSummary,
    pub total: usize,
}

impl CommandOutput for TransferOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} {} record(s): {}", self.action, self.total, self.path.display())];
        for (kind, count) in &self.counts {
            lines.push(format!("  {kind}: {count}"));
        }
        lines.join("\n")
    }
}

impl TransferOutput {
    fn new(action: &'static str, path: PathBuf, counts: TransferSummary) -> Self {
        let total = counts.values().sum();
        Self {
            action,
            path,
            counts,
            total,
        }
    }
}

pub async fn execute(args: TransferArgs, ctx: &StudioContext, json_mode: bool) -> Result<()> {
    match args.command {
        TransferCommands::Export { path } => {
            let counts = ctx
                .transfer
                .export_to(&path)
                .await
                .context("Export failed")?;
            output(&TransferOutput::new("Exported", path, counts), json_mode);
        }

        TransferCommands::Import { path } => {
            let counts = ctx
                .transfer
                .import_from(&path)
                .await
                .context("Import failed")?;
            output(&TransferOutput::new("Imported", path, counts), json_mode);
        }
    }

    Ok(())
}
