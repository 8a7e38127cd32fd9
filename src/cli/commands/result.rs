//! Results page: the log of past crew runs.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::id_resolver::resolve_id;
use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::StudioContext;
use crate::domain::models::{CrewResult, EntityKind};

#[derive(Args, Debug)]
pub struct ResultArgs {
    #[command(subcommand)]
    pub command: ResultCommands,
}

#[derive(Subcommand, Debug)]
pub enum ResultCommands {
    /// List results, newest first
    List {
        /// Only results of this crew ID (or unique prefix)
        #[arg(short, long)]
        crew: Option<String>,
        /// Maximum number of results to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show one result in full
    Show {
        /// Result ID (or unique prefix)
        id: String,
    },
    /// Record the output of a crew run
    Add {
        /// Crew ID (or unique prefix)
        crew: String,
        /// Output; parsed as JSON when possible, stored as text otherwise
        output: String,
        /// Input the run was started with (format: "key=value")
        #[arg(short, long = "input")]
        inputs: Vec<String>,
    },
    /// Delete a result
    Delete {
        /// Result ID (or unique prefix)
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct ResultDetailOutput {
    #[serde(flatten)]
    pub result: CrewResult,
}

impl CommandOutput for ResultDetailOutput {
    fn to_human(&self) -> String {
        let r = &self.result;
        let crew = match r.crew_id {
            Some(id) => format!("{} ({id})", r.crew_name),
            None => format!("{} (deleted)", r.crew_name),
        };
        let mut lines = vec![
            format!("Result: {}", r.id),
            format!("  Crew:    {crew}"),
            format!("  Created: {}", r.created_at.to_rfc3339()),
        ];
        if !r.inputs.is_empty() {
            lines.push("  Inputs:".to_string());
            for (key, value) in &r.inputs {
                lines.push(format!("    {key} = {value}"));
            }
        }
        let body = r
            .raw_output()
            .map_or_else(|| serde_json::to_string_pretty(&r.result).unwrap_or_default(), str::to_string);
        lines.push(String::new());
        lines.push(body);
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ResultListOutput {
    pub results: Vec<CrewResult>,
    pub total: usize,
}

impl CommandOutput for ResultListOutput {
    fn to_human(&self) -> String {
        if self.results.is_empty() {
            return "No results yet.".to_string();
        }
        format!(
            "{}\nShowing {} of {} result(s)",
            TableFormatter::new().format_results(&self.results),
            self.results.len(),
            self.total
        )
    }
}

pub async fn execute(args: ResultArgs, ctx: &StudioContext, json_mode: bool) -> Result<()> {
    let results = &ctx.repos.results;

    match args.command {
        ResultCommands::List { crew, limit } => {
            let mut list = results.list().await?;
            if let Some(crew) = crew {
                let crew_id = resolve_id(ctx.pool().await?, EntityKind::Crew, &crew).await?;
                list.retain(|r| r.crew_id == Some(crew_id));
            }
            let total = list.len();
            list.truncate(limit);
            output(&ResultListOutput { results: list, total }, json_mode);
        }

        ResultCommands::Show { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Result, &id).await?;
            let result = results.get(id).await?;
            output(&ResultDetailOutput { result }, json_mode);
        }

        ResultCommands::Add { crew, output: raw, inputs } => {
            let crew_id = resolve_id(ctx.pool().await?, EntityKind::Crew, &crew).await?;
            let crew = ctx.repos.crews.get(crew_id).await?;
            let payload = serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw));

            let mut result = CrewResult::new(crew.id, crew.name, payload);
            for pair in &inputs {
                let (key, value) = pair
                    .split_once('=')
                    .with_context(|| format!("Expected key=value, got '{pair}'"))?;
                result = result.with_input(key.trim(), value);
            }
            let id = results.create(&result).await?;
            output(&ActionOutput::done(format!("Result recorded: {id}"), id), json_mode);
        }

        ResultCommands::Delete { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Result, &id).await?;
            results.delete(id).await?;
            output(&ActionOutput::done(format!("Result deleted: {id}"), id), json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::Engine;
    use crate::domain::models::{Crew, Settings};

    #[tokio::test]
    async fn test_add_records_text_output_and_inputs() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let crew = Crew::new("research-crew");
        ctx.repos.crews.create(&crew).await.unwrap();

        let add = ResultCommands::Add {
            crew: crew.id.to_string(),
            output: "42 facts".to_string(),
            inputs: vec!["topic=rust".to_string()],
        };
        execute(ResultArgs { command: add }, &ctx, true).await.unwrap();

        let stored = ctx.repos.results.list().await.unwrap();
        assert_eq!(stored[0].raw_output(), Some("42 facts"));
        assert_eq!(stored[0].inputs["topic"], "rust");
        assert_eq!(stored[0].crew_name, "research-crew");
    }
}
