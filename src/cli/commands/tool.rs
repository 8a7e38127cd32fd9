//! Tools page.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde_json::Value;

use super::parse_key_values;
use crate::cli::id_resolver::resolve_id;
use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::StudioContext;
use crate::domain::models::{EntityKind, Tool};

#[derive(Args, Debug)]
pub struct ToolArgs {
    #[command(subcommand)]
    pub command: ToolCommands,
}

#[derive(Subcommand, Debug)]
pub enum ToolCommands {
    /// List configured tools
    List,
    /// Show tool details
    Show {
        /// Tool ID (or unique prefix)
        id: String,
    },
    /// Add a tool
    Add {
        /// Tool class name, e.g. SerperDevTool
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Constructor parameter (format: "key=value")
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Update a tool
    Update {
        /// Tool ID (or unique prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Parameter to set (format: "key=value")
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Drop all existing parameters first
        #[arg(long)]
        clear_params: bool,
    },
    /// Delete a tool that no agent uses
    Delete {
        /// Tool ID (or unique prefix)
        id: String,
    },
    /// Enable a tool class
    Enable { name: String },
    /// Disable a tool class
    Disable { name: String },
}

#[derive(Debug, serde::Serialize)]
pub struct ToolOutput {
    #[serde(flatten)]
    pub tool: Tool,
    pub enabled: bool,
}

impl CommandOutput for ToolOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Tool: {}", self.tool.name),
            format!("  ID:          {}", self.tool.id),
            format!("  Enabled:     {}", if self.enabled { "yes" } else { "no" }),
            format!("  Description: {}", self.tool.description),
            format!("  Created:     {}", self.tool.created_at.to_rfc3339()),
        ];
        if !self.tool.parameters.is_empty() {
            lines.push("  Parameters:".to_string());
            for (key, value) in &self.tool.parameters {
                lines.push(format!("    {key} = {}", display_value(value)));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ToolListOutput {
    pub tools: Vec<Tool>,
    pub states: BTreeMap<String, bool>,
    pub total: usize,
}

impl CommandOutput for ToolListOutput {
    fn to_human(&self) -> String {
        if self.tools.is_empty() {
            return "No tools configured.".to_string();
        }
        format!(
            "{}\nShowing {} tool(s)",
            TableFormatter::new().format_tools(&self.tools, &self.states),
            self.total
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ToolStateOutput {
    pub name: String,
    pub enabled: bool,
}

impl CommandOutput for ToolStateOutput {
    fn to_human(&self) -> String {
        let state = if self.enabled { "enabled" } else { "disabled" };
        format!("Tool {} {state}", self.name)
    }
}

pub async fn execute(args: ToolArgs, ctx: &StudioContext, json_mode: bool) -> Result<()> {
    let tools = &ctx.repos.tools;

    match args.command {
        ToolCommands::List => {
            let list = tools.list().await?;
            let states = ctx.repos.tool_states.load_tools_state().await?;
            let out = ToolListOutput {
                total: list.len(),
                tools: list,
                states,
            };
            output(&out, json_mode);
        }

        ToolCommands::Show { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Tool, &id).await?;
            let tool = tools.get(id).await?;
            let states = ctx.repos.tool_states.load_tools_state().await?;
            let enabled = states.get(&tool.name).copied().unwrap_or(true);
            output(&ToolOutput { tool, enabled }, json_mode);
        }

        ToolCommands::Add {
            name,
            description,
            params,
        } => {
            let mut tool = Tool::new(name);
            tool.description = description.unwrap_or_default();
            tool.parameters = parse_key_values(&params)?;
            let id = tools.create(&tool).await?;
            output(&ActionOutput::done(format!("Tool created: {id}"), id), json_mode);
        }

        ToolCommands::Update {
            id,
            name,
            description,
            params,
            clear_params,
        } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Tool, &id).await?;
            let mut tool = tools.get(id).await?;
            if let Some(name) = name {
                tool.name = name;
            }
            if let Some(description) = description {
                tool.description = description;
            }
            if clear_params {
                tool.parameters.clear();
            }
            tool.parameters.extend(parse_key_values(&params)?);
            tools.update(&tool).await?;
            output(&ActionOutput::done(format!("Tool updated: {id}"), id), json_mode);
        }

        ToolCommands::Delete { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Tool, &id).await?;
            tools.delete(id).await?;
            output(&ActionOutput::done(format!("Tool deleted: {id}"), id), json_mode);
        }

        ToolCommands::Enable { name } => set_enabled(ctx, name, true, json_mode).await?,
        ToolCommands::Disable { name } => set_enabled(ctx, name, false, json_mode).await?,
    }

    Ok(())
}

async fn set_enabled(ctx: &StudioContext, name: String, enabled: bool, json_mode: bool) -> Result<()> {
    let known = ctx.repos.tools.list().await?;
    if !known.iter().any(|t| t.name == name) {
        bail!("No tool named '{name}'");
    }

    let mut states = ctx.repos.tool_states.load_tools_state().await?;
    states.insert(name.clone(), enabled);
    ctx.repos.tool_states.save_tools_state(&states).await?;

    output(&ToolStateOutput { name, enabled }, json_mode);
    Ok(())
}

/// Plain strings print without JSON quotes.
fn display_value(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::Engine;
    use crate::domain::models::Settings;

    async fn context() -> StudioContext {
        let engine = Engine::in_memory().await.unwrap();
        StudioContext::from_engine(Settings::default(), &engine)
    }

    #[tokio::test]
    async fn test_add_then_disable_by_name() {
        let ctx = context().await;
        let add = ToolCommands::Add {
            name: "SerperDevTool".to_string(),
            description: Some("web search".to_string()),
            params: vec!["n_results=5".to_string()],
        };
        execute(ToolArgs { command: add }, &ctx, true).await.unwrap();

        let disable = ToolCommands::Disable {
            name: "SerperDevTool".to_string(),
        };
        execute(ToolArgs { command: disable }, &ctx, true).await.unwrap();

        let tools = ctx.repos.tools.list().await.unwrap();
        assert_eq!(tools[0].parameters["n_results"], serde_json::json!(5));
        let states = ctx.repos.tool_states.load_tools_state().await.unwrap();
        assert_eq!(states.get("SerperDevTool"), Some(&false));
    }

    #[tokio::test]
    async fn test_enable_unknown_tool_fails() {
        let ctx = context().await;
        let enable = ToolCommands::Enable {
            name: "Nope".to_string(),
        };
        let err = execute(ToolArgs { command: enable }, &ctx, true).await.unwrap_err();
        assert!(err.to_string().contains("No tool named"));
    }

    #[tokio::test]
    async fn test_update_by_prefix_merges_params() {
        let ctx = context().await;
        let tool = Tool::new("ScrapeWebsiteTool").with_parameter("website_url", "https://a.example");
        ctx.repos.tools.create(&tool).await.unwrap();

        let update = ToolCommands::Update {
            id: tool.id.to_string()[..8].to_string(),
            name: None,
            description: Some("scraper".to_string()),
            params: vec!["timeout=30".to_string()],
            clear_params: false,
        };
        execute(ToolArgs { command: update }, &ctx, true).await.unwrap();

        let stored = ctx.repos.tools.get(tool.id).await.unwrap();
        assert_eq!(stored.description, "scraper");
        assert_eq!(stored.parameters.len(), 2);
    }
}
