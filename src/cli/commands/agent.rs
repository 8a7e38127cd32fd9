//! Agents page.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::id_resolver::{resolve_id, resolve_ids};
use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::StudioContext;
use crate::domain::errors::StudioError;
use crate::domain::models::{Agent, EntityKind};
use crate::services::load_all_entities;

#[derive(Args, Debug)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommands,
}

/// Fields shared by `add` and `update`. Unset options keep the current value.
#[derive(Args, Debug, Default)]
pub struct AgentFields {
    #[arg(short, long)]
    pub goal: Option<String>,
    #[arg(short, long)]
    pub backstory: Option<String>,
    /// Model as "provider: model", e.g. "OpenAI: gpt-4o-mini"
    #[arg(long)]
    pub llm: Option<String>,
    #[arg(long)]
    pub temperature: Option<f64>,
    #[arg(long)]
    pub max_iter: Option<u32>,
    #[arg(long)]
    pub allow_delegation: Option<bool>,
    #[arg(long)]
    pub verbose: Option<bool>,
    #[arg(long)]
    pub cache: Option<bool>,
    /// Tool ID (or unique prefix); repeat to assign several, in order
    #[arg(long = "tool")]
    pub tools: Vec<String>,
    /// Knowledge source ID (or unique prefix)
    #[arg(long = "knowledge")]
    pub knowledge_sources: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum AgentCommands {
    /// List agents
    List,
    /// Show an agent with its tools and knowledge sources
    Show {
        /// Agent ID (or unique prefix)
        id: String,
    },
    /// Add an agent
    Add {
        role: String,
        #[command(flatten)]
        fields: AgentFields,
    },
    /// Update an agent. Passing --tool or --knowledge replaces that list.
    Update {
        /// Agent ID (or unique prefix)
        id: String,
        #[arg(long)]
        role: Option<String>,
        #[command(flatten)]
        fields: AgentFields,
        /// Remove every tool from the agent
        #[arg(long, conflicts_with = "tools")]
        clear_tools: bool,
        /// Remove every knowledge source from the agent
        #[arg(long, conflicts_with = "knowledge_sources")]
        clear_knowledge: bool,
    },
    /// Delete an agent no task or crew uses
    Delete {
        /// Agent ID (or unique prefix)
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct AgentDetailOutput {
    #[serde(flatten)]
    pub agent: Agent,
    pub tool_names: Vec<String>,
    pub knowledge_source_names: Vec<String>,
}

impl CommandOutput for AgentDetailOutput {
    fn to_human(&self) -> String {
        let a = &self.agent;
        let (provider, model) = a.llm_parts();
        let mut lines = vec![
            format!("Agent: {}", a.role),
            format!("  ID:          {}", a.id),
            format!("  Goal:        {}", a.goal),
            format!("  Backstory:   {}", a.backstory),
            format!("  LLM:         {model} ({provider})"),
            format!("  Temperature: {:.2}", a.temperature),
            format!("  Max iter:    {}", a.max_iter),
            format!(
                "  Flags:       delegation={} verbose={} cache={}",
                a.allow_delegation, a.verbose, a.cache
            ),
        ];
        if !self.tool_names.is_empty() {
            lines.push(format!("  Tools:       {}", self.tool_names.join(", ")));
        }
        if !self.knowledge_source_names.is_empty() {
            lines.push(format!("  Knowledge:   {}", self.knowledge_source_names.join(", ")));
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AgentListOutput {
    pub agents: Vec<Agent>,
    pub total: usize,
}

impl CommandOutput for AgentListOutput {
    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return "No agents configured.".to_string();
        }
        format!(
            "{}\nShowing {} agent(s)",
            TableFormatter::new().format_agents(&self.agents),
            self.total
        )
    }
}

async fn apply_fields(ctx: &StudioContext, agent: &mut Agent, fields: AgentFields) -> Result<()> {
    if let Some(goal) = fields.goal {
        agent.goal = goal;
    }
    if let Some(backstory) = fields.backstory {
        agent.backstory = backstory;
    }
    if let Some(llm) = fields.llm {
        agent.llm_provider_model = llm;
    }
    agent.temperature = fields.temperature.unwrap_or(agent.temperature);
    agent.max_iter = fields.max_iter.unwrap_or(agent.max_iter);
    agent.allow_delegation = fields.allow_delegation.unwrap_or(agent.allow_delegation);
    agent.verbose = fields.verbose.unwrap_or(agent.verbose);
    agent.cache = fields.cache.unwrap_or(agent.cache);

    if !fields.tools.is_empty() {
        let pool = ctx.pool().await?;
        agent.tool_ids = resolve_ids(pool, EntityKind::Tool, &fields.tools).await?;
    }
    if !fields.knowledge_sources.is_empty() {
        let pool = ctx.pool().await?;
        agent.knowledge_source_ids =
            resolve_ids(pool, EntityKind::KnowledgeSource, &fields.knowledge_sources).await?;
    }
    Ok(())
}

pub async fn execute(args: AgentArgs, ctx: &StudioContext, json_mode: bool) -> Result<()> {
    let agents = &ctx.repos.agents;

    match args.command {
        AgentCommands::List => {
            let list = agents.list().await?;
            output(
                &AgentListOutput {
                    total: list.len(),
                    agents: list,
                },
                json_mode,
            );
        }

        AgentCommands::Show { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Agent, &id).await?;
            let snapshot = load_all_entities(&ctx.repos).await?;
            let resolved = snapshot
                .agent(id)
                .ok_or_else(|| StudioError::not_found(EntityKind::Agent, id))?;
            let out = AgentDetailOutput {
                agent: resolved.agent.clone(),
                tool_names: resolved.tools.iter().map(|t| t.name.clone()).collect(),
                knowledge_source_names: resolved.knowledge_sources.iter().map(|k| k.name.clone()).collect(),
            };
            output(&out, json_mode);
        }

        AgentCommands::Add { role, fields } => {
            let mut agent = Agent::new(role);
            apply_fields(ctx, &mut agent, fields).await?;
            let id = agents.create(&agent).await?;
            output(&ActionOutput::done(format!("Agent created: {id}"), id), json_mode);
        }

        AgentCommands::Update {
            id,
            role,
            fields,
            clear_tools,
            clear_knowledge,
        } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Agent, &id).await?;
            let mut agent = agents.get(id).await?;
            if let Some(role) = role {
                agent.role = role;
            }
            if clear_tools {
                agent.tool_ids.clear();
            }
            if clear_knowledge {
                agent.knowledge_source_ids.clear();
            }
            apply_fields(ctx, &mut agent, fields).await?;
            agents.update(&agent).await?;
            output(&ActionOutput::done(format!("Agent updated: {id}"), id), json_mode);
        }

        AgentCommands::Delete { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Agent, &id).await?;
            agents.delete(id).await?;
            output(&ActionOutput::done(format!("Agent deleted: {id}"), id), json_mode);
        }
    }

    Ok(())
}
