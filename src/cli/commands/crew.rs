//! Crews page.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use crate::cli::id_resolver::{resolve_id, resolve_ids};
use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::StudioContext;
use crate::domain::errors::StudioError;
use crate::domain::models::{Crew, CrewRunSpec, EntityKind, LoadedEntities, Process, ResolvedCrew};
use crate::services::load_all_entities;

#[derive(Args, Debug)]
pub struct CrewArgs {
    #[command(subcommand)]
    pub command: CrewCommands,
}

/// Fields shared by `add` and `update`. Unset options keep the current value;
/// list options replace the whole list.
#[derive(Args, Debug, Default)]
pub struct CrewFields {
    /// sequential or hierarchical
    #[arg(short, long)]
    pub process: Option<String>,
    /// Member agent ID (or unique prefix); repeat for several
    #[arg(long = "agent")]
    pub agents: Vec<String>,
    /// Task ID (or unique prefix) in execution order
    #[arg(long = "task")]
    pub tasks: Vec<String>,
    /// Knowledge source ID (or unique prefix)
    #[arg(long = "knowledge")]
    pub knowledge_sources: Vec<String>,
    #[arg(long)]
    pub manager_llm: Option<String>,
    /// Manager agent ID (or unique prefix) for hierarchical crews
    #[arg(long)]
    pub manager_agent: Option<String>,
    #[arg(long)]
    pub verbose: Option<bool>,
    #[arg(long)]
    pub memory: Option<bool>,
    #[arg(long)]
    pub cache: Option<bool>,
    #[arg(long)]
    pub planning: Option<bool>,
    #[arg(long)]
    pub planning_llm: Option<String>,
    /// Requests per minute limit
    #[arg(long)]
    pub max_rpm: Option<u32>,
}

/// Options of `update` that reset a field. They apply before the new values,
/// so `--clear-agents --agent X` leaves only X.
#[derive(Args, Debug, Default)]
pub struct CrewClears {
    /// Remove every member agent
    #[arg(long)]
    pub clear_agents: bool,
    /// Remove every task
    #[arg(long)]
    pub clear_tasks: bool,
    /// Remove every knowledge source
    #[arg(long)]
    pub clear_knowledge: bool,
    #[arg(long, conflicts_with = "manager_agent")]
    pub clear_manager_agent: bool,
    #[arg(long, conflicts_with = "manager_llm")]
    pub clear_manager_llm: bool,
    #[arg(long, conflicts_with = "planning_llm")]
    pub clear_planning_llm: bool,
    /// Remove the requests per minute limit
    #[arg(long, conflicts_with = "max_rpm")]
    pub clear_max_rpm: bool,
}

impl CrewClears {
    fn apply(&self, crew: &mut Crew) {
        if self.clear_agents {
            crew.agent_ids.clear();
        }
        if self.clear_tasks {
            crew.task_ids.clear();
        }
        if self.clear_knowledge {
            crew.knowledge_source_ids.clear();
        }
        if self.clear_manager_agent {
            crew.manager_agent_id = None;
        }
        if self.clear_manager_llm {
            crew.manager_llm = None;
        }
        if self.clear_planning_llm {
            crew.planning_llm = None;
        }
        if self.clear_max_rpm {
            crew.max_rpm = None;
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum CrewCommands {
    /// List crews
    List,
    /// Show a crew with its members and readiness
    Show {
        /// Crew ID (or unique prefix)
        id: String,
    },
    /// Add a crew
    Add {
        name: String,
        #[command(flatten)]
        fields: CrewFields,
    },
    /// Update a crew
    Update {
        /// Crew ID (or unique prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: CrewFields,
        #[command(flatten)]
        clears: CrewClears,
    },
    /// Delete a crew; its results are kept
    Delete {
        /// Crew ID (or unique prefix)
        id: String,
    },
    /// Print the run description handed to the orchestration library
    Plan {
        /// Crew ID (or unique prefix)
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct CrewDetailOutput {
    #[serde(flatten)]
    pub crew: Crew,
    pub agent_roles: Vec<String>,
    pub task_descriptions: Vec<String>,
    pub manager_agent_role: Option<String>,
    pub issues: Vec<String>,
}

impl CrewDetailOutput {
    fn from_resolved(resolved: &ResolvedCrew) -> Self {
        Self {
            crew: resolved.crew.clone(),
            agent_roles: resolved.agents.iter().map(|a| a.agent.role.clone()).collect(),
            task_descriptions: resolved.tasks.iter().map(|t| t.task.description.clone()).collect(),
            manager_agent_role: resolved.manager_agent.as_ref().map(|a| a.agent.role.clone()),
            issues: resolved.readiness_issues(),
        }
    }
}

impl CommandOutput for CrewDetailOutput {
    fn to_human(&self) -> String {
        let c = &self.crew;
        let mut lines = vec![
            format!("Crew: {}", c.name),
            format!("  ID:       {}", c.id),
            format!("  Process:  {}", c.process.as_str()),
            format!(
                "  Flags:    verbose={} memory={} cache={} planning={}",
                c.verbose, c.memory, c.cache, c.planning
            ),
        ];
        if let Some(rpm) = c.max_rpm {
            lines.push(format!("  Max RPM:  {rpm}"));
        }
        if let Some(llm) = &c.manager_llm {
            lines.push(format!("  Manager LLM: {llm}"));
        }
        if let Some(role) = &self.manager_agent_role {
            lines.push(format!("  Manager agent: {role}"));
        }
        lines.push(format!("  Agents:   {}", self.agent_roles.join(", ")));
        lines.push("  Tasks:".to_string());
        for (i, description) in self.task_descriptions.iter().enumerate() {
            lines.push(format!("    {}. {description}", i + 1));
        }
        if self.issues.is_empty() {
            lines.push("\nReady to run.".to_string());
        } else {
            lines.push("\nNot ready:".to_string());
            for issue in &self.issues {
                lines.push(format!("  - {issue}"));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CrewListOutput {
    pub crews: Vec<Crew>,
    pub total: usize,
}

impl CommandOutput for CrewListOutput {
    fn to_human(&self) -> String {
        if self.crews.is_empty() {
            return "No crews configured.".to_string();
        }
        format!(
            "{}\nShowing {} crew(s)",
            TableFormatter::new().format_crews(&self.crews),
            self.total
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CrewPlanOutput {
    pub ready: bool,
    pub issues: Vec<String>,
    pub crew: CrewRunSpec,
}

impl CrewPlanOutput {
    /// Readiness problems plus every disabled tool the crew's agents rely on.
    pub fn build(resolved: &ResolvedCrew, snapshot: &LoadedEntities) -> Self {
        let mut issues = resolved.readiness_issues();
        for agent in resolved.agents.iter().chain(resolved.manager_agent.iter()) {
            for tool in &agent.tools {
                if !snapshot.is_tool_enabled(&tool.name) {
                    issues.push(format!("agent '{}' uses disabled tool {}", agent.agent.role, tool.name));
                }
            }
        }
        Self {
            ready: issues.is_empty(),
            issues,
            crew: resolved.to_run_spec(),
        }
    }
}

impl CommandOutput for CrewPlanOutput {
    fn to_human(&self) -> String {
        let run = &self.crew;
        let mut lines = vec![format!("Run plan for {} ({} process)", run.name, run.process.as_str())];
        for (i, task) in run.tasks.iter().enumerate() {
            let agent = task.agent_role.as_deref().unwrap_or("manager");
            let mode = if task.async_execution { " [async]" } else { "" };
            lines.push(format!("  {}. {} -> {agent}{mode}", i + 1, task.description));
        }
        lines.push("Agents:".to_string());
        for agent in &run.agents {
            let tools = if agent.tools.is_empty() {
                "no tools".to_string()
            } else {
                agent.tools.join(", ")
            };
            lines.push(format!("  {} on {} ({tools})", agent.role, agent.llm));
        }
        if self.ready {
            lines.push("\nReady to run.".to_string());
        } else {
            lines.push("\nNot ready:".to_string());
            lines.extend(self.issues.iter().map(|issue| format!("  - {issue}")));
        }
        lines.join("\n")
    }
}

async fn apply_fields(ctx: &StudioContext, crew: &mut Crew, fields: CrewFields) -> Result<()> {
    let pool = ctx.pool().await?;
    if let Some(process) = fields.process {
        crew.process = Process::from_str(&process).ok_or_else(|| anyhow!("Unknown process '{process}'"))?;
        // Only hierarchical crews have a manager agent.
        if crew.process == Process::Sequential && fields.manager_agent.is_none() {
            crew.manager_agent_id = None;
        }
    }
    if !fields.agents.is_empty() {
        crew.agent_ids = resolve_ids(pool, EntityKind::Agent, &fields.agents).await?;
    }
    if !fields.tasks.is_empty() {
        crew.task_ids = resolve_ids(pool, EntityKind::Task, &fields.tasks).await?;
    }
    if !fields.knowledge_sources.is_empty() {
        crew.knowledge_source_ids = resolve_ids(pool, EntityKind::KnowledgeSource, &fields.knowledge_sources).await?;
    }
    if let Some(manager) = fields.manager_agent {
        crew.manager_agent_id = Some(resolve_id(pool, EntityKind::Agent, &manager).await?);
    }
    if fields.manager_llm.is_some() {
        crew.manager_llm = fields.manager_llm;
    }
    if fields.planning_llm.is_some() {
        crew.planning_llm = fields.planning_llm;
    }
    crew.max_rpm = fields.max_rpm.or(crew.max_rpm);
    crew.verbose = fields.verbose.unwrap_or(crew.verbose);
    crew.memory = fields.memory.unwrap_or(crew.memory);
    crew.cache = fields.cache.unwrap_or(crew.cache);
    crew.planning = fields.planning.unwrap_or(crew.planning);
    Ok(())
}

/// Load the snapshot and look up one crew in it.
async fn snapshot_with_crew(ctx: &StudioContext, id: &str) -> Result<(LoadedEntities, Arc<ResolvedCrew>)> {
    let id = resolve_id(ctx.pool().await?, EntityKind::Crew, id).await?;
    let snapshot = load_all_entities(&ctx.repos).await?;
    let crew = snapshot
        .crew(id)
        .cloned()
        .ok_or_else(|| StudioError::not_found(EntityKind::Crew, id))?;
    Ok((snapshot, crew))
}

pub async fn execute(args: CrewArgs, ctx: &StudioContext, json_mode: bool) -> Result<()> {
    let crews = &ctx.repos.crews;

    match args.command {
        CrewCommands::List => {
            let list = crews.list().await?;
            output(
                &CrewListOutput {
                    total: list.len(),
                    crews: list,
                },
                json_mode,
            );
        }

        CrewCommands::Show { id } => {
            let (_, resolved) = snapshot_with_crew(ctx, &id).await?;
            output(&CrewDetailOutput::from_resolved(&resolved), json_mode);
        }

        CrewCommands::Add { name, fields } => {
            let mut crew = Crew::new(name);
            apply_fields(ctx, &mut crew, fields).await?;
            let id = crews.create(&crew).await?;
            output(&ActionOutput::done(format!("Crew created: {id}"), id), json_mode);
        }

        CrewCommands::Update {
            id,
            name,
            fields,
            clears,
        } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Crew, &id).await?;
            let mut crew = crews.get(id).await?;
            if let Some(name) = name {
                crew.name = name;
            }
            clears.apply(&mut crew);
            apply_fields(ctx, &mut crew, fields).await?;
            crews.update(&crew).await?;
            output(&ActionOutput::done(format!("Crew updated: {id}"), id), json_mode);
        }

        CrewCommands::Delete { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Crew, &id).await?;
            crews.delete(id).await?;
            output(&ActionOutput::done(format!("Crew deleted: {id}"), id), json_mode);
        }

        CrewCommands::Plan { id } => {
            let (snapshot, resolved) = snapshot_with_crew(ctx, &id).await?;
            output(&CrewPlanOutput::build(&resolved, &snapshot), json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::Engine;
    use crate::domain::models::{Agent, Settings, Task, Tool};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_plan_reports_disabled_tools() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let tool = Tool::new("SerperDevTool");
        ctx.repos.tools.create(&tool).await.unwrap();
        let agent = Agent::new("researcher").with_tool(tool.id);
        ctx.repos.agents.create(&agent).await.unwrap();
        let task = Task::new("find facts", "facts").with_agent(agent.id);
        ctx.repos.tasks.create(&task).await.unwrap();
        let crew = Crew::new("research-crew").with_agent(agent.id).with_task(task.id);
        ctx.repos.crews.create(&crew).await.unwrap();

        let snapshot = load_all_entities(&ctx.repos).await.unwrap();
        let plan = CrewPlanOutput::build(snapshot.crew(crew.id).unwrap(), &snapshot);
        assert!(plan.ready);
        assert_eq!(plan.crew.agents[0].tools, vec!["SerperDevTool".to_string()]);

        ctx.repos
            .tool_states
            .save_tools_state(&BTreeMap::from([("SerperDevTool".to_string(), false)]))
            .await
            .unwrap();
        let snapshot = load_all_entities(&ctx.repos).await.unwrap();
        let plan = CrewPlanOutput::build(snapshot.crew(crew.id).unwrap(), &snapshot);
        assert!(!plan.ready);
        assert!(plan.issues[0].contains("disabled tool SerperDevTool"));
    }

    #[tokio::test]
    async fn test_add_hierarchical_crew_with_manager() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let manager = Agent::new("editor");
        ctx.repos.agents.create(&manager).await.unwrap();

        let add = CrewCommands::Add {
            name: "newsroom".to_string(),
            fields: CrewFields {
                process: Some("hierarchical".to_string()),
                manager_agent: Some(manager.id.to_string()[..8].to_string()),
                max_rpm: Some(10),
                ..CrewFields::default()
            },
        };
        execute(CrewArgs { command: add }, &ctx, true).await.unwrap();

        let stored = ctx.repos.crews.list().await.unwrap();
        assert_eq!(stored[0].process, Process::Hierarchical);
        assert_eq!(stored[0].manager_agent_id, Some(manager.id));
        assert_eq!(stored[0].max_rpm, Some(10));
    }

    #[tokio::test]
    async fn test_unknown_process_is_rejected() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let add = CrewCommands::Add {
            name: "x".to_string(),
            fields: CrewFields {
                process: Some("parallel".to_string()),
                ..CrewFields::default()
            },
        };
        let err = execute(CrewArgs { command: add }, &ctx, true).await.unwrap_err();
        assert!(err.to_string().contains("Unknown process"));
    }

    async fn hierarchical_crew(ctx: &StudioContext) -> Crew {
        let manager = Agent::new("editor");
        ctx.repos.agents.create(&manager).await.unwrap();
        let member = Agent::new("reporter");
        ctx.repos.agents.create(&member).await.unwrap();
        let task = Task::new("write story", "story").with_agent(member.id);
        ctx.repos.tasks.create(&task).await.unwrap();

        let mut crew = Crew::new("newsroom")
            .with_process(Process::Hierarchical)
            .with_agent(member.id)
            .with_task(task.id);
        crew.manager_agent_id = Some(manager.id);
        crew.manager_llm = Some("OpenAI: gpt-4o".to_string());
        crew.planning_llm = Some("OpenAI: gpt-4o-mini".to_string());
        crew.max_rpm = Some(10);
        ctx.repos.crews.create(&crew).await.unwrap();
        crew
    }

    fn update(crew: &Crew, fields: CrewFields, clears: CrewClears) -> CrewArgs {
        CrewArgs {
            command: CrewCommands::Update {
                id: crew.id.to_string(),
                name: None,
                fields,
                clears,
            },
        }
    }

    #[tokio::test]
    async fn test_switching_to_sequential_drops_manager_agent() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let crew = hierarchical_crew(&ctx).await;

        let fields = CrewFields {
            process: Some("sequential".to_string()),
            ..CrewFields::default()
        };
        execute(update(&crew, fields, CrewClears::default()), &ctx, true).await.unwrap();

        let stored = ctx.repos.crews.get(crew.id).await.unwrap();
        assert_eq!(stored.process, Process::Sequential);
        assert_eq!(stored.manager_agent_id, None);
        assert_eq!(stored.manager_llm, crew.manager_llm);
    }

    #[tokio::test]
    async fn test_sequential_with_manager_agent_is_still_rejected() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let crew = hierarchical_crew(&ctx).await;
        let manager = crew.manager_agent_id.unwrap();

        let fields = CrewFields {
            process: Some("sequential".to_string()),
            manager_agent: Some(manager.to_string()),
            ..CrewFields::default()
        };
        let err = execute(update(&crew, fields, CrewClears::default()), &ctx, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("manager agent"));
    }

    #[tokio::test]
    async fn test_clear_flags_reset_optional_fields() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let crew = hierarchical_crew(&ctx).await;

        let clears = CrewClears {
            clear_agents: true,
            clear_tasks: true,
            clear_knowledge: true,
            clear_manager_agent: true,
            clear_planning_llm: true,
            clear_max_rpm: true,
            ..CrewClears::default()
        };
        execute(update(&crew, CrewFields::default(), clears), &ctx, true).await.unwrap();

        let stored = ctx.repos.crews.get(crew.id).await.unwrap();
        assert!(stored.agent_ids.is_empty());
        assert!(stored.task_ids.is_empty());
        assert!(stored.knowledge_source_ids.is_empty());
        assert_eq!(stored.manager_agent_id, None);
        assert_eq!(stored.planning_llm, None);
        assert_eq!(stored.max_rpm, None);
        // Still hierarchical, so the manager LLM stays.
        assert_eq!(stored.manager_llm, crew.manager_llm);

        let clears = CrewClears {
            clear_manager_llm: true,
            ..CrewClears::default()
        };
        let err = execute(update(&crew, CrewFields::default(), clears), &ctx, true)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("manager LLM or a manager agent"));
    }

    #[tokio::test]
    async fn test_clear_then_replace_members() {
        let engine = Engine::in_memory().await.unwrap();
        let ctx = StudioContext::from_engine(Settings::default(), &engine);
        let crew = hierarchical_crew(&ctx).await;
        let newcomer = Agent::new("photographer");
        ctx.repos.agents.create(&newcomer).await.unwrap();

        let fields = CrewFields {
            agents: vec![newcomer.id.to_string()],
            ..CrewFields::default()
        };
        let clears = CrewClears {
            clear_agents: true,
            ..CrewClears::default()
        };
        execute(update(&crew, fields, clears), &ctx, true).await.unwrap();
        assert_eq!(ctx.repos.crews.get(crew.id).await.unwrap().agent_ids, vec![newcomer.id]);
    }
}
