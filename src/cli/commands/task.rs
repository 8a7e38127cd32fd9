//! Tasks page.

use std::collections::HashMap;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::id_resolver::{resolve_id, resolve_ids};
use crate::cli::output::{output, ActionOutput, CommandOutput, TableFormatter};
use crate::cli::StudioContext;
use crate::domain::errors::StudioError;
use crate::domain::models::{EntityKind, Task};
use crate::services::load_all_entities;

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

/// Fields shared by `add` and `update`. Unset options keep the current value.
#[derive(Args, Debug, Default)]
pub struct TaskFields {
    /// Assigned agent ID (or unique prefix)
    #[arg(short, long)]
    pub agent: Option<String>,
    /// Knowledge source ID (or unique prefix)
    #[arg(short, long)]
    pub knowledge: Option<String>,
    #[arg(long = "async")]
    pub async_execution: Option<bool>,
    /// Asynchronous task whose output feeds this one
    #[arg(long)]
    pub context_async: Vec<String>,
    /// Synchronous task whose output feeds this one
    #[arg(long)]
    pub context_sync: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks
    List,
    /// Show a task with its agent and context
    Show {
        /// Task ID (or unique prefix)
        id: String,
    },
    /// Add a task
    Add {
        description: String,
        #[arg(short, long, default_value = "")]
        expected_output: String,
        #[command(flatten)]
        fields: TaskFields,
    },
    /// Update a task. Passing a context option replaces that list.
    Update {
        /// Task ID (or unique prefix)
        id: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        expected_output: Option<String>,
        #[command(flatten)]
        fields: TaskFields,
        /// Unassign the agent
        #[arg(long, conflicts_with = "agent")]
        clear_agent: bool,
    },
    /// Delete a task no crew uses
    Delete {
        /// Task ID (or unique prefix)
        id: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct TaskDetailOutput {
    #[serde(flatten)]
    pub task: Task,
    pub agent_role: Option<String>,
    pub knowledge_source_name: Option<String>,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let t = &self.task;
        let mut lines = vec![
            format!("Task: {}", t.id),
            format!("  Description:     {}", t.description),
            format!("  Expected output: {}", t.expected_output),
            format!("  Agent:           {}", self.agent_role.as_deref().unwrap_or("-")),
            format!("  Async:           {}", t.async_execution),
        ];
        if let Some(name) = &self.knowledge_source_name {
            lines.push(format!("  Knowledge:       {name}"));
        }
        let context: Vec<String> = t.context_task_ids().map(ToString::to_string).collect();
        if !context.is_empty() {
            lines.push("  Context:".to_string());
            for id in context {
                lines.push(format!("    - {id}"));
            }
        }
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<Task>,
    #[serde(skip)]
    pub agent_roles: HashMap<uuid::Uuid, String>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks configured.".to_string();
        }
        format!(
            "{}\nShowing {} task(s)",
            TableFormatter::new().format_tasks(&self.tasks, &self.agent_roles),
            self.total
        )
    }
}

async fn apply_fields(ctx: &StudioContext, task: &mut Task, fields: TaskFields) -> Result<()> {
    let pool = ctx.pool().await?;
    if let Some(agent) = fields.agent {
        task.agent_id = Some(resolve_id(pool, EntityKind::Agent, &agent).await?);
    }
    if let Some(source) = fields.knowledge {
        task.knowledge_source_id = Some(resolve_id(pool, EntityKind::KnowledgeSource, &source).await?);
    }
    task.async_execution = fields.async_execution.unwrap_or(task.async_execution);
    if !fields.context_async.is_empty() {
        task.context_from_async_tasks_ids = resolve_ids(pool, EntityKind::Task, &fields.context_async).await?;
    }
    if !fields.context_sync.is_empty() {
        task.context_from_sync_tasks_ids = resolve_ids(pool, EntityKind::Task, &fields.context_sync).await?;
    }
    Ok(())
}

pub async fn execute(args: TaskArgs, ctx: &StudioContext, json_mode: bool) -> Result<()> {
    let tasks = &ctx.repos.tasks;

    match args.command {
        TaskCommands::List => {
            let list = tasks.list().await?;
            let agent_roles = ctx
                .repos
                .agents
                .list()
                .await?
                .into_iter()
                .map(|a| (a.id, a.role))
                .collect();
            output(
                &TaskListOutput {
                    total: list.len(),
                    tasks: list,
                    agent_roles,
                },
                json_mode,
            );
        }

        TaskCommands::Show { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Task, &id).await?;
            let snapshot = load_all_entities(&ctx.repos).await?;
            let resolved = snapshot.task(id).ok_or_else(|| StudioError::not_found(EntityKind::Task, id))?;
            let mut task = resolved.task.clone();
            // Show only the context that still resolves.
            task.context_from_async_tasks_ids.retain(|c| resolved.context_task_ids.contains(c));
            task.context_from_sync_tasks_ids.retain(|c| resolved.context_task_ids.contains(c));
            let out = TaskDetailOutput {
                task,
                agent_role: resolved.agent.as_ref().map(|a| a.agent.role.clone()),
                knowledge_source_name: resolved.knowledge_source.as_ref().map(|k| k.name.clone()),
            };
            output(&out, json_mode);
        }

        TaskCommands::Add {
            description,
            expected_output,
            fields,
        } => {
            let mut task = Task::new(description, expected_output);
            apply_fields(ctx, &mut task, fields).await?;
            let id = tasks.create(&task).await?;
            output(&ActionOutput::done(format!("Task created: {id}"), id), json_mode);
        }

        TaskCommands::Update {
            id,
            description,
            expected_output,
            fields,
            clear_agent,
        } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Task, &id).await?;
            let mut task = tasks.get(id).await?;
            if let Some(description) = description {
                task.description = description;
            }
            if let Some(expected_output) = expected_output {
                task.expected_output = expected_output;
            }
            if clear_agent {
                task.agent_id = None;
            }
            apply_fields(ctx, &mut task, fields).await?;
            tasks.update(&task).await?;
            output(&ActionOutput::done(format!("Task updated: {id}"), id), json_mode);
        }

        TaskCommands::Delete { id } => {
            let id = resolve_id(ctx.pool().await?, EntityKind::Task, &id).await?;
            tasks.delete(id).await?;
            output(&ActionOutput::done(format!("Task deleted: {id}"), id), json_mode);
        }
    }

    Ok(())
}
