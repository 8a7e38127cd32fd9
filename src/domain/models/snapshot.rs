//! Resolved entity graph.
//!
//! [`LoadedEntities`] is built layer by layer in dependency order. Each layer
//! only refers to `Arc`s from layers already built, so a resolved agent always
//! points at tools present in the same snapshot, a resolved task at an agent
//! present in it, and so on. Ids that cannot be resolved are dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::{Agent, Crew, CrewResult, KnowledgeSource, Process, Task, Tool};

type Index<T> = HashMap<Uuid, Arc<T>>;

fn index<T, F: Fn(&T) -> Uuid>(items: &[Arc<T>], id: F) -> Index<T> {
    items.iter().map(|item| (id(item), Arc::clone(item))).collect()
}

fn resolve_all<T>(ids: &[Uuid], index: &Index<T>, owner: &str, what: &str) -> Vec<Arc<T>> {
    ids.iter()
        .filter_map(|id| {
            let found = index.get(id).cloned();
            if found.is_none() {
                warn!(owner, what, missing = %id, "dropping unresolved reference");
            }
            found
        })
        .collect()
}

fn resolve_one<T>(id: Option<Uuid>, index: &Index<T>, owner: &str, what: &str) -> Option<Arc<T>> {
    let id = id?;
    let found = index.get(&id).cloned();
    if found.is_none() {
        warn!(owner, what, missing = %id, "dropping unresolved reference");
    }
    found
}

/// An agent with its tools and knowledge sources resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAgent {
    pub agent: Agent,
    pub tools: Vec<Arc<Tool>>,
    pub knowledge_sources: Vec<Arc<KnowledgeSource>>,
}

impl ResolvedAgent {
    pub fn id(&self) -> Uuid {
        self.agent.id
    }
}

/// A task with its owning agent resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTask {
    pub task: Task,
    pub agent: Option<Arc<ResolvedAgent>>,
    pub knowledge_source: Option<Arc<KnowledgeSource>>,
    /// Context task ids that exist in the snapshot.
    pub context_task_ids: Vec<Uuid>,
}

impl ResolvedTask {
    pub fn id(&self) -> Uuid {
        self.task.id
    }
}

/// A crew with agents and tasks resolved, tasks in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCrew {
    pub crew: Crew,
    pub agents: Vec<Arc<ResolvedAgent>>,
    pub tasks: Vec<Arc<ResolvedTask>>,
    pub manager_agent: Option<Arc<ResolvedAgent>>,
    pub knowledge_sources: Vec<Arc<KnowledgeSource>>,
}

impl ResolvedCrew {
    pub fn id(&self) -> Uuid {
        self.crew.id
    }

    /// Problems that would stop the crew from running.
    pub fn readiness_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.tasks.is_empty() {
            issues.push("crew has no tasks".to_string());
        }
        if self.agents.is_empty() {
            issues.push("crew has no agents".to_string());
        }
        for task in &self.tasks {
            match &task.agent {
                None if self.crew.process == Process::Sequential => {
                    issues.push(format!("task {} has no agent", task.id()));
                }
                Some(agent) if !self.agents.iter().any(|a| a.id() == agent.id()) => {
                    issues.push(format!(
                        "task {} is assigned to agent '{}' which is not in the crew",
                        task.id(),
                        agent.agent.role
                    ));
                }
                _ => {}
            }
        }
        issues
    }

    pub fn is_valid(&self) -> bool {
        self.readiness_issues().is_empty()
    }

    /// The shape handed to the agent orchestration library for a run.
    pub fn to_run_spec(&self) -> CrewRunSpec {
        CrewRunSpec {
            id: self.crew.id,
            name: self.crew.name.clone(),
            process: self.crew.process,
            verbose: self.crew.verbose,
            memory: self.crew.memory,
            cache: self.crew.cache,
            planning: self.crew.planning,
            planning_llm: self.crew.planning_llm.clone(),
            max_rpm: self.crew.max_rpm,
            manager_llm: self.crew.manager_llm.clone(),
            manager_agent: self.manager_agent.as_deref().map(AgentRunSpec::from),
            agents: self.agents.iter().map(|a| AgentRunSpec::from(a.as_ref())).collect(),
            tasks: self.tasks.iter().map(|t| TaskRunSpec::from(t.as_ref())).collect(),
        }
    }
}

/// Serializable crew description consumed by the orchestration library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewRunSpec {
    pub id: Uuid,
    pub name: String,
    pub process: Process,
    pub verbose: bool,
    pub memory: bool,
    pub cache: bool,
    pub planning: bool,
    pub planning_llm: Option<String>,
    pub max_rpm: Option<u32>,
    pub manager_llm: Option<String>,
    pub manager_agent: Option<AgentRunSpec>,
    pub agents: Vec<AgentRunSpec>,
    pub tasks: Vec<TaskRunSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunSpec {
    pub id: Uuid,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub llm: String,
    pub temperature: f64,
    pub max_iter: u32,
    pub allow_delegation: bool,
    pub verbose: bool,
    pub cache: bool,
    pub tools: Vec<String>,
}

impl From<&ResolvedAgent> for AgentRunSpec {
    fn from(resolved: &ResolvedAgent) -> Self {
        let agent = &resolved.agent;
        Self {
            id: agent.id,
            role: agent.role.clone(),
            goal: agent.goal.clone(),
            backstory: agent.backstory.clone(),
            llm: agent.llm_provider_model.clone(),
            temperature: agent.temperature,
            max_iter: agent.max_iter,
            allow_delegation: agent.allow_delegation,
            verbose: agent.verbose,
            cache: agent.cache,
            tools: resolved.tools.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRunSpec {
    pub id: Uuid,
    pub description: String,
    pub expected_output: String,
    pub agent_role: Option<String>,
    pub async_execution: bool,
    pub context: Vec<Uuid>,
}

impl From<&ResolvedTask> for TaskRunSpec {
    fn from(resolved: &ResolvedTask) -> Self {
        Self {
            id: resolved.task.id,
            description: resolved.task.description.clone(),
            expected_output: resolved.task.expected_output.clone(),
            agent_role: resolved.agent.as_ref().map(|a| a.agent.role.clone()),
            async_execution: resolved.task.async_execution,
            context: resolved.context_task_ids.clone(),
        }
    }
}

/// Aggregate snapshot of everything persisted.
#[derive(Debug, Clone, Default)]
pub struct LoadedEntities {
    pub tools: Vec<Arc<Tool>>,
    pub knowledge_sources: Vec<Arc<KnowledgeSource>>,
    pub agents: Vec<Arc<ResolvedAgent>>,
    pub tasks: Vec<Arc<ResolvedTask>>,
    pub crews: Vec<Arc<ResolvedCrew>>,
    /// Newest first.
    pub results: Vec<Arc<CrewResult>>,
    pub enabled_tools: BTreeMap<String, bool>,
}

impl LoadedEntities {
    /// Build the snapshot from flat entity lists, resolving one layer at a time.
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        tools: Vec<Tool>,
        knowledge_sources: Vec<KnowledgeSource>,
        agents: Vec<Agent>,
        tasks: Vec<Task>,
        crews: Vec<Crew>,
        results: Vec<CrewResult>,
        enabled_tools: BTreeMap<String, bool>,
    ) -> Self {
        let tools: Vec<Arc<Tool>> = tools.into_iter().map(Arc::new).collect();
        let knowledge_sources: Vec<Arc<KnowledgeSource>> =
            knowledge_sources.into_iter().map(Arc::new).collect();
        let tool_index = index(&tools, |t| t.id);
        let source_index = index(&knowledge_sources, |k| k.id);

        let agents: Vec<Arc<ResolvedAgent>> = agents
            .into_iter()
            .map(|agent| {
                let owner = agent.id.to_string();
                Arc::new(ResolvedAgent {
                    tools: resolve_all(&agent.tool_ids, &tool_index, &owner, "tool"),
                    knowledge_sources: resolve_all(
                        &agent.knowledge_source_ids,
                        &source_index,
                        &owner,
                        "knowledge_source",
                    ),
                    agent,
                })
            })
            .collect();
        let agent_index = index(&agents, ResolvedAgent::id);

        let task_ids: std::collections::HashSet<Uuid> = tasks.iter().map(|t| t.id).collect();
        let tasks: Vec<Arc<ResolvedTask>> = tasks
            .into_iter()
            .map(|task| {
                let owner = task.id.to_string();
                let context_task_ids = task
                    .context_task_ids()
                    .filter(|id| {
                        let known = task_ids.contains(*id);
                        if !known {
                            warn!(owner = %owner, missing = %id, "dropping unresolved context task");
                        }
                        known
                    })
                    .copied()
                    .collect();
                Arc::new(ResolvedTask {
                    agent: resolve_one(task.agent_id, &agent_index, &owner, "agent"),
                    knowledge_source: resolve_one(
                        task.knowledge_source_id,
                        &source_index,
                        &owner,
                        "knowledge_source",
                    ),
                    context_task_ids,
                    task,
                })
            })
            .collect();
        let task_index = index(&tasks, ResolvedTask::id);

        let crews: Vec<Arc<ResolvedCrew>> = crews
            .into_iter()
            .map(|crew| {
                let owner = crew.id.to_string();
                Arc::new(ResolvedCrew {
                    agents: resolve_all(&crew.agent_ids, &agent_index, &owner, "agent"),
                    tasks: resolve_all(&crew.task_ids, &task_index, &owner, "task"),
                    manager_agent: resolve_one(crew.manager_agent_id, &agent_index, &owner, "manager_agent"),
                    knowledge_sources: resolve_all(
                        &crew.knowledge_source_ids,
                        &source_index,
                        &owner,
                        "knowledge_source",
                    ),
                    crew,
                })
            })
            .collect();

        Self {
            tools,
            knowledge_sources,
            agents,
            tasks,
            crews,
            results: results.into_iter().map(Arc::new).collect(),
            enabled_tools,
        }
    }

    pub fn tool(&self, id: Uuid) -> Option<&Arc<Tool>> {
        self.tools.iter().find(|t| t.id == id)
    }

    pub fn knowledge_source(&self, id: Uuid) -> Option<&Arc<KnowledgeSource>> {
        self.knowledge_sources.iter().find(|k| k.id == id)
    }

    pub fn agent(&self, id: Uuid) -> Option<&Arc<ResolvedAgent>> {
        self.agents.iter().find(|a| a.id() == id)
    }

    pub fn task(&self, id: Uuid) -> Option<&Arc<ResolvedTask>> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn crew(&self, id: Uuid) -> Option<&Arc<ResolvedCrew>> {
        self.crews.iter().find(|c| c.id() == id)
    }

    /// Whether a tool class is enabled. Tools never toggled count as enabled.
    pub fn is_tool_enabled(&self, name: &str) -> bool {
        self.enabled_tools.get(name).copied().unwrap_or(true)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
            && self.knowledge_sources.is_empty()
            && self.agents.is_empty()
            && self.tasks.is_empty()
            && self.crews.is_empty()
            && self.results.is_empty()
    }
}
