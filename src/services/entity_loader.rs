//! Loads every persisted entity into one resolved snapshot.

use tracing::{debug, instrument};

use super::Repositories;
use crate::domain::errors::DomainResult;
use crate::domain::models::LoadedEntities;

/// List every kind in dependency order (tools, knowledge sources, agents,
/// tasks, crews, results) and resolve references layer by layer.
///
/// The reads are separate statements, not one transaction: a concurrent
/// writer can leave the snapshot partially updated. References that do not
/// resolve are dropped with a warning, so the snapshot never points at an
/// entity it does not contain.
#[instrument(skip(repos))]
pub async fn load_all_entities(repos: &Repositories) -> DomainResult<LoadedEntities> {
    let tools = repos.tools.list().await?;
    let knowledge_sources = repos.knowledge_sources.list().await?;
    let agents = repos.agents.list().await?;
    let tasks = repos.tasks.list().await?;
    let crews = repos.crews.list().await?;
    let results = repos.results.list().await?;
    let enabled_tools = repos.tool_states.load_tools_state().await?;

    debug!(
        tools = tools.len(),
        knowledge_sources = knowledge_sources.len(),
        agents = agents.len(),
        tasks = tasks.len(),
        crews = crews.len(),
        results = results.len(),
        "entities loaded"
    );

    Ok(LoadedEntities::assemble(
        tools,
        knowledge_sources,
        agents,
        tasks,
        crews,
        results,
        enabled_tools,
    ))
}
