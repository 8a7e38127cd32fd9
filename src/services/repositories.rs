//! The set of repositories the studio works with.

use std::sync::Arc;

use crate::domain::models::{Agent, Crew, CrewResult, KnowledgeSource, Task, Tool};
use crate::domain::ports::{EntityRepository, RecordStore, ToolStateRepository};

/// One repository per entity kind plus the tool-state map and the bulk
/// record store. Cloning shares the underlying repositories.
#[derive(Clone)]
pub struct Repositories {
    pub tools: Arc<dyn EntityRepository<Tool>>,
    pub knowledge_sources: Arc<dyn EntityRepository<KnowledgeSource>>,
    pub agents: Arc<dyn EntityRepository<Agent>>,
    pub tasks: Arc<dyn EntityRepository<Task>>,
    pub crews: Arc<dyn EntityRepository<Crew>>,
    pub results: Arc<dyn EntityRepository<CrewResult>>,
    pub tool_states: Arc<dyn ToolStateRepository>,
    pub records: Arc<dyn RecordStore>,
}
