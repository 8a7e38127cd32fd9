//! Domain models for CrewAI Studio.
//!
//! Every persisted entity implements [`Serializable`], which converts between
//! the in-memory model (typed ids, enums, timestamps) and the flat record that
//! the repositories store and the import/export format carries.

pub mod agent;
pub mod config;
pub mod crew;
pub mod knowledge_source;
pub mod record;
pub mod result;
pub mod snapshot;
pub mod task;
pub mod tool;

use std::collections::HashSet;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainResult;

pub use agent::{Agent, AgentRecord};
pub use config::{AgentOpsSettings, DatabaseSettings, LogFormat, LoggingSettings, Settings};
pub use crew::{Crew, CrewRecord, Process};
pub use knowledge_source::{KnowledgeSource, KnowledgeSourceRecord, SourceType};
pub use record::EntityRecord;
pub use result::{CrewResult, ResultRecord};
pub use snapshot::{
    AgentRunSpec, CrewRunSpec, LoadedEntities, ResolvedAgent, ResolvedCrew, ResolvedTask,
    TaskRunSpec,
};
pub use task::{Task, TaskRecord};
pub use tool::{Tool, ToolRecord};

/// The persisted entity kinds, in dependency (load) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Tool,
    KnowledgeSource,
    Agent,
    Task,
    Crew,
    Result,
}

impl EntityKind {
    /// All kinds, parents before dependents.
    pub const LOAD_ORDER: [Self; 6] = [
        Self::Tool,
        Self::KnowledgeSource,
        Self::Agent,
        Self::Task,
        Self::Crew,
        Self::Result,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::KnowledgeSource => "knowledge_source",
            Self::Agent => "agent",
            Self::Task => "task",
            Self::Crew => "crew",
            Self::Result => "result",
        }
    }

    /// Table holding this kind's main rows.
    pub const fn table(&self) -> &'static str {
        match self {
            Self::Tool => "tools",
            Self::KnowledgeSource => "knowledge_sources",
            Self::Agent => "agents",
            Self::Task => "tasks",
            Self::Crew => "crews",
            Self::Result => "results",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "tool" => Some(Self::Tool),
            "knowledge_source" | "knowledge" => Some(Self::KnowledgeSource),
            "agent" => Some(Self::Agent),
            "task" => Some(Self::Task),
            "crew" => Some(Self::Crew),
            "result" => Some(Self::Result),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KnowledgeSource => write!(f, "knowledge source"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Identity shared by every persisted entity.
pub trait Entity {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
}

/// Conversion between a model and its persistence record.
///
/// `from_record(to_record(x)) == x` holds for every valid `x`.
pub trait Serializable: Entity + Sized {
    type Record: Serialize + DeserializeOwned + Clone + PartialEq + fmt::Debug + Send + Sync;

    fn to_record(&self) -> Self::Record;

    fn from_record(record: Self::Record) -> DomainResult<Self>;
}

/// First id that appears more than once in `ids`.
pub(crate) fn first_duplicate(ids: &[Uuid]) -> Option<Uuid> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().find(|id| !seen.insert(*id))
}
