//! Task domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{
    format_datetime, parse_datetime, parse_optional_uuid, parse_uuid, parse_uuids,
    uuids_to_strings,
};
use super::{Entity, EntityKind, Serializable};
use crate::domain::errors::DomainResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    pub expected_output: String,
    pub async_execution: bool,
    /// Owning agent. Unassigned tasks cannot be part of a runnable crew.
    pub agent_id: Option<Uuid>,
    pub knowledge_source_id: Option<Uuid>,
    /// Asynchronous tasks whose output feeds this task.
    pub context_from_async_tasks_ids: Vec<Uuid>,
    /// Synchronous tasks whose output feeds this task.
    pub context_from_sync_tasks_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(description: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            expected_output: expected_output.into(),
            async_execution: false,
            agent_id: None,
            knowledge_source_id: None,
            context_from_async_tasks_ids: Vec::new(),
            context_from_sync_tasks_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_agent(mut self, agent_id: Uuid) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_knowledge_source(mut self, source_id: Uuid) -> Self {
        self.knowledge_source_id = Some(source_id);
        self
    }

    /// All context task ids, asynchronous first.
    pub fn context_task_ids(&self) -> impl Iterator<Item = &Uuid> {
        self.context_from_async_tasks_ids
            .iter()
            .chain(self.context_from_sync_tasks_ids.iter())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("Task description cannot be empty".to_string());
        }
        if self.context_task_ids().any(|id| *id == self.id) {
            return Err("A task cannot use itself as context".to_string());
        }
        Ok(())
    }
}

/// Row shape of the `tasks` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub description: String,
    pub expected_output: String,
    pub async_execution: bool,
    pub agent_id: Option<String>,
    pub knowledge_source_id: Option<String>,
    #[serde(default)]
    pub context_from_async_tasks_ids: Vec<String>,
    #[serde(default)]
    pub context_from_sync_tasks_ids: Vec<String>,
    pub created_at: String,
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Serializable for Task {
    type Record = TaskRecord;

    fn to_record(&self) -> TaskRecord {
        TaskRecord {
            id: self.id.to_string(),
            description: self.description.clone(),
            expected_output: self.expected_output.clone(),
            async_execution: self.async_execution,
            agent_id: self.agent_id.map(|id| id.to_string()),
            knowledge_source_id: self.knowledge_source_id.map(|id| id.to_string()),
            context_from_async_tasks_ids: uuids_to_strings(&self.context_from_async_tasks_ids),
            context_from_sync_tasks_ids: uuids_to_strings(&self.context_from_sync_tasks_ids),
            created_at: format_datetime(&self.created_at),
        }
    }

    fn from_record(record: TaskRecord) -> DomainResult<Self> {
        Ok(Self {
            id: parse_uuid(&record.id)?,
            description: record.description,
            expected_output: record.expected_output,
            async_execution: record.async_execution,
            agent_id: parse_optional_uuid(record.agent_id.as_deref())?,
            knowledge_source_id: parse_optional_uuid(record.knowledge_source_id.as_deref())?,
            context_from_async_tasks_ids: parse_uuids(&record.context_from_async_tasks_ids)?,
            context_from_sync_tasks_ids: parse_uuids(&record.context_from_sync_tasks_ids)?,
            created_at: parse_datetime(&record.created_at)?,
        })
    }
}
