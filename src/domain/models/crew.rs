//! Crew domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{
    format_datetime, parse_datetime, parse_optional_uuid, parse_uuid, parse_uuids,
    uuids_to_strings,
};
use super::{first_duplicate, Entity, EntityKind, Serializable};
use crate::domain::errors::{DomainResult, StudioError};

/// How a crew schedules its tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Process {
    /// Tasks run in list order.
    #[default]
    Sequential,
    /// A manager LLM or agent delegates tasks.
    Hierarchical,
}

impl Process {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Hierarchical => "hierarchical",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sequential" => Some(Self::Sequential),
            "hierarchical" => Some(Self::Hierarchical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crew {
    pub id: Uuid,
    pub name: String,
    pub process: Process,
    pub verbose: bool,
    pub agent_ids: Vec<Uuid>,
    /// Execution order for sequential crews.
    pub task_ids: Vec<Uuid>,
    pub memory: bool,
    pub cache: bool,
    pub planning: bool,
    pub planning_llm: Option<String>,
    pub max_rpm: Option<u32>,
    pub manager_llm: Option<String>,
    pub manager_agent_id: Option<Uuid>,
    pub knowledge_source_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Crew {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            process: Process::Sequential,
            verbose: true,
            agent_ids: Vec::new(),
            task_ids: Vec::new(),
            memory: false,
            cache: true,
            planning: false,
            planning_llm: None,
            max_rpm: None,
            manager_llm: None,
            manager_agent_id: None,
            knowledge_source_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    pub fn with_agent(mut self, agent_id: Uuid) -> Self {
        if !self.agent_ids.contains(&agent_id) {
            self.agent_ids.push(agent_id);
        }
        self
    }

    pub fn with_task(mut self, task_id: Uuid) -> Self {
        if !self.task_ids.contains(&task_id) {
            self.task_ids.push(task_id);
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Crew name cannot be empty".to_string());
        }
        if self.process == Process::Hierarchical
            && self.manager_llm.is_none()
            && self.manager_agent_id.is_none()
        {
            return Err("Hierarchical crews need a manager LLM or a manager agent".to_string());
        }
        if self.process == Process::Sequential && self.manager_agent_id.is_some() {
            return Err("Only hierarchical crews can have a manager agent".to_string());
        }
        if let Some(manager) = self.manager_agent_id {
            if self.agent_ids.contains(&manager) {
                return Err("The manager agent cannot also be a crew member".to_string());
            }
        }
        for (label, ids) in [
            ("agent", &self.agent_ids),
            ("task", &self.task_ids),
            ("knowledge source", &self.knowledge_source_ids),
        ] {
            if let Some(id) = first_duplicate(ids) {
                return Err(format!("{label} {id} is listed more than once"));
            }
        }
        Ok(())
    }
}

/// Row shape of the `crews` table plus its link tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewRecord {
    pub id: String,
    pub name: String,
    pub process: String,
    pub verbose: bool,
    #[serde(default)]
    pub agent_ids: Vec<String>,
    #[serde(default)]
    pub task_ids: Vec<String>,
    pub memory: bool,
    pub cache: bool,
    pub planning: bool,
    pub planning_llm: Option<String>,
    pub max_rpm: Option<i64>,
    pub manager_llm: Option<String>,
    pub manager_agent_id: Option<String>,
    #[serde(default)]
    pub knowledge_source_ids: Vec<String>,
    pub created_at: String,
}

impl Entity for Crew {
    const KIND: EntityKind = EntityKind::Crew;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Serializable for Crew {
    type Record = CrewRecord;

    fn to_record(&self) -> CrewRecord {
        CrewRecord {
            id: self.id.to_string(),
            name: self.name.clone(),
            process: self.process.as_str().to_string(),
            verbose: self.verbose,
            agent_ids: uuids_to_strings(&self.agent_ids),
            task_ids: uuids_to_strings(&self.task_ids),
            memory: self.memory,
            cache: self.cache,
            planning: self.planning,
            planning_llm: self.planning_llm.clone(),
            max_rpm: self.max_rpm.map(i64::from),
            manager_llm: self.manager_llm.clone(),
            manager_agent_id: self.manager_agent_id.map(|id| id.to_string()),
            knowledge_source_ids: uuids_to_strings(&self.knowledge_source_ids),
            created_at: format_datetime(&self.created_at),
        }
    }

    fn from_record(record: CrewRecord) -> DomainResult<Self> {
        let process = Process::from_str(&record.process)
            .ok_or_else(|| StudioError::Serialization(format!("Invalid process: {}", record.process)))?;
        let max_rpm = record
            .max_rpm
            .map(|v| {
                u32::try_from(v).map_err(|_| StudioError::Serialization(format!("Invalid max_rpm: {v}")))
            })
            .transpose()?;

        Ok(Self {
            id: parse_uuid(&record.id)?,
            name: record.name,
            process,
            verbose: record.verbose,
            agent_ids: parse_uuids(&record.agent_ids)?,
            task_ids: parse_uuids(&record.task_ids)?,
            memory: record.memory,
            cache: record.cache,
            planning: record.planning,
            planning_llm: record.planning_llm,
            max_rpm,
            manager_llm: record.manager_llm,
            manager_agent_id: parse_optional_uuid(record.manager_agent_id.as_deref())?,
            knowledge_source_ids: parse_uuids(&record.knowledge_source_ids)?,
            created_at: parse_datetime(&record.created_at)?,
        })
    }
}
