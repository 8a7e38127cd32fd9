//! Agent domain model.
//!
//! Agents reference tools and knowledge sources by id. The resolved form, with
//! shared references to the loaded tools, lives in [`super::snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::{format_datetime, parse_datetime, parse_uuid, parse_uuids, uuids_to_strings};
use super::{first_duplicate, Entity, EntityKind, Serializable};
use crate::domain::errors::{DomainResult, StudioError};

pub const DEFAULT_LLM: &str = "OpenAI: gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.1;
pub const DEFAULT_MAX_ITER: u32 = 25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub allow_delegation: bool,
    pub verbose: bool,
    pub cache: bool,
    /// `"<provider>: <model>"`.
    pub llm_provider_model: String,
    pub temperature: f64,
    pub max_iter: u32,
    pub tool_ids: Vec<Uuid>,
    pub knowledge_source_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.into(),
            goal: String::new(),
            backstory: String::new(),
            allow_delegation: false,
            verbose: true,
            cache: true,
            llm_provider_model: DEFAULT_LLM.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_iter: DEFAULT_MAX_ITER,
            tool_ids: Vec::new(),
            knowledge_source_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    pub fn with_tool(mut self, tool_id: Uuid) -> Self {
        if !self.tool_ids.contains(&tool_id) {
            self.tool_ids.push(tool_id);
        }
        self
    }

    pub fn with_knowledge_source(mut self, source_id: Uuid) -> Self {
        if !self.knowledge_source_ids.contains(&source_id) {
            self.knowledge_source_ids.push(source_id);
        }
        self
    }

    /// Split `llm_provider_model` into provider and model.
    pub fn llm_parts(&self) -> (&str, &str) {
        match self.llm_provider_model.split_once(':') {
            Some((provider, model)) => (provider.trim(), model.trim()),
            None => ("", self.llm_provider_model.trim()),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.role.trim().is_empty() {
            return Err("Agent role cannot be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("temperature {} must be between 0 and 2", self.temperature));
        }
        if self.max_iter == 0 {
            return Err("max_iter must be at least 1".to_string());
        }
        if let Some(id) = first_duplicate(&self.tool_ids) {
            return Err(format!("tool {id} is listed more than once"));
        }
        if let Some(id) = first_duplicate(&self.knowledge_source_ids) {
            return Err(format!("knowledge source {id} is listed more than once"));
        }
        Ok(())
    }
}

/// Row shape of the `agents` table plus its link tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub allow_delegation: bool,
    pub verbose: bool,
    pub cache: bool,
    pub llm_provider_model: String,
    pub temperature: f64,
    pub max_iter: i64,
    #[serde(default)]
    pub tool_ids: Vec<String>,
    #[serde(default)]
    pub knowledge_source_ids: Vec<String>,
    pub created_at: String,
}

impl Entity for Agent {
    const KIND: EntityKind = EntityKind::Agent;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Serializable for Agent {
    type Record = AgentRecord;

    fn to_record(&self) -> AgentRecord {
        AgentRecord {
            id: self.id.to_string(),
            role: self.role.clone(),
            goal: self.goal.clone(),
            backstory: self.backstory.clone(),
            allow_delegation: self.allow_delegation,
            verbose: self.verbose,
            cache: self.cache,
            llm_provider_model: self.llm_provider_model.clone(),
            temperature: self.temperature,
            max_iter: i64::from(self.max_iter),
            tool_ids: uuids_to_strings(&self.tool_ids),
            knowledge_source_ids: uuids_to_strings(&self.knowledge_source_ids),
            created_at: format_datetime(&self.created_at),
        }
    }

    fn from_record(record: AgentRecord) -> DomainResult<Self> {
        let max_iter = u32::try_from(record.max_iter)
            .map_err(|_| StudioError::Serialization(format!("Invalid max_iter: {}", record.max_iter)))?;

        Ok(Self {
            id: parse_uuid(&record.id)?,
            role: record.role,
            goal: record.goal,
            backstory: record.backstory,
            allow_delegation: record.allow_delegation,
            verbose: record.verbose,
            cache: record.cache,
            llm_provider_model: record.llm_provider_model,
            temperature: record.temperature,
            max_iter,
            tool_ids: parse_uuids(&record.tool_ids)?,
            knowledge_source_ids: parse_uuids(&record.knowledge_source_ids)?,
            created_at: parse_datetime(&record.created_at)?,
        })
    }
}
