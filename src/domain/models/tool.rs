//! Tool domain model.
//!
//! A tool is a configured instance of a tool class (for example
//! `ScrapeWebsiteTool`) that agents can be equipped with.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::record::{decode_map, encode_map, format_datetime, parse_datetime, parse_uuid};
use super::{Entity, EntityKind, Serializable};
use crate::domain::errors::DomainResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: Uuid,
    /// Tool class name.
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl Tool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            parameters: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Tool name cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Row shape of the `tools` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON object text.
    pub parameters: String,
    pub created_at: String,
}

impl Entity for Tool {
    const KIND: EntityKind = EntityKind::Tool;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Serializable for Tool {
    type Record = ToolRecord;

    fn to_record(&self) -> ToolRecord {
        ToolRecord {
            id: self.id.to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: encode_map(&self.parameters),
            created_at: format_datetime(&self.created_at),
        }
    }

    fn from_record(record: ToolRecord) -> DomainResult<Self> {
        Ok(Self {
            id: parse_uuid(&record.id)?,
            name: record.name,
            description: record.description,
            parameters: decode_map(&record.parameters)?,
            created_at: parse_datetime(&record.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_parameters() {
        let tool = Tool::new("SerperDevTool")
            .with_description("web search")
            .with_parameter("n_results", 5);
        assert_eq!(tool.parameters.get("n_results"), Some(&Value::from(5)));
        assert!(tool.validate().is_ok());
    }

    #[test]
    fn test_blank_name_is_invalid() {
        assert!(Tool::new("  ").validate().is_err());
    }

    #[test]
    fn test_record_roundtrip() {
        let tool = Tool::new("ScrapeWebsiteTool").with_parameter("website_url", "https://example.com");
        let back = Tool::from_record(tool.to_record()).unwrap();
        assert_eq!(back, tool);
    }
}
