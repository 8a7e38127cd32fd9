//! Crew run results.
//!
//! Results form an append-only log. They keep the crew name so the entry stays
//! readable after the crew itself is deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::record::{format_datetime, parse_datetime, parse_optional_uuid, parse_uuid};
use super::{Entity, EntityKind, Serializable};
use crate::domain::errors::DomainResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewResult {
    pub id: Uuid,
    /// `None` once the crew has been deleted.
    pub crew_id: Option<Uuid>,
    pub crew_name: String,
    pub inputs: BTreeMap<String, String>,
    /// Output payload as produced by the run.
    pub result: Value,
    pub created_at: DateTime<Utc>,
}

impl CrewResult {
    pub fn new(crew_id: Uuid, crew_name: impl Into<String>, result: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            crew_id: Some(crew_id),
            crew_name: crew_name.into(),
            inputs: BTreeMap::new(),
            result,
            created_at: Utc::now(),
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    /// The raw text output, when the payload carries one.
    pub fn raw_output(&self) -> Option<&str> {
        match &self.result {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("raw").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Row shape of the `results` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub crew_id: Option<String>,
    pub crew_name: String,
    /// JSON object text.
    pub inputs: String,
    /// JSON text.
    pub result: String,
    pub created_at: String,
}

impl Entity for CrewResult {
    const KIND: EntityKind = EntityKind::Result;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Serializable for CrewResult {
    type Record = ResultRecord;

    fn to_record(&self) -> ResultRecord {
        let inputs: serde_json::Map<String, Value> = self
            .inputs
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        ResultRecord {
            id: self.id.to_string(),
            crew_id: self.crew_id.map(|id| id.to_string()),
            crew_name: self.crew_name.clone(),
            inputs: Value::Object(inputs).to_string(),
            result: self.result.to_string(),
            created_at: format_datetime(&self.created_at),
        }
    }

    fn from_record(record: ResultRecord) -> DomainResult<Self> {
        Ok(Self {
            id: parse_uuid(&record.id)?,
            crew_id: parse_optional_uuid(record.crew_id.as_deref())?,
            crew_name: record.crew_name,
            inputs: serde_json::from_str(&record.inputs)?,
            result: serde_json::from_str(&record.result)?,
            created_at: parse_datetime(&record.created_at)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_output() {
        let crew = Uuid::new_v4();
        let object = CrewResult::new(crew, "c", json!({"raw": "done", "token_usage": 12}));
        assert_eq!(object.raw_output(), Some("done"));
        let text = CrewResult::new(crew, "c", json!("plain"));
        assert_eq!(text.raw_output(), Some("plain"));
        let number = CrewResult::new(crew, "c", json!(3));
        assert_eq!(number.raw_output(), None);
    }

    #[test]
    fn test_record_roundtrip_with_inputs() {
        let result = CrewResult::new(Uuid::new_v4(), "research-crew", json!({"raw": "ok"}))
            .with_input("topic", "rust");
        let back = CrewResult::from_record(result.to_record()).unwrap();
        assert_eq!(back, result);
    }
}
