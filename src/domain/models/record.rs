//! Persistence record helpers and the tagged record union.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{
    AgentRecord, CrewRecord, EntityKind, KnowledgeSourceRecord, ResultRecord, TaskRecord,
    ToolRecord,
};
use crate::domain::errors::{DomainResult, StudioError};

/// One persisted entity of any kind, as carried by the export format:
/// `{"entity_type": "agent", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "data", rename_all = "snake_case")]
pub enum EntityRecord {
    Tool(ToolRecord),
    KnowledgeSource(KnowledgeSourceRecord),
    Agent(AgentRecord),
    Task(TaskRecord),
    Crew(CrewRecord),
    Result(ResultRecord),
}

impl EntityRecord {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Tool(_) => EntityKind::Tool,
            Self::KnowledgeSource(_) => EntityKind::KnowledgeSource,
            Self::Agent(_) => EntityKind::Agent,
            Self::Task(_) => EntityKind::Task,
            Self::Crew(_) => EntityKind::Crew,
            Self::Result(_) => EntityKind::Result,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Tool(r) => &r.id,
            Self::KnowledgeSource(r) => &r.id,
            Self::Agent(r) => &r.id,
            Self::Task(r) => &r.id,
            Self::Crew(r) => &r.id,
            Self::Result(r) => &r.id,
        }
    }
}

/// Parse a UUID stored as text.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| StudioError::Serialization(format!("invalid id '{s}': {e}")))
}

pub fn parse_optional_uuid(s: Option<&str>) -> DomainResult<Option<Uuid>> {
    s.map(parse_uuid).transpose()
}

pub fn parse_uuids(ids: &[String]) -> DomainResult<Vec<Uuid>> {
    ids.iter().map(|s| parse_uuid(s)).collect()
}

pub fn uuids_to_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

/// Timestamps are stored with fixed nanosecond precision so that text order
/// matches chronological order and values round-trip exactly.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StudioError::Serialization(format!("invalid timestamp '{s}': {e}")))
}

/// Encode a key/value mapping as a JSON object string.
pub fn encode_map(map: &BTreeMap<String, Value>) -> String {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()).to_string()
}

/// Decode a JSON object string. An empty string decodes to an empty map.
pub fn decode_map(s: &str) -> DomainResult<BTreeMap<String, Value>> {
    if s.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_datetime_text_order_is_chronological() {
        let whole = Utc.timestamp_opt(1_700_000_005, 0).unwrap();
        let fractional = Utc.timestamp_opt(1_700_000_005, 100_000_000).unwrap();
        let later = Utc.timestamp_opt(1_700_000_006, 0).unwrap();

        let mut texts = vec![
            format_datetime(&later),
            format_datetime(&fractional),
            format_datetime(&whole),
        ];
        texts.sort();
        assert_eq!(
            texts,
            vec![
                format_datetime(&whole),
                format_datetime(&fractional),
                format_datetime(&later)
            ]
        );
    }

    #[test]
    fn test_datetime_roundtrip_keeps_nanoseconds() {
        let dt = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        assert_eq!(parse_datetime(&format_datetime(&dt)).unwrap(), dt);
    }

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(matches!(parse_uuid("A_123"), Err(StudioError::Serialization(_))));
    }

    #[test]
    fn test_decode_empty_map() {
        assert!(decode_map("").unwrap().is_empty());
        let map = decode_map(r#"{"k": 1}"#).unwrap();
        assert_eq!(map.get("k"), Some(&Value::from(1)));
    }

    #[test]
    fn test_entity_record_tagging() {
        let record = EntityRecord::Tool(ToolRecord {
            id: Uuid::nil().to_string(),
            name: "SerperDevTool".to_string(),
            description: String::new(),
            parameters: "{}".to_string(),
            created_at: "2024-01-01T00:00:00.000000000Z".to_string(),
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["entity_type"], "tool");
        assert_eq!(json["data"]["name"], "SerperDevTool");

        let back: EntityRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.kind(), EntityKind::Tool);
    }
}
