//! Knowledge source domain model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::record::{decode_map, encode_map, format_datetime, parse_datetime, parse_uuid};
use super::{Entity, EntityKind, Serializable};
use crate::domain::errors::{DomainResult, StudioError};

pub const DEFAULT_CHUNK_SIZE: u32 = 4000;
pub const DEFAULT_CHUNK_OVERLAP: u32 = 200;

/// Where the knowledge comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Inline text stored in `content`.
    #[default]
    Text,
    File,
    Url,
    Csv,
    Excel,
    Json,
    Pdf,
    Docling,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
            Self::Url => "url",
            Self::Csv => "csv",
            Self::Excel => "excel",
            Self::Json => "json",
            Self::Pdf => "pdf",
            Self::Docling => "docling",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "string" => Some(Self::Text),
            "file" | "text_file" => Some(Self::File),
            "url" => Some(Self::Url),
            "csv" => Some(Self::Csv),
            "excel" | "xlsx" => Some(Self::Excel),
            "json" => Some(Self::Json),
            "pdf" => Some(Self::Pdf),
            "docling" => Some(Self::Docling),
            _ => None,
        }
    }

    /// Whether the source is read from `source_path` rather than `content`.
    pub const fn is_path_based(&self) -> bool {
        !matches!(self, Self::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: Uuid,
    pub name: String,
    pub source_type: SourceType,
    pub source_path: Option<String>,
    pub content: Option<String>,
    pub metadata: BTreeMap<String, Value>,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeSource {
    pub fn new(name: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            source_type,
            source_path: None,
            content: None,
            metadata: BTreeMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            created_at: Utc::now(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Knowledge source name cannot be empty".to_string());
        }
        if self.chunk_size == 0 {
            return Err("chunk_size must be positive".to_string());
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            ));
        }
        if self.source_type.is_path_based() && self.source_path.as_deref().map_or(true, str::is_empty) {
            return Err(format!("{} sources need a path", self.source_type.as_str()));
        }
        if !self.source_type.is_path_based() && self.content.as_deref().map_or(true, str::is_empty) {
            return Err("text sources need content".to_string());
        }
        Ok(())
    }
}

/// Row shape of the `knowledge_sources` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSourceRecord {
    pub id: String,
    pub name: String,
    pub source_type: String,
    pub source_path: Option<String>,
    pub content: Option<String>,
    pub metadata: String,
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    pub created_at: String,
}

impl Entity for KnowledgeSource {
    const KIND: EntityKind = EntityKind::KnowledgeSource;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Serializable for KnowledgeSource {
    type Record = KnowledgeSourceRecord;

    fn to_record(&self) -> KnowledgeSourceRecord {
        KnowledgeSourceRecord {
            id: self.id.to_string(),
            name: self.name.clone(),
            source_type: self.source_type.as_str().to_string(),
            source_path: self.source_path.clone(),
            content: self.content.clone(),
            metadata: encode_map(&self.metadata),
            chunk_size: i64::from(self.chunk_size),
            chunk_overlap: i64::from(self.chunk_overlap),
            created_at: format_datetime(&self.created_at),
        }
    }

    fn from_record(record: KnowledgeSourceRecord) -> DomainResult<Self> {
        let source_type = SourceType::from_str(&record.source_type).ok_or_else(|| {
            StudioError::Serialization(format!("Invalid source type: {}", record.source_type))
        })?;
        let chunk = |v: i64, field: &str| {
            u32::try_from(v)
                .map_err(|_| StudioError::Serialization(format!("Invalid {field}: {v}")))
        };

        Ok(Self {
            id: parse_uuid(&record.id)?,
            name: record.name,
            source_type,
            source_path: record.source_path,
            content: record.content,
            metadata: decode_map(&record.metadata)?,
            chunk_size: chunk(record.chunk_size, "chunk_size")?,
            chunk_overlap: chunk(record.chunk_overlap, "chunk_overlap")?,
            created_at: parse_datetime(&record.created_at)?,
        })
    }
}
