//! JSON export and import of the whole studio configuration.
//!
//! The file is a JSON array of `{"entity_type": ..., "data": {...}}` objects,
//! written parents first so it can be replayed in order.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, instrument};

use super::Repositories;
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::{
    Agent, Crew, CrewResult, EntityKind, EntityRecord, KnowledgeSource, Serializable, Task, Tool,
};

/// Records written or read per entity kind.
pub type TransferSummary = BTreeMap<EntityKind, usize>;

pub struct TransferService {
    repos: Repositories,
}

impl TransferService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Every stored entity as records, in dependency order.
    pub async fn export_records(&self) -> DomainResult<Vec<EntityRecord>> {
        let mut records = Vec::new();
        records.extend(self.repos.tools.list().await?.iter().map(|e| EntityRecord::Tool(e.to_record())));
        records.extend(
            self.repos
                .knowledge_sources
                .list()
                .await?
                .iter()
                .map(|e| EntityRecord::KnowledgeSource(e.to_record())),
        );
        records.extend(self.repos.agents.list().await?.iter().map(|e| EntityRecord::Agent(e.to_record())));
        records.extend(self.repos.tasks.list().await?.iter().map(|e| EntityRecord::Task(e.to_record())));
        records.extend(self.repos.crews.list().await?.iter().map(|e| EntityRecord::Crew(e.to_record())));
        records.extend(self.repos.results.list().await?.iter().rev().map(|e| EntityRecord::Result(e.to_record())));
        Ok(records)
    }

    #[instrument(skip_all)]
    pub async fn export_to(&self, path: impl AsRef<Path>) -> DomainResult<TransferSummary> {
        let path = path.as_ref();
        let records = self.export_records().await?;
        let json = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| StudioError::Persistence(format!("cannot write {}: {e}", path.display())))?;

        let summary = summarize(&records);
        info!(path = %path.display(), records = records.len(), "configuration exported");
        Ok(summary)
    }

    /// Check records and write them, parents first, as one unit.
    pub async fn import_records(&self, mut records: Vec<EntityRecord>) -> DomainResult<TransferSummary> {
        for record in &records {
            check_record(record)?;
        }
        // Stable: keeps the file order within a kind.
        records.sort_by_key(EntityRecord::kind);

        self.repos.records.upsert_all(&records).await?;
        Ok(summarize(&records))
    }

    #[instrument(skip_all)]
    pub async fn import_from(&self, path: impl AsRef<Path>) -> DomainResult<TransferSummary> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StudioError::Persistence(format!("cannot read {}: {e}", path.display())))?;
        let records: Vec<EntityRecord> = serde_json::from_str(&text)?;

        let summary = self.import_records(records).await?;
        info!(path = %path.display(), records = summary.values().sum::<usize>(), "configuration imported");
        Ok(summary)
    }
}

/// Reject records that would not load back into a valid model.
fn check_record(record: &EntityRecord) -> DomainResult<()> {
    let invalid = |reason: String| {
        StudioError::Serialization(format!("{} {}: {reason}", record.kind(), record.id()))
    };
    match record {
        EntityRecord::Tool(r) => Tool::from_record(r.clone())?.validate().map_err(invalid),
        EntityRecord::KnowledgeSource(r) => KnowledgeSource::from_record(r.clone())?.validate().map_err(invalid),
        EntityRecord::Agent(r) => Agent::from_record(r.clone())?.validate().map_err(invalid),
        EntityRecord::Task(r) => Task::from_record(r.clone())?.validate().map_err(invalid),
        EntityRecord::Crew(r) => Crew::from_record(r.clone())?.validate().map_err(invalid),
        EntityRecord::Result(r) => CrewResult::from_record(r.clone()).map(|_| ()),
    }
}

fn summarize(records: &[EntityRecord]) -> TransferSummary {
    let mut summary = TransferSummary::new();
    for record in records {
        *summary.entry(record.kind()).or_default() += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{repositories, Engine};
    use crate::domain::models::{AgentRecord, ToolRecord};

    async fn service() -> TransferService {
        let engine = Engine::in_memory().await.unwrap();
        TransferService::new(repositories(&engine))
    }

    #[tokio::test]
    async fn test_import_sorts_parents_first() {
        let svc = service().await;
        let tool = Tool::new("search");
        let agent = Agent::new("researcher").with_tool(tool.id);

        // Child listed before its parent.
        let records = vec![EntityRecord::Agent(agent.to_record()), EntityRecord::Tool(tool.to_record())];
        let summary = svc.import_records(records).await.unwrap();

        assert_eq!(summary.get(&EntityKind::Tool), Some(&1));
        assert_eq!(summary.get(&EntityKind::Agent), Some(&1));
        assert_eq!(svc.repos.agents.get(agent.id).await.unwrap(), agent);
    }

    #[tokio::test]
    async fn test_malformed_record_is_rejected_before_writing() {
        let svc = service().await;
        let good = Tool::new("search").to_record();
        let bad = ToolRecord {
            id: "not-a-uuid".to_string(),
            ..good.clone()
        };

        let err = svc
            .import_records(vec![EntityRecord::Tool(good), EntityRecord::Tool(bad)])
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::Serialization(_)));
        assert!(svc.repos.tools.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_model_is_rejected() {
        let svc = service().await;
        let record = AgentRecord {
            temperature: 5.0,
            ..Agent::new("hot").to_record()
        };
        let err = svc.import_records(vec![EntityRecord::Agent(record)]).await.unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[tokio::test]
    async fn test_import_missing_file() {
        let svc = service().await;
        let err = svc.import_from("/definitely/not/here.json").await.unwrap_err();
        assert!(matches!(err, StudioError::Persistence(ref msg) if msg.contains("cannot read")));
    }
}
