//! All-or-nothing bulk upsert of entity records.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    agent_repository, crew_repository, knowledge_source_repository, result_repository, task_repository,
    tool_repository, Engine, WriteMode,
};
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::EntityRecord;
use crate::domain::ports::RecordStore;

#[derive(Clone)]
pub struct SqliteRecordStore {
    engine: Engine,
}

impl SqliteRecordStore {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn upsert_all(&self, records: &[EntityRecord]) -> DomainResult<usize> {
        let mut tx = self.engine.pool().begin().await?;
        let mode = WriteMode::Upsert;

        for record in records {
            let kind = record.kind();
            let failed = |e| StudioError::from_write(e, kind, record.id());
            match record {
                EntityRecord::Tool(r) => tool_repository::store(&mut tx, r, mode).await.map_err(failed)?,
                EntityRecord::KnowledgeSource(r) => {
                    knowledge_source_repository::store(&mut tx, r, mode).await.map_err(failed)?
                }
                EntityRecord::Agent(r) => agent_repository::store(&mut tx, r, mode).await.map_err(failed)?,
                EntityRecord::Task(r) => task_repository::store(&mut tx, r, mode).await?,
                EntityRecord::Crew(r) => crew_repository::store(&mut tx, r, mode).await.map_err(failed)?,
                EntityRecord::Result(r) => result_repository::store(&mut tx, r, mode).await.map_err(failed)?,
            };
            debug!(kind = %kind, id = record.id(), "record upserted");
        }

        tx.commit().await?;
        info!(count = records.len(), "records imported");
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{SqliteAgentRepository, SqliteToolRepository};
    use crate::domain::models::{Agent, Serializable, Tool};
    use crate::domain::ports::EntityRepository;

    #[tokio::test]
    async fn test_upsert_inserts_then_replaces() {
        let engine = Engine::in_memory().await.unwrap();
        let store = SqliteRecordStore::new(engine.clone());
        let tools = SqliteToolRepository::new(engine.clone());
        let agents = SqliteAgentRepository::new(engine);

        let mut tool = Tool::new("search");
        let agent = Agent::new("researcher").with_tool(tool.id);
        let records = vec![
            EntityRecord::Tool(tool.to_record()),
            EntityRecord::Agent(agent.to_record()),
        ];
        assert_eq!(store.upsert_all(&records).await.unwrap(), 2);

        tool.description = "renamed in place".to_string();
        store.upsert_all(&[EntityRecord::Tool(tool.to_record())]).await.unwrap();

        assert_eq!(tools.get(tool.id).await.unwrap(), tool);
        assert_eq!(agents.get(agent.id).await.unwrap(), agent);
    }

    #[tokio::test]
    async fn test_failure_rolls_back_everything() {
        let engine = Engine::in_memory().await.unwrap();
        let store = SqliteRecordStore::new(engine.clone());
        let tools = SqliteToolRepository::new(engine);

        let tool = Tool::new("search");
        // The agent points at a tool that is not in the batch.
        let agent = Agent::new("researcher").with_tool(uuid::Uuid::new_v4());
        let records = vec![
            EntityRecord::Tool(tool.to_record()),
            EntityRecord::Agent(agent.to_record()),
        ];

        let err = store.upsert_all(&records).await.unwrap_err();
        assert!(matches!(err, StudioError::Persistence(_)));
        assert!(tools.list().await.unwrap().is_empty());
    }
}
