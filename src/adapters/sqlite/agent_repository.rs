//! SQLite implementation of the agent repository.
//!
//! An agent's tools and knowledge sources live in ordered link tables and are
//! written in the same transaction as the agent row.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::rows::{decode, iter_rows, RowMap};
use super::{ensure_unreferenced, write_sql, Engine, LinkTable, Referrer, WriteMode};
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::{Agent, AgentRecord, EntityKind, Serializable};
use crate::domain::ports::EntityRepository;

const COLUMNS: [&str; 11] = [
    "id",
    "role",
    "goal",
    "backstory",
    "allow_delegation",
    "verbose",
    "cache",
    "llm_provider_model",
    "temperature",
    "max_iter",
    "created_at",
];

const TOOLS: LinkTable = LinkTable {
    table: "agent_tools",
    owner: "agent_id",
    target: "tool_id",
};

const KNOWLEDGE_SOURCES: LinkTable = LinkTable {
    table: "agent_knowledge_sources",
    owner: "agent_id",
    target: "knowledge_source_id",
};

const REFERRERS: [Referrer; 3] = [
    Referrer {
        kind: EntityKind::Task,
        sql: "SELECT id FROM tasks WHERE agent_id = ?",
    },
    Referrer {
        kind: EntityKind::Crew,
        sql: "SELECT crew_id FROM crew_agents WHERE agent_id = ?",
    },
    Referrer {
        kind: EntityKind::Crew,
        sql: "SELECT id FROM crews WHERE manager_agent_id = ?",
    },
];

/// Write the agent row and, when it was written, its links.
pub(crate) async fn store(
    conn: &mut SqliteConnection,
    record: &AgentRecord,
    mode: WriteMode,
) -> Result<u64, sqlx::Error> {
    let sql = write_sql("agents", &COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.role)
        .bind(&record.goal)
        .bind(&record.backstory)
        .bind(record.allow_delegation)
        .bind(record.verbose)
        .bind(record.cache)
        .bind(&record.llm_provider_model)
        .bind(record.temperature)
        .bind(record.max_iter)
        .bind(&record.created_at)
        .execute(&mut *conn)
        .await?;

    if done.rows_affected() > 0 {
        TOOLS.replace(conn, &record.id, &record.tool_ids).await?;
        KNOWLEDGE_SOURCES
            .replace(conn, &record.id, &record.knowledge_source_ids)
            .await?;
    }
    Ok(done.rows_affected())
}

fn with_links(mut map: RowMap, tool_ids: Vec<String>, knowledge_source_ids: Vec<String>) -> RowMap {
    map.insert("tool_ids".to_string(), Value::from(tool_ids));
    map.insert("knowledge_source_ids".to_string(), Value::from(knowledge_source_ids));
    map
}

#[derive(Clone)]
pub struct SqliteAgentRepository {
    engine: Engine,
}

impl SqliteAgentRepository {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EntityRepository<Agent> for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> DomainResult<Uuid> {
        agent.validate().map_err(StudioError::Persistence)?;
        let record = agent.to_record();

        let mut tx = self.engine.pool().begin().await?;
        store(&mut tx, &record, WriteMode::Insert)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Agent, agent.id))?;
        tx.commit().await?;

        debug!(agent_id = %agent.id, role = %agent.role, tools = agent.tool_ids.len(), "agent created");
        Ok(agent.id)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Agent> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let id_text = id.to_string();
                    let rows = sqlx::query("SELECT * FROM agents WHERE id = ?")
                        .bind(&id_text)
                        .fetch_all(&mut *conn)
                        .await?;
                    let map = iter_rows(&rows)
                        .next()
                        .ok_or_else(|| StudioError::not_found(EntityKind::Agent, id))??;

                    let tool_ids = TOOLS.targets_of(conn, &id_text).await?;
                    let source_ids = KNOWLEDGE_SOURCES.targets_of(conn, &id_text).await?;
                    Agent::from_record(decode(with_links(map, tool_ids, source_ids))?)
                })
            })
            .await
    }

    async fn list(&self) -> DomainResult<Vec<Agent>> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM agents ORDER BY created_at, id")
                        .fetch_all(&mut *conn)
                        .await?;
                    let mut tools = TOOLS.all(conn).await?;
                    let mut sources = KNOWLEDGE_SOURCES.all(conn).await?;

                    iter_rows(&rows)
                        .map(|map| {
                            let map = map?;
                            let id = map.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                            let map = with_links(
                                map,
                                tools.remove(&id).unwrap_or_default(),
                                sources.remove(&id).unwrap_or_default(),
                            );
                            Agent::from_record(decode::<AgentRecord>(map)?)
                        })
                        .collect()
                })
            })
            .await
    }

    async fn update(&self, agent: &Agent) -> DomainResult<()> {
        agent.validate().map_err(StudioError::Persistence)?;
        let record = agent.to_record();

        let mut tx = self.engine.pool().begin().await?;
        let affected = store(&mut tx, &record, WriteMode::Update)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Agent, agent.id))?;
        if affected == 0 {
            return Err(StudioError::not_found(EntityKind::Agent, agent.id));
        }
        tx.commit().await?;

        debug!(agent_id = %agent.id, "agent updated");
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let id_text = id.to_string();
        let mut tx = self.engine.pool().begin().await?;
        ensure_unreferenced(&mut tx, EntityKind::Agent, &id_text, &REFERRERS).await?;

        // Link rows owned by the agent go with it (ON DELETE CASCADE).
        let done = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(&id_text)
            .execute(&mut *tx)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Agent, id))?;
        if done.rows_affected() == 0 {
            return Err(StudioError::not_found(EntityKind::Agent, id));
        }
        tx.commit().await?;

        debug!(agent_id = %id, "agent deleted");
        Ok(())
    }
}
