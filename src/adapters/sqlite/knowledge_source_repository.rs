//! SQLite implementation of the knowledge source repository.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::rows::{decode, iter_rows};
use super::{ensure_unreferenced, write_sql, Engine, Referrer, WriteMode};
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::{EntityKind, KnowledgeSource, KnowledgeSourceRecord, Serializable};
use crate::domain::ports::EntityRepository;

const COLUMNS: [&str; 9] = [
    "id",
    "name",
    "source_type",
    "source_path",
    "content",
    "metadata",
    "chunk_size",
    "chunk_overlap",
    "created_at",
];

const REFERRERS: [Referrer; 3] = [
    Referrer {
        kind: EntityKind::Agent,
        sql: "SELECT agent_id FROM agent_knowledge_sources WHERE knowledge_source_id = ?",
    },
    Referrer {
        kind: EntityKind::Task,
        sql: "SELECT id FROM tasks WHERE knowledge_source_id = ?",
    },
    Referrer {
        kind: EntityKind::Crew,
        sql: "SELECT crew_id FROM crew_knowledge_sources WHERE knowledge_source_id = ?",
    },
];

pub(crate) async fn store(
    conn: &mut SqliteConnection,
    record: &KnowledgeSourceRecord,
    mode: WriteMode,
) -> Result<u64, sqlx::Error> {
    let sql = write_sql("knowledge_sources", &COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.source_type)
        .bind(&record.source_path)
        .bind(&record.content)
        .bind(&record.metadata)
        .bind(record.chunk_size)
        .bind(record.chunk_overlap)
        .bind(&record.created_at)
        .execute(conn)
        .await?;
    Ok(done.rows_affected())
}

#[derive(Clone)]
pub struct SqliteKnowledgeSourceRepository {
    engine: Engine,
}

impl SqliteKnowledgeSourceRepository {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EntityRepository<KnowledgeSource> for SqliteKnowledgeSourceRepository {
    async fn create(&self, source: &KnowledgeSource) -> DomainResult<Uuid> {
        source.validate().map_err(StudioError::Persistence)?;
        let record = source.to_record();

        let mut tx = self.engine.pool().begin().await?;
        store(&mut tx, &record, WriteMode::Insert)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::KnowledgeSource, source.id))?;
        tx.commit().await?;

        debug!(knowledge_source_id = %source.id, source_type = source.source_type.as_str(), "knowledge source created");
        Ok(source.id)
    }

    async fn get(&self, id: Uuid) -> DomainResult<KnowledgeSource> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM knowledge_sources WHERE id = ?")
                        .bind(id.to_string())
                        .fetch_all(&mut *conn)
                        .await?;
                    let map = iter_rows(&rows)
                        .next()
                        .ok_or_else(|| StudioError::not_found(EntityKind::KnowledgeSource, id))??;
                    KnowledgeSource::from_record(decode(map)?)
                })
            })
            .await
    }

    async fn list(&self) -> DomainResult<Vec<KnowledgeSource>> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM knowledge_sources ORDER BY created_at, id")
                        .fetch_all(&mut *conn)
                        .await?;
                    iter_rows(&rows)
                        .map(|map| KnowledgeSource::from_record(decode(map?)?))
                        .collect()
                })
            })
            .await
    }

    async fn update(&self, source: &KnowledgeSource) -> DomainResult<()> {
        source.validate().map_err(StudioError::Persistence)?;
        let record = source.to_record();

        let mut tx = self.engine.pool().begin().await?;
        let affected = store(&mut tx, &record, WriteMode::Update)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::KnowledgeSource, source.id))?;
        if affected == 0 {
            return Err(StudioError::not_found(EntityKind::KnowledgeSource, source.id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let id_text = id.to_string();
        let mut tx = self.engine.pool().begin().await?;
        ensure_unreferenced(&mut tx, EntityKind::KnowledgeSource, &id_text, &REFERRERS).await?;

        let done = sqlx::query("DELETE FROM knowledge_sources WHERE id = ?")
            .bind(&id_text)
            .execute(&mut *tx)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::KnowledgeSource, id))?;
        if done.rows_affected() == 0 {
            return Err(StudioError::not_found(EntityKind::KnowledgeSource, id));
        }
        tx.commit().await?;

        debug!(knowledge_source_id = %id, "knowledge source deleted");
        Ok(())
    }
}
