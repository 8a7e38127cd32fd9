//! SQLite implementation of the crew result log.

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::rows::{decode, iter_rows};
use super::{write_sql, Engine, WriteMode};
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::{CrewResult, EntityKind, ResultRecord, Serializable};
use crate::domain::ports::EntityRepository;

const COLUMNS: [&str; 6] = ["id", "crew_id", "crew_name", "inputs", "result", "created_at"];

pub(crate) async fn store(
    conn: &mut SqliteConnection,
    record: &ResultRecord,
    mode: WriteMode,
) -> Result<u64, sqlx::Error> {
    let sql = write_sql("results", &COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.crew_id)
        .bind(&record.crew_name)
        .bind(&record.inputs)
        .bind(&record.result)
        .bind(&record.created_at)
        .execute(conn)
        .await?;
    Ok(done.rows_affected())
}

#[derive(Clone)]
pub struct SqliteResultRepository {
    engine: Engine,
}

impl SqliteResultRepository {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Results produced by one crew, newest first.
    pub async fn list_for_crew(&self, crew_id: Uuid) -> DomainResult<Vec<CrewResult>> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM results WHERE crew_id = ? ORDER BY created_at DESC, id DESC")
                        .bind(crew_id.to_string())
                        .fetch_all(&mut *conn)
                        .await?;
                    iter_rows(&rows)
                        .map(|map| CrewResult::from_record(decode(map?)?))
                        .collect()
                })
            })
            .await
    }
}

#[async_trait]
impl EntityRepository<CrewResult> for SqliteResultRepository {
    async fn create(&self, result: &CrewResult) -> DomainResult<Uuid> {
        let record = result.to_record();

        let mut tx = self.engine.pool().begin().await?;
        store(&mut tx, &record, WriteMode::Insert)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Result, result.id))?;
        tx.commit().await?;

        debug!(result_id = %result.id, crew = %result.crew_name, "result recorded");
        Ok(result.id)
    }

    async fn get(&self, id: Uuid) -> DomainResult<CrewResult> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM results WHERE id = ?")
                        .bind(id.to_string())
                        .fetch_all(&mut *conn)
                        .await?;
                    let map = iter_rows(&rows)
                        .next()
                        .ok_or_else(|| StudioError::not_found(EntityKind::Result, id))??;
                    CrewResult::from_record(decode(map)?)
                })
            })
            .await
    }

    async fn list(&self) -> DomainResult<Vec<CrewResult>> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM results ORDER BY created_at DESC, id DESC")
                        .fetch_all(&mut *conn)
                        .await?;
                    iter_rows(&rows)
                        .map(|map| CrewResult::from_record(decode::<ResultRecord>(map?)?))
                        .collect()
                })
            })
            .await
    }

    async fn update(&self, result: &CrewResult) -> DomainResult<()> {
        let record = result.to_record();

        let mut tx = self.engine.pool().begin().await?;
        let affected = store(&mut tx, &record, WriteMode::Update)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Result, result.id))?;
        if affected == 0 {
            return Err(StudioError::not_found(EntityKind::Result, result.id));
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let done = sqlx::query("DELETE FROM results WHERE id = ?")
            .bind(id.to_string())
            .execute(self.engine.pool())
            .await?;
        if done.rows_affected() == 0 {
            return Err(StudioError::not_found(EntityKind::Result, id));
        }
        debug!(result_id = %id, "result deleted");
        Ok(())
    }
}
