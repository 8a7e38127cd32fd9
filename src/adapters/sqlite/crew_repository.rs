//! SQLite implementation of the crew repository.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

use super::rows::{decode, iter_rows, RowMap};
use super::{write_sql, Engine, LinkTable, WriteMode};
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::{Crew, CrewRecord, EntityKind, Serializable};
use crate::domain::ports::EntityRepository;

const COLUMNS: [&str; 12] = [
    "id",
    "name",
    "process",
    "verbose",
    "memory",
    "cache",
    "planning",
    "planning_llm",
    "max_rpm",
    "manager_llm",
    "manager_agent_id",
    "created_at",
];

/// Link tables with the record field each one fills.
const LINKS: [(LinkTable, &str); 3] = [
    (
        LinkTable {
            table: "crew_agents",
            owner: "crew_id",
            target: "agent_id",
        },
        "agent_ids",
    ),
    (
        LinkTable {
            table: "crew_tasks",
            owner: "crew_id",
            target: "task_id",
        },
        "task_ids",
    ),
    (
        LinkTable {
            table: "crew_knowledge_sources",
            owner: "crew_id",
            target: "knowledge_source_id",
        },
        "knowledge_source_ids",
    ),
];

fn link_targets<'r>(record: &'r CrewRecord, field: &str) -> &'r [String] {
    match field {
        "agent_ids" => &record.agent_ids,
        "task_ids" => &record.task_ids,
        _ => &record.knowledge_source_ids,
    }
}

pub(crate) async fn store(
    conn: &mut SqliteConnection,
    record: &CrewRecord,
    mode: WriteMode,
) -> Result<u64, sqlx::Error> {
    let sql = write_sql("crews", &COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.process)
        .bind(record.verbose)
        .bind(record.memory)
        .bind(record.cache)
        .bind(record.planning)
        .bind(&record.planning_llm)
        .bind(record.max_rpm)
        .bind(&record.manager_llm)
        .bind(&record.manager_agent_id)
        .bind(&record.created_at)
        .execute(&mut *conn)
        .await?;

    if done.rows_affected() > 0 {
        for (link, field) in &LINKS {
            link.replace(conn, &record.id, link_targets(record, field)).await?;
        }
    }
    Ok(done.rows_affected())
}

#[derive(Clone)]
pub struct SqliteCrewRepository {
    engine: Engine,
}

impl SqliteCrewRepository {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EntityRepository<Crew> for SqliteCrewRepository {
    async fn create(&self, crew: &Crew) -> DomainResult<Uuid> {
        crew.validate().map_err(StudioError::Persistence)?;
        let record = crew.to_record();

        let mut tx = self.engine.pool().begin().await?;
        store(&mut tx, &record, WriteMode::Insert)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Crew, crew.id))?;
        tx.commit().await?;

        debug!(
            crew_id = %crew.id,
            name = %crew.name,
            agents = crew.agent_ids.len(),
            tasks = crew.task_ids.len(),
            "crew created"
        );
        Ok(crew.id)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Crew> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let id_text = id.to_string();
                    let rows = sqlx::query("SELECT * FROM crews WHERE id = ?")
                        .bind(&id_text)
                        .fetch_all(&mut *conn)
                        .await?;
                    let mut map = iter_rows(&rows)
                        .next()
                        .ok_or_else(|| StudioError::not_found(EntityKind::Crew, id))??;

                    for (link, field) in &LINKS {
                        let targets = link.targets_of(conn, &id_text).await?;
                        map.insert((*field).to_string(), Value::from(targets));
                    }
                    Crew::from_record(decode(map)?)
                })
            })
            .await
    }

    async fn list(&self) -> DomainResult<Vec<Crew>> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM crews ORDER BY created_at, id")
                        .fetch_all(&mut *conn)
                        .await?;
                    let mut links: Vec<(&str, HashMap<String, Vec<String>>)> = Vec::with_capacity(LINKS.len());
                    for (link, field) in &LINKS {
                        links.push((*field, link.all(conn).await?));
                    }

                    iter_rows(&rows)
                        .map(|map| {
                            let mut map: RowMap = map?;
                            let id = map.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
                            for (field, targets) in &mut links {
                                let ids = targets.remove(&id).unwrap_or_default();
                                map.insert((*field).to_string(), Value::from(ids));
                            }
                            Crew::from_record(decode::<CrewRecord>(map)?)
                        })
                        .collect()
                })
            })
            .await
    }

    async fn update(&self, crew: &Crew) -> DomainResult<()> {
        crew.validate().map_err(StudioError::Persistence)?;
        let record = crew.to_record();

        let mut tx = self.engine.pool().begin().await?;
        let affected = store(&mut tx, &record, WriteMode::Update)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Crew, crew.id))?;
        if affected == 0 {
            return Err(StudioError::not_found(EntityKind::Crew, crew.id));
        }
        tx.commit().await?;

        debug!(crew_id = %crew.id, "crew updated");
        Ok(())
    }

    /// Crews are never referenced by other configuration; their results keep
    /// the crew name and lose the crew id.
    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let id_text = id.to_string();
        let mut tx = self.engine.pool().begin().await?;

        let detached: i64 = sqlx::query("SELECT COUNT(*) FROM results WHERE crew_id = ?")
            .bind(&id_text)
            .fetch_one(&mut *tx)
            .await?
            .try_get(0)?;

        let done = sqlx::query("DELETE FROM crews WHERE id = ?")
            .bind(&id_text)
            .execute(&mut *tx)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Crew, id))?;
        if done.rows_affected() == 0 {
            return Err(StudioError::not_found(EntityKind::Crew, id));
        }
        tx.commit().await?;

        info!(crew_id = %id, detached_results = detached, "crew deleted");
        Ok(())
    }
}
