//! SQLite implementation of the task repository.
//!
//! Context task lists are stored as JSON arrays of ids. They are soft
//! references: deleting a task strips it from every other task's context
//! instead of blocking.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::rows::{decode, expand_json_column, iter_rows, RowMap};
use super::{ensure_unreferenced, write_sql, Engine, Referrer, WriteMode};
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::{EntityKind, Serializable, Task, TaskRecord};
use crate::domain::ports::EntityRepository;

const COLUMNS: [&str; 9] = [
    "id",
    "description",
    "expected_output",
    "async_execution",
    "agent_id",
    "knowledge_source_id",
    "context_from_async_tasks_ids",
    "context_from_sync_tasks_ids",
    "created_at",
];

const CONTEXT_COLUMNS: [&str; 2] = ["context_from_async_tasks_ids", "context_from_sync_tasks_ids"];

const REFERRERS: [Referrer; 1] = [Referrer {
    kind: EntityKind::Crew,
    sql: "SELECT crew_id FROM crew_tasks WHERE task_id = ?",
}];

pub(crate) async fn store(
    conn: &mut SqliteConnection,
    record: &TaskRecord,
    mode: WriteMode,
) -> Result<u64, StudioError> {
    let async_ids = serde_json::to_string(&record.context_from_async_tasks_ids)?;
    let sync_ids = serde_json::to_string(&record.context_from_sync_tasks_ids)?;

    let sql = write_sql("tasks", &COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.description)
        .bind(&record.expected_output)
        .bind(record.async_execution)
        .bind(&record.agent_id)
        .bind(&record.knowledge_source_id)
        .bind(&async_ids)
        .bind(&sync_ids)
        .bind(&record.created_at)
        .execute(conn)
        .await
        .map_err(|e| StudioError::from_write(e, EntityKind::Task, &record.id))?;
    Ok(done.rows_affected())
}

fn task_from_row(map: DomainResult<RowMap>) -> DomainResult<Task> {
    let mut map = map?;
    for column in CONTEXT_COLUMNS {
        expand_json_column(&mut map, column)?;
    }
    Task::from_record(decode(map)?)
}

#[derive(Deserialize)]
struct ContextRow {
    id: String,
    context_from_async_tasks_ids: Vec<String>,
    context_from_sync_tasks_ids: Vec<String>,
}

/// Remove `task_id` from the context lists of every other task.
async fn strip_context_references(conn: &mut SqliteConnection, task_id: &str) -> DomainResult<usize> {
    let rows = sqlx::query(
        "SELECT id, context_from_async_tasks_ids, context_from_sync_tasks_ids FROM tasks
         WHERE context_from_async_tasks_ids LIKE ?1 OR context_from_sync_tasks_ids LIKE ?1",
    )
    .bind(format!("%{task_id}%"))
    .fetch_all(&mut *conn)
    .await?;

    let mut stripped = 0;
    for map in iter_rows(&rows) {
        let mut map = map?;
        for column in CONTEXT_COLUMNS {
            expand_json_column(&mut map, column)?;
        }
        let mut row: ContextRow = decode(map)?;
        row.context_from_async_tasks_ids.retain(|id| id != task_id);
        row.context_from_sync_tasks_ids.retain(|id| id != task_id);

        sqlx::query(
            "UPDATE tasks SET context_from_async_tasks_ids = ?, context_from_sync_tasks_ids = ? WHERE id = ?",
        )
        .bind(serde_json::to_string(&row.context_from_async_tasks_ids)?)
        .bind(serde_json::to_string(&row.context_from_sync_tasks_ids)?)
        .bind(&row.id)
        .execute(&mut *conn)
        .await?;
        stripped += 1;
    }
    Ok(stripped)
}

#[derive(Clone)]
pub struct SqliteTaskRepository {
    engine: Engine,
}

impl SqliteTaskRepository {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EntityRepository<Task> for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<Uuid> {
        task.validate().map_err(StudioError::Persistence)?;
        let record = task.to_record();

        let mut tx = self.engine.pool().begin().await?;
        store(&mut tx, &record, WriteMode::Insert).await?;
        tx.commit().await?;

        debug!(task_id = %task.id, agent_id = ?task.agent_id, "task created");
        Ok(task.id)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Task> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM tasks WHERE id = ?")
                        .bind(id.to_string())
                        .fetch_all(&mut *conn)
                        .await?;
                    let map = iter_rows(&rows)
                        .next()
                        .ok_or_else(|| StudioError::not_found(EntityKind::Task, id))?;
                    task_from_row(map)
                })
            })
            .await
    }

    async fn list(&self) -> DomainResult<Vec<Task>> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM tasks ORDER BY created_at, id")
                        .fetch_all(&mut *conn)
                        .await?;
                    iter_rows(&rows).map(task_from_row).collect()
                })
            })
            .await
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        task.validate().map_err(StudioError::Persistence)?;
        let record = task.to_record();

        let mut tx = self.engine.pool().begin().await?;
        if store(&mut tx, &record, WriteMode::Update).await? == 0 {
            return Err(StudioError::not_found(EntityKind::Task, task.id));
        }
        tx.commit().await?;

        debug!(task_id = %task.id, "task updated");
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let id_text = id.to_string();
        let mut tx = self.engine.pool().begin().await?;
        ensure_unreferenced(&mut tx, EntityKind::Task, &id_text, &REFERRERS).await?;

        let done = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(&id_text)
            .execute(&mut *tx)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Task, id))?;
        if done.rows_affected() == 0 {
            return Err(StudioError::not_found(EntityKind::Task, id));
        }
        let stripped = strip_context_references(&mut tx, &id_text).await?;
        tx.commit().await?;

        debug!(task_id = %id, stripped, "task deleted");
        Ok(())
    }
}
