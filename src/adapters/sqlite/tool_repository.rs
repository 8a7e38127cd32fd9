//! SQLite implementation of the tool repository and the tool state map.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use super::rows::{decode, iter_rows};
use super::{ensure_unreferenced, write_sql, Engine, Referrer, WriteMode};
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::{EntityKind, Serializable, Tool, ToolRecord};
use crate::domain::ports::{EntityRepository, ToolStateRepository};

const COLUMNS: [&str; 5] = ["id", "name", "description", "parameters", "created_at"];

const REFERRERS: [Referrer; 1] = [Referrer {
    kind: EntityKind::Agent,
    sql: "SELECT agent_id FROM agent_tools WHERE tool_id = ?",
}];

/// Write one tool row. Returns the number of rows affected.
pub(crate) async fn store(
    conn: &mut SqliteConnection,
    record: &ToolRecord,
    mode: WriteMode,
) -> Result<u64, sqlx::Error> {
    let sql = write_sql("tools", &COLUMNS, mode);
    let done = sqlx::query(&sql)
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.parameters)
        .bind(&record.created_at)
        .execute(conn)
        .await?;
    Ok(done.rows_affected())
}

#[derive(Clone)]
pub struct SqliteToolRepository {
    engine: Engine,
}

impl SqliteToolRepository {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    pub async fn get_by_name(&self, name: &str) -> DomainResult<Option<Tool>> {
        let name = name.to_string();
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM tools WHERE name = ? ORDER BY created_at, id LIMIT 1")
                        .bind(&name)
                        .fetch_all(&mut *conn)
                        .await?;
                    let tool = iter_rows(&rows)
                        .next()
                        .map(|map| Tool::from_record(decode(map?)?))
                        .transpose();
                    tool
                })
            })
            .await
    }
}

#[async_trait]
impl EntityRepository<Tool> for SqliteToolRepository {
    async fn create(&self, tool: &Tool) -> DomainResult<Uuid> {
        tool.validate().map_err(StudioError::Persistence)?;
        let record = tool.to_record();

        let mut tx = self.engine.pool().begin().await?;
        store(&mut tx, &record, WriteMode::Insert)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Tool, tool.id))?;
        tx.commit().await?;

        debug!(tool_id = %tool.id, name = %tool.name, "tool created");
        Ok(tool.id)
    }

    async fn get(&self, id: Uuid) -> DomainResult<Tool> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM tools WHERE id = ?")
                        .bind(id.to_string())
                        .fetch_all(&mut *conn)
                        .await?;
                    let map = iter_rows(&rows)
                        .next()
                        .ok_or_else(|| StudioError::not_found(EntityKind::Tool, id))??;
                    Tool::from_record(decode(map)?)
                })
            })
            .await
    }

    async fn list(&self) -> DomainResult<Vec<Tool>> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT * FROM tools ORDER BY created_at, id")
                        .fetch_all(&mut *conn)
                        .await?;
                    iter_rows(&rows)
                        .map(|map| Tool::from_record(decode::<ToolRecord>(map?)?))
                        .collect()
                })
            })
            .await
    }

    async fn update(&self, tool: &Tool) -> DomainResult<()> {
        tool.validate().map_err(StudioError::Persistence)?;
        let record = tool.to_record();

        let mut tx = self.engine.pool().begin().await?;
        let affected = store(&mut tx, &record, WriteMode::Update)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Tool, tool.id))?;
        if affected == 0 {
            return Err(StudioError::not_found(EntityKind::Tool, tool.id));
        }
        tx.commit().await?;

        debug!(tool_id = %tool.id, "tool updated");
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let id_text = id.to_string();
        let mut tx = self.engine.pool().begin().await?;
        ensure_unreferenced(&mut tx, EntityKind::Tool, &id_text, &REFERRERS).await?;

        let done = sqlx::query("DELETE FROM tools WHERE id = ?")
            .bind(&id_text)
            .execute(&mut *tx)
            .await
            .map_err(|e| StudioError::from_write(e, EntityKind::Tool, id))?;
        if done.rows_affected() == 0 {
            return Err(StudioError::not_found(EntityKind::Tool, id));
        }
        tx.commit().await?;

        debug!(tool_id = %id, "tool deleted");
        Ok(())
    }
}

#[async_trait]
impl ToolStateRepository for SqliteToolRepository {
    async fn save_tools_state(&self, states: &BTreeMap<String, bool>) -> DomainResult<()> {
        let mut tx = self.engine.pool().begin().await?;
        sqlx::query("DELETE FROM tool_states").execute(&mut *tx).await?;
        for (name, enabled) in states {
            sqlx::query("INSERT INTO tool_states (name, enabled) VALUES (?, ?)")
                .bind(name)
                .bind(*enabled)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(count = states.len(), "tool states saved");
        Ok(())
    }

    async fn load_tools_state(&self) -> DomainResult<BTreeMap<String, bool>> {
        self.engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let rows = sqlx::query("SELECT name, enabled FROM tool_states")
                        .fetch_all(&mut *conn)
                        .await?;
                    iter_rows(&rows)
                        .map(|map| {
                            let state: ToolState = decode(map?)?;
                            Ok((state.name, state.enabled))
                        })
                        .collect()
                })
            })
            .await
    }
}

#[derive(serde::Deserialize)]
struct ToolState {
    name: String,
    enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> SqliteToolRepository {
        SqliteToolRepository::new(Engine::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_create_and_get_tool() {
        let repo = setup().await;
        let tool = Tool::new("search").with_description("web search").with_parameter("n_results", 3);

        let id = repo.create(&tool).await.unwrap();
        assert_eq!(id, tool.id);
        assert_eq!(repo.get(id).await.unwrap(), tool);
        assert_eq!(repo.get_by_name("search").await.unwrap(), Some(tool));
    }

    #[tokio::test]
    async fn test_duplicate_id_is_persistence_error() {
        let repo = setup().await;
        let tool = Tool::new("search");
        repo.create(&tool).await.unwrap();

        let err = repo.create(&tool).await.unwrap_err();
        assert!(matches!(err, StudioError::Persistence(ref msg) if msg.contains("already exists")));
    }

    #[tokio::test]
    async fn test_list_is_oldest_first() {
        let repo = setup().await;
        let first = Tool::new("first");
        let mut second = Tool::new("second");
        second.created_at = first.created_at + chrono::Duration::seconds(1);

        repo.create(&second).await.unwrap();
        repo.create(&first).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let repo = setup().await;
        let mut tool = Tool::new("search");
        repo.create(&tool).await.unwrap();

        tool.description = "now with a description".to_string();
        tool.parameters.clear();
        repo.update(&tool).await.unwrap();
        assert_eq!(repo.get(tool.id).await.unwrap(), tool);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = setup().await;
        let err = repo.update(&Tool::new("ghost")).await.unwrap_err();
        assert!(matches!(err, StudioError::NotFound { kind: EntityKind::Tool, .. }));
    }

    #[tokio::test]
    async fn test_delete_then_get_is_not_found() {
        let repo = setup().await;
        let tool = Tool::new("search");
        repo.create(&tool).await.unwrap();

        repo.delete(tool.id).await.unwrap();
        assert!(matches!(repo.get(tool.id).await, Err(StudioError::NotFound { .. })));
        assert!(matches!(repo.delete(tool.id).await, Err(StudioError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let repo = setup().await;
        assert!(matches!(repo.create(&Tool::new("")).await, Err(StudioError::Persistence(_))));
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tool_state_roundtrip() {
        let repo = setup().await;
        assert!(repo.load_tools_state().await.unwrap().is_empty());

        let mut states = BTreeMap::new();
        states.insert("search".to_string(), true);
        states.insert("scrape".to_string(), false);
        repo.save_tools_state(&states).await.unwrap();
        assert_eq!(repo.load_tools_state().await.unwrap(), states);

        states.remove("scrape");
        repo.save_tools_state(&states).await.unwrap();
        assert_eq!(repo.load_tools_state().await.unwrap(), states);
    }
}
