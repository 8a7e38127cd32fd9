//! SQLite database adapters for CrewAI Studio.

pub mod agent_repository;
pub mod connection;
pub mod crew_repository;
pub mod knowledge_source_repository;
pub mod migrations;
pub mod record_store;
pub mod result_repository;
pub mod rows;
pub mod task_repository;
pub mod tool_repository;

pub use agent_repository::SqliteAgentRepository;
pub use connection::{
    create_pool, create_test_pool, database_file, verify_connection, ConnectionError, Engine, EngineProvider,
    PoolConfig, SqliteUrl,
};
pub use crew_repository::SqliteCrewRepository;
pub use knowledge_source_repository::SqliteKnowledgeSourceRepository;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};
pub use record_store::SqliteRecordStore;
pub use result_repository::SqliteResultRepository;
pub use rows::{iter_rows, RowMap};
pub use task_repository::SqliteTaskRepository;
pub use tool_repository::SqliteToolRepository;

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{Row, SqliteConnection};

use crate::domain::errors::StudioError;
use crate::domain::models::EntityKind;
use crate::services::Repositories;

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl From<DatabaseError> for StudioError {
    fn from(err: DatabaseError) -> Self {
        Self::Persistence(err.to_string())
    }
}

pub async fn initialize_database(database_url: &str) -> Result<Engine, DatabaseError> {
    Engine::connect(database_url, PoolConfig::default()).await
}

/// SQLite-backed repositories sharing one engine.
pub fn repositories(engine: &Engine) -> Repositories {
    let tools = Arc::new(SqliteToolRepository::new(engine.clone()));
    Repositories {
        tools: tools.clone(),
        knowledge_sources: Arc::new(SqliteKnowledgeSourceRepository::new(engine.clone())),
        agents: Arc::new(SqliteAgentRepository::new(engine.clone())),
        tasks: Arc::new(SqliteTaskRepository::new(engine.clone())),
        crews: Arc::new(SqliteCrewRepository::new(engine.clone())),
        results: Arc::new(SqliteResultRepository::new(engine.clone())),
        tool_states: tools,
        records: Arc::new(SqliteRecordStore::new(engine.clone())),
    }
}

/// How a row is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    Insert,
    /// Replace the row with the same id; affects no rows when it is missing.
    Update,
    /// Insert, or replace in place when the id exists.
    Upsert,
}

/// SQL writing one row of `table`. `columns[0]` must be the primary key and
/// values bind in column order for every mode.
pub(crate) fn write_sql(table: &str, columns: &[&str], mode: WriteMode) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let insert = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    let assignments = |value: &dyn Fn(usize, &str) -> String| {
        columns
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, c)| format!("{c} = {}", value(i, c)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    match mode {
        WriteMode::Insert => insert,
        WriteMode::Update => format!(
            "UPDATE {table} SET {} WHERE {} = ?1",
            assignments(&|i: usize, _: &str| format!("?{}", i + 1)),
            columns[0]
        ),
        WriteMode::Upsert => format!(
            "{insert} ON CONFLICT({}) DO UPDATE SET {}",
            columns[0],
            assignments(&|_: usize, c: &str| format!("excluded.{c}"))
        ),
    }
}

/// Ordered many-to-many links from an owner row to target rows.
pub(crate) struct LinkTable {
    pub table: &'static str,
    pub owner: &'static str,
    pub target: &'static str,
}

impl LinkTable {
    /// Replace the owner's links with `targets`, keeping their order.
    pub async fn replace(
        &self,
        conn: &mut SqliteConnection,
        owner_id: &str,
        targets: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&format!("DELETE FROM {} WHERE {} = ?", self.table, self.owner))
            .bind(owner_id)
            .execute(&mut *conn)
            .await?;

        let insert = format!(
            "INSERT INTO {} ({}, {}, position) VALUES (?, ?, ?)",
            self.table, self.owner, self.target
        );
        for (position, target) in targets.iter().enumerate() {
            sqlx::query(&insert)
                .bind(owner_id)
                .bind(target)
                .bind(i64::try_from(position).unwrap_or(i64::MAX))
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    pub async fn targets_of(&self, conn: &mut SqliteConnection, owner_id: &str) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM {} WHERE {} = ? ORDER BY position",
            self.target, self.table, self.owner
        ))
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
        rows.iter().map(|r| r.try_get::<String, _>(0)).collect()
    }

    /// Every owner's targets, in link order.
    pub async fn all(&self, conn: &mut SqliteConnection) -> Result<HashMap<String, Vec<String>>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {}, {} FROM {} ORDER BY {}, position",
            self.owner, self.target, self.table, self.owner
        ))
        .fetch_all(&mut *conn)
        .await?;

        let mut links: HashMap<String, Vec<String>> = HashMap::new();
        for row in &rows {
            links
                .entry(row.try_get::<String, _>(0)?)
                .or_default()
                .push(row.try_get::<String, _>(1)?);
        }
        Ok(links)
    }
}

/// A query listing ids of `kind` rows that point at a given id.
pub(crate) struct Referrer {
    pub kind: EntityKind,
    pub sql: &'static str,
}

/// Describe every entity still referencing `id`, as `"<kind> <id>"`.
pub(crate) async fn find_referrers(
    conn: &mut SqliteConnection,
    referrers: &[Referrer],
    id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    let mut found = Vec::new();
    for referrer in referrers {
        let rows = sqlx::query(referrer.sql).bind(id).fetch_all(&mut *conn).await?;
        for row in &rows {
            found.push(format!("{} {}", referrer.kind, row.try_get::<String, _>(0)?));
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

/// Fail with `ReferentialIntegrity` when anything still references `id`.
pub(crate) async fn ensure_unreferenced(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    id: &str,
    referrers: &[Referrer],
) -> Result<(), StudioError> {
    let referenced_by = find_referrers(conn, referrers, id).await?;
    if referenced_by.is_empty() {
        Ok(())
    } else {
        Err(StudioError::ReferentialIntegrity {
            kind,
            id: id.to_string(),
            referenced_by,
        })
    }
}
