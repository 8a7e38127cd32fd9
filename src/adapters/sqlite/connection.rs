//! SQLite engine: one shared connection pool per process.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{ConnectOptions, SqliteConnection, SqlitePool};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::migrations::{all_embedded_migrations, Migrator};
use super::DatabaseError;
use crate::domain::errors::{DomainResult, StudioError};
use crate::domain::models::DatabaseSettings;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to create pool: {0}")]
    PoolCreationFailed(#[source] sqlx::Error),
    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
    #[error("Failed to create directory: {0}")]
    DirectoryCreationFailed(#[source] std::io::Error),
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub echo: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(3),
            echo: false,
        }
    }
}

impl From<&DatabaseSettings> for PoolConfig {
    fn from(settings: &DatabaseSettings) -> Self {
        Self {
            max_connections: settings.pool_size,
            min_connections: 1.min(settings.pool_size),
            echo: settings.echo,
            ..Self::default()
        }
    }
}

/// Shared handle to the database. Cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct Engine {
    pool: SqlitePool,
}

impl Engine {
    /// Open (creating if needed) the database and apply pending migrations.
    pub async fn connect(database_url: &str, config: PoolConfig) -> Result<Self, DatabaseError> {
        let pool = create_pool(database_url, config).await?;
        let applied = Migrator::new(pool.clone())
            .run_embedded_migrations(all_embedded_migrations())
            .await?;
        info!(database_url, applied, "database ready");
        Ok(Self { pool })
    }

    /// A private in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self, DatabaseError> {
        let pool = create_test_pool().await?;
        Migrator::new(pool.clone())
            .run_embedded_migrations(all_embedded_migrations())
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `f` with a pooled connection. The connection goes back to the pool
    /// when `f` finishes, whether it succeeded or not.
    pub async fn with_connection<T, F>(&self, f: F) -> DomainResult<T>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, DomainResult<T>>,
    {
        let mut conn = self.pool.acquire().await?;
        f(&mut conn).await
    }

    pub async fn verify(&self) -> DomainResult<()> {
        verify_connection(&self.pool).await.map_err(|e| StudioError::Persistence(e.to_string()))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Builds the engine on first use and hands out the same one afterwards.
pub struct EngineProvider {
    settings: DatabaseSettings,
    engine: OnceCell<Engine>,
}

impl EngineProvider {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self {
            settings,
            engine: OnceCell::new(),
        }
    }

    /// A provider that already holds a connected engine.
    pub fn with_engine(settings: DatabaseSettings, engine: Engine) -> Self {
        Self {
            settings,
            engine: OnceCell::new_with(Some(engine)),
        }
    }

    pub async fn get_engine(&self) -> Result<&Engine, DatabaseError> {
        self.engine
            .get_or_try_init(|| async {
                debug!(url = %self.settings.url, "constructing database engine");
                Engine::connect(&self.settings.url, PoolConfig::from(&self.settings)).await
            })
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }
}

pub async fn create_pool(database_url: &str, config: PoolConfig) -> Result<SqlitePool, ConnectionError> {
    let url = SqliteUrl::parse(database_url)?;
    ensure_database_directory(&url)?;

    let mut connect_options = url
        .connect_options()?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    if !config.echo {
        connect_options = connect_options.disable_statement_logging();
    }

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(connect_options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)
}

/// Single-connection in-memory pool. The connection never expires, so the
/// database lives as long as the pool.
pub async fn create_test_pool() -> Result<SqlitePool, ConnectionError> {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|_| ConnectionError::InvalidDatabaseUrl("sqlite::memory:".to_string()))?
        .foreign_keys(true)
        .disable_statement_logging();

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options)
        .await
        .map_err(ConnectionError::PoolCreationFailed)
}

/// A `sqlite:` URL split into the database file and its query options.
///
/// Accepts both the sqlx forms (`sqlite:data.db`, `sqlite://data.db`,
/// `sqlite::memory:`) and the SQLAlchemy forms, where `sqlite:///data.db` is
/// relative and `sqlite:////abs/data.db` is absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteUrl {
    /// `None` for in-memory databases.
    pub file: Option<PathBuf>,
    pub query: Option<String>,
}

impl SqliteUrl {
    pub fn parse(database_url: &str) -> Result<Self, ConnectionError> {
        let rest = database_url
            .strip_prefix("sqlite:")
            .ok_or_else(|| ConnectionError::InvalidDatabaseUrl(database_url.to_string()))?;
        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query.to_string())),
            None => (rest, None),
        };

        // After `//` comes an (empty) host; the next `/` only separates it from the path.
        let path = match location.strip_prefix("//") {
            Some(after_host) => after_host.strip_prefix('/').unwrap_or(after_host),
            None => location,
        };

        let file = match path {
            "" | ":memory:" => None,
            path => Some(PathBuf::from(path)),
        };
        Ok(Self { file, query })
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, ConnectionError> {
        let query = self.query.as_deref().map(|q| format!("?{q}")).unwrap_or_default();
        let invalid = |_| ConnectionError::InvalidDatabaseUrl(format!("sqlite:{query}"));
        match &self.file {
            None => SqliteConnectOptions::from_str(&format!("sqlite::memory:{query}")).map_err(invalid),
            // The query is parsed against a placeholder name so the real path
            // is taken literally instead of percent-decoded.
            Some(path) => Ok(SqliteConnectOptions::from_str(&format!("sqlite://studio.db{query}"))
                .map_err(invalid)?
                .filename(path)),
        }
    }
}

/// Filesystem path behind a `SQLite` URL, or `None` for in-memory databases
/// and URLs that are not `sqlite:` URLs.
pub fn database_file(database_url: &str) -> Option<PathBuf> {
    SqliteUrl::parse(database_url).ok().and_then(|url| url.file)
}

fn ensure_database_directory(url: &SqliteUrl) -> Result<(), ConnectionError> {
    let Some(path) = &url.file else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(ConnectionError::DirectoryCreationFailed)?;
        }
    }
    Ok(())
}

pub async fn verify_connection(pool: &SqlitePool) -> Result<(), ConnectionError> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(ConnectionError::ConnectionFailed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_in_memory_engine_has_schema() {
        let engine = Engine::in_memory().await.unwrap();
        engine.verify().await.unwrap();

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM tools")
            .fetch_one(engine.pool())
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_with_connection_releases_on_error() {
        let engine = Engine::in_memory().await.unwrap();

        let failed: DomainResult<()> = engine
            .with_connection(|_conn| {
                Box::pin(async { Err(StudioError::Persistence("boom".to_string())) })
            })
            .await;
        assert!(failed.is_err());

        // The pool holds a single connection; this only succeeds if it came back.
        let value = engine
            .with_connection(|conn| {
                Box::pin(async move {
                    let row = sqlx::query("SELECT 41 + 1 AS v").fetch_one(&mut *conn).await?;
                    Ok(row.get::<i64, _>("v"))
                })
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_provider_builds_engine_once() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("nested/studio.db").display());
        let provider = EngineProvider::new(DatabaseSettings {
            url,
            echo: false,
            pool_size: 2,
        });
        assert!(!provider.is_initialized());

        let first = provider.get_engine().await.unwrap() as *const Engine;
        let second = provider.get_engine().await.unwrap() as *const Engine;
        assert_eq!(first, second);
        assert!(dir.path().join("nested/studio.db").exists());
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("postgres://{}", dir.path().join("nope").display());
        let err = create_pool(&url, PoolConfig::default()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::InvalidDatabaseUrl(_)));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_url_forms() {
        let file = |url: &str| database_file(url);
        assert_eq!(file("sqlite:crewai.db"), Some(PathBuf::from("crewai.db")));
        assert_eq!(file("sqlite://crewai.db"), Some(PathBuf::from("crewai.db")));
        assert_eq!(file("sqlite:///crewai.db"), Some(PathBuf::from("crewai.db")));
        assert_eq!(file("sqlite:///data/crewai.db"), Some(PathBuf::from("data/crewai.db")));
        assert_eq!(file("sqlite:////srv/crewai.db"), Some(PathBuf::from("/srv/crewai.db")));
        assert_eq!(file("sqlite:/srv/crewai.db"), Some(PathBuf::from("/srv/crewai.db")));
        assert_eq!(file("sqlite:///crewai.db?mode=rwc"), Some(PathBuf::from("crewai.db")));
        assert_eq!(file("sqlite::memory:"), None);
        assert_eq!(file("sqlite://"), None);
        assert_eq!(file("postgres://nope"), None);
    }

    #[test]
    fn test_url_keeps_query() {
        let url = SqliteUrl::parse("sqlite:////srv/crewai.db?mode=rwc").unwrap();
        assert_eq!(url.query.as_deref(), Some("mode=rwc"));
        assert!(url.connect_options().is_ok());
    }

    #[tokio::test]
    async fn test_absolute_sqlalchemy_url_opens_that_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abs/studio.db");
        let url = format!("sqlite:///{}", path.display());
        assert!(url.starts_with("sqlite:////"));

        let pool = create_pool(&url, PoolConfig::default()).await.unwrap();
        verify_connection(&pool).await.unwrap();
        pool.close().await;
        assert!(path.exists());
    }

    #[test]
    fn test_pool_config_from_settings() {
        let config = PoolConfig::from(&DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            echo: true,
            pool_size: 7,
        });
        assert_eq!(config.max_connections, 7);
        assert_eq!(config.min_connections, 1);
        assert!(config.echo);
    }
}
