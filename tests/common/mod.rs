//! Common test utilities for integration tests
//!
//! Provides shared fixtures used across the integration test files.

use std::path::PathBuf;

use crewai_studio::adapters::sqlite::{repositories, Engine, PoolConfig};
use crewai_studio::Repositories;
use tempfile::TempDir;

/// Create a temporary test database
///
/// Returns the directory guard and a `sqlite:` URL for a file inside it.
pub fn temp_db_url() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path: PathBuf = dir.path().join("studio.db");
    let url = format!("sqlite:{}", db_path.display());
    (dir, url)
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fresh in-memory database with repositories over it.
#[allow(dead_code)]
pub async fn memory_repositories() -> (Engine, Repositories) {
    let engine = Engine::in_memory().await.expect("in-memory engine");
    let repos = repositories(&engine);
    (engine, repos)
}

/// File-backed database in a temporary directory.
#[allow(dead_code)]
pub async fn file_repositories() -> (TempDir, Engine, Repositories) {
    let (dir, url) = temp_db_url();
    let engine = Engine::connect(&url, PoolConfig::default())
        .await
        .expect("file engine");
    let repos = repositories(&engine);
    (dir, engine, repos)
}
