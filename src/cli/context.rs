//! Shared state handed to every page command.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::adapters::sqlite::{repositories, Engine, EngineProvider};
use crate::domain::models::Settings;
use crate::services::{Repositories, TransferService};

/// Built once per process by the bootstrap.
pub struct StudioContext {
    pub settings: Settings,
    provider: EngineProvider,
    pub repos: Repositories,
    pub transfer: TransferService,
}

impl StudioContext {
    /// Connect to the configured database and wire the repositories.
    pub async fn build(settings: &Settings) -> Result<Self> {
        let provider = EngineProvider::new(settings.database.clone());
        let engine = provider
            .get_engine()
            .await
            .with_context(|| format!("Failed to open database {}", settings.database.url))?
            .clone();
        Ok(Self::assemble(settings.clone(), provider, &engine))
    }

    /// Context over an already connected engine.
    pub fn from_engine(settings: Settings, engine: &Engine) -> Self {
        let provider = EngineProvider::with_engine(settings.database.clone(), engine.clone());
        Self::assemble(settings, provider, engine)
    }

    fn assemble(settings: Settings, provider: EngineProvider, engine: &Engine) -> Self {
        let repos = repositories(engine);
        let transfer = TransferService::new(repos.clone());
        info!(database_url = %settings.database.url, "studio context ready");
        Self {
            settings,
            provider,
            repos,
            transfer,
        }
    }

    pub async fn engine(&self) -> Result<&Engine> {
        Ok(self.provider.get_engine().await?)
    }

    /// Pool used for id prefix lookups.
    pub async fn pool(&self) -> Result<&SqlitePool> {
        Ok(self.engine().await?.pool())
    }
}
