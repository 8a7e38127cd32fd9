//! CrewAI Studio - persistence and bootstrap core
//!
//! Stores the configuration of CrewAI crews (agents, tasks, tools and
//! knowledge sources) and the results of their runs in SQLite, and loads it
//! back as one resolved snapshot in dependency order.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **Domain Layer** (`domain`): models, the `Serializable` record
//!   conversion, errors and repository ports
//! - **Adapters** (`adapters`): the SQLite engine, migrations and repositories
//! - **Service Layer** (`services`): the ordered bulk loader and import/export
//! - **Infrastructure Layer** (`infrastructure`): settings and logging
//! - **CLI Layer** (`cli`): one subcommand group per studio page
//!
//! # Example
//!
//! ```ignore
//! use crewai_studio::adapters::sqlite::{repositories, Engine};
//! use crewai_studio::services::load_all_entities;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::in_memory().await?;
//!     let snapshot = load_all_entities(&repositories(&engine)).await?;
//!     println!("{} crews", snapshot.crews.len());
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainResult, StudioError};
pub use domain::models::{
    Agent, Crew, CrewResult, EntityKind, EntityRecord, KnowledgeSource, LoadedEntities, Serializable,
    Settings, Task, Tool,
};
pub use domain::ports::{EntityRepository, RecordStore, ToolStateRepository};
pub use infrastructure::config::{load_settings, ConfigError, SettingsLoader};
pub use services::{load_all_entities, Repositories, TransferService};
