//! Configuration management infrastructure
//!
//! Settings are read with figment:
//! - Programmatic defaults
//! - A fixed set of environment variables (`DB_URL`, `AGENTOPS_API_KEY`, ...)
//! - Validation into [`ConfigError`]
//! - A once-per-process cache in [`SettingsLoader`]

pub mod loader;

pub use loader::{load_settings, validate, ConfigError, SettingsLoader, ENV_KEYS};
