use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{LazyLock, OnceLock};

use figment::providers::{Env, Serialized};
use figment::Figment;
use thiserror::Error;
use tracing::debug;

use crate::domain::errors::StudioError;
use crate::domain::models::config::Settings;

/// Environment variables the loader reads, with the settings field each one
/// lands in.
pub const ENV_KEYS: [(&str, &str); 8] = [
    ("DB_URL", "database.url"),
    ("DATABASE_ECHO", "database.echo"),
    ("DB_POOL_SIZE", "database.pool_size"),
    ("AGENTOPS_ENABLED", "agentops.enabled"),
    ("AGENTOPS_API_KEY", "agentops.api_key"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
    ("LOG_DIR", "logging.dir"),
];

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    MissingKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        let path = err.path.join(".");
        let key = env_key_for(&path).map_or(path, str::to_string);
        Self::InvalidValue {
            key,
            reason: err.kind.to_string(),
        }
    }
}

impl From<ConfigError> for StudioError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

/// Name of the environment variable feeding a dotted settings path.
pub fn env_key_for(path: &str) -> Option<&'static str> {
    ENV_KEYS
        .iter()
        .find(|(_, field)| *field == path)
        .map(|(env, _)| *env)
}

fn env_provider() -> Env {
    let names: Vec<&str> = ENV_KEYS.iter().map(|(env, _)| *env).collect();
    Env::raw().only(&names).map(|key| {
        ENV_KEYS
            .iter()
            .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
            .map_or_else(|| key.as_str().to_lowercase().into(), |(_, field)| (*field).into())
    })
}

/// Builds a fresh figment. Providers collect their data when merged, so the
/// figment is rebuilt on every read to see the current environment.
type FigmentSource = Box<dyn Fn() -> Figment + Send + Sync>;

/// Reads settings once and hands out the cached value afterwards.
///
/// The bootstrap owns one loader and passes the settings down; the
/// process-wide [`load_settings`] wraps a static loader for callers without
/// a context.
pub struct SettingsLoader {
    source: FigmentSource,
    cached: OnceLock<Settings>,
    reads: AtomicUsize,
}

impl SettingsLoader {
    /// Defaults overridden by the recognised environment variables.
    pub fn from_env() -> Self {
        Self::from_source(|| {
            Figment::new()
                .merge(Serialized::defaults(Settings::default()))
                .merge(env_provider())
        })
    }

    pub fn from_source(source: impl Fn() -> Figment + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
            cached: OnceLock::new(),
            reads: AtomicUsize::new(0),
        }
    }

    /// Settings for this process. Only the first successful call reads the
    /// environment.
    pub fn load(&self) -> Result<&Settings, ConfigError> {
        if let Some(settings) = self.cached.get() {
            return Ok(settings);
        }
        let settings = self.read()?;
        Ok(self.cached.get_or_init(|| settings))
    }

    /// Number of times the providers have been collected.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn read(&self) -> Result<Settings, ConfigError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let settings: Settings = (self.source)().extract()?;
        validate(&settings)?;
        debug!(database_url = %settings.database.url, pool_size = settings.database.pool_size, "settings loaded");
        Ok(settings)
    }
}

/// Validate settings after extraction
pub fn validate(settings: &Settings) -> Result<(), ConfigError> {
    if settings.database.url.trim().is_empty() {
        return Err(ConfigError::MissingKey("DB_URL".to_string()));
    }

    if !settings.database.url.starts_with("sqlite:") {
        return Err(ConfigError::InvalidValue {
            key: "DB_URL".to_string(),
            reason: format!("'{}' is not a sqlite: URL", settings.database.url),
        });
    }

    if settings.database.pool_size == 0 {
        return Err(ConfigError::InvalidValue {
            key: "DB_POOL_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if settings.agentops.enabled
        && settings.agentops.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
    {
        return Err(ConfigError::MissingKey("AGENTOPS_API_KEY".to_string()));
    }

    if !VALID_LOG_LEVELS.contains(&settings.logging.level.to_lowercase().as_str()) {
        return Err(ConfigError::InvalidValue {
            key: "LOG_LEVEL".to_string(),
            reason: format!(
                "'{}' is not one of: {}",
                settings.logging.level,
                VALID_LOG_LEVELS.join(", ")
            ),
        });
    }

    Ok(())
}

static PROCESS_SETTINGS: LazyLock<SettingsLoader> = LazyLock::new(SettingsLoader::from_env);

/// Process-wide settings, read from the environment on first use.
pub fn load_settings() -> Result<&'static Settings, ConfigError> {
    PROCESS_SETTINGS.load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::LogFormat;

    const CLEAR: [(&str, Option<&str>); 8] = [
        ("DB_URL", None),
        ("DATABASE_ECHO", None),
        ("DB_POOL_SIZE", None),
        ("AGENTOPS_ENABLED", None),
        ("AGENTOPS_API_KEY", None),
        ("LOG_LEVEL", None),
        ("LOG_FORMAT", None),
        ("LOG_DIR", None),
    ];

    fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let mut all: Vec<(&str, Option<&str>)> = CLEAR.to_vec();
        for (key, value) in vars {
            all.retain(|(k, _)| k != key);
            all.push((key, *value));
        }
        temp_env::with_vars(all, f)
    }

    #[test]
    fn test_defaults_without_environment() {
        with_env(&[], || {
            let loader = SettingsLoader::from_env();
            let settings = loader.load().expect("defaults should be valid");
            assert_eq!(settings.database.url, "sqlite:crewai.db");
            assert_eq!(settings.database.pool_size, 5);
            assert!(!settings.database.echo);
            assert!(!settings.agentops.is_enabled());
            assert_eq!(settings.logging.level, "info");
            assert_eq!(settings.logging.format, LogFormat::Pretty);
        });
    }

    #[test]
    fn test_environment_overrides() {
        with_env(
            &[
                ("DB_URL", Some("sqlite:/tmp/studio.db")),
                ("DATABASE_ECHO", Some("true")),
                ("DB_POOL_SIZE", Some("3")),
                ("LOG_FORMAT", Some("json")),
                ("LOG_DIR", Some("/tmp/studio-logs")),
            ],
            || {
                let loader = SettingsLoader::from_env();
                let settings = loader.load().unwrap();
                assert_eq!(settings.database.url, "sqlite:/tmp/studio.db");
                assert!(settings.database.echo);
                assert_eq!(settings.database.pool_size, 3);
                assert_eq!(settings.logging.format, LogFormat::Json);
                assert_eq!(settings.logging.dir.as_deref(), Some("/tmp/studio-logs"));
            },
        );
    }

    #[test]
    fn test_load_is_cached_after_first_read() {
        with_env(&[("DB_URL", Some("sqlite:first.db"))], || {
            let loader = SettingsLoader::from_env();
            let first = loader.load().unwrap().clone();

            temp_env::with_var("DB_URL", Some("sqlite:second.db"), || {
                let second = loader.load().unwrap();
                assert_eq!(*second, first);
                assert_eq!(second.database.url, "sqlite:first.db");
            });

            assert!(std::ptr::eq(loader.load().unwrap(), loader.load().unwrap()));
            assert_eq!(loader.reads(), 1);
        });
    }

    #[test]
    fn test_agentops_enabled_requires_api_key() {
        with_env(&[("AGENTOPS_ENABLED", Some("true"))], || {
            let loader = SettingsLoader::from_env();
            let err = loader.load().unwrap_err();
            assert_eq!(err, ConfigError::MissingKey("AGENTOPS_API_KEY".to_string()));
            assert!(err.to_string().contains("AGENTOPS_API_KEY"));
        });
    }

    #[test]
    fn test_agentops_enabled_with_key() {
        with_env(
            &[
                ("AGENTOPS_ENABLED", Some("true")),
                ("AGENTOPS_API_KEY", Some("ao-secret")),
            ],
            || {
                let loader = SettingsLoader::from_env();
                assert!(loader.load().unwrap().agentops.is_enabled());
            },
        );
    }

    #[test]
    fn test_failed_read_is_not_cached() {
        with_env(&[("DB_POOL_SIZE", Some("0"))], || {
            let loader = SettingsLoader::from_env();
            let err = loader.load().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "DB_POOL_SIZE"));

            temp_env::with_var("DB_POOL_SIZE", Some("2"), || {
                assert_eq!(loader.load().unwrap().database.pool_size, 2);
            });
            assert_eq!(loader.reads(), 2);
        });
    }

    #[test]
    fn test_non_sqlite_url_is_rejected() {
        with_env(&[("DB_URL", Some("postgres://nope"))], || {
            let loader = SettingsLoader::from_env();
            let err = loader.load().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "DB_URL"));
            assert!(err.to_string().contains("postgres://nope"));
        });
    }

    #[test]
    fn test_sqlalchemy_style_url_is_accepted() {
        with_env(&[("DB_URL", Some("sqlite:///crewai.db"))], || {
            let loader = SettingsLoader::from_env();
            assert_eq!(loader.load().unwrap().database.url, "sqlite:///crewai.db");
        });
    }

    #[test]
    fn test_each_read_sees_current_environment() {
        with_env(&[("DB_URL", Some("sqlite:first.db"))], || {
            let loader = SettingsLoader::from_env();
            temp_env::with_var("DB_URL", Some("sqlite:changed.db"), || {
                assert_eq!(loader.load().unwrap().database.url, "sqlite:changed.db");
            });
            assert_eq!(loader.reads(), 1);
        });
    }

    #[test]
    fn test_invalid_log_level() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        let err = validate(&settings).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LOG_LEVEL"));
    }

    #[test]
    fn test_config_error_becomes_fatal_studio_error() {
        let err: StudioError = ConfigError::MissingKey("DB_URL".to_string()).into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("DB_URL"));
    }

    #[test]
    fn test_env_key_lookup() {
        assert_eq!(env_key_for("database.pool_size"), Some("DB_POOL_SIZE"));
        assert_eq!(env_key_for("database.nope"), None);
    }
}
