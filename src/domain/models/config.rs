use serde::{Deserialize, Deserializer, Serialize};

/// Accepts `true`/`false`, `1`/`0` and `yes`/`no` (any case) for boolean
/// environment flags.
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolLike {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match BoolLike::deserialize(deserializer)? {
        BoolLike::Bool(b) => Ok(b),
        BoolLike::Int(i) => Ok(i != 0),
        BoolLike::Text(s) => match s.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            other => Err(serde::de::Error::custom(format!("'{other}' is not a boolean"))),
        },
    }
}

/// Application settings, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub agentops: AgentOpsSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Database connection options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseSettings {
    /// `SQLite` connection URL (`DB_URL`)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Log every SQL statement (`DATABASE_ECHO`)
    #[serde(default, deserialize_with = "flexible_bool")]
    pub echo: bool,

    /// Maximum number of pooled connections (`DB_POOL_SIZE`)
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite:crewai.db";

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

const fn default_pool_size() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            echo: false,
            pool_size: default_pool_size(),
        }
    }
}

/// Optional AgentOps telemetry integration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct AgentOpsSettings {
    /// `AGENTOPS_ENABLED`
    #[serde(default, deserialize_with = "flexible_bool")]
    pub enabled: bool,

    /// `AGENTOPS_API_KEY`, required when enabled
    #[serde(default)]
    pub api_key: Option<String>,
}

impl AgentOpsSettings {
    /// True when the integration should be initialised.
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error (`LOG_LEVEL`)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: pretty or json (`LOG_FORMAT`)
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rotated JSON log files (`LOG_DIR`)
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            dir: None,
        }
    }
}
