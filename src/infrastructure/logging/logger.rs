use std::io;

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::domain::models::{LogFormat, LoggingSettings};

const LOG_FILE_PREFIX: &str = "crewai-studio.log";

/// Logger implementation using tracing
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Install the global subscriber.
    ///
    /// Console output goes to stderr in the configured format so that command
    /// output on stdout stays machine readable. With `LOG_DIR` set, JSON lines
    /// are also written to a daily rotated file; keep the returned value alive
    /// so buffered lines are flushed on exit. `RUST_LOG` overrides the level.
    ///
    /// # Errors
    /// Returns an error for an unknown level or when a subscriber is already set.
    pub fn init(settings: &LoggingSettings, echo_sql: bool) -> Result<Self> {
        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        let console = match settings.format {
            LogFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true)
                .with_target(true)
                .with_filter(build_filter(settings, echo_sql)?)
                .boxed(),
            LogFormat::Pretty => tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_filter(build_filter(settings, echo_sql)?)
                .boxed(),
        };
        layers.push(console);

        let guard = match &settings.dir {
            Some(dir) => {
                let (writer, guard) = tracing_appender::non_blocking(rolling::daily(dir, LOG_FILE_PREFIX));
                layers.push(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_current_span(true)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_filter(build_filter(settings, echo_sql)?)
                        .boxed(),
                );
                Some(guard)
            }
            None => None,
        };

        tracing_subscriber::registry().with(layers).try_init()?;

        tracing::debug!(
            level = %settings.level,
            format = ?settings.format,
            file_output = settings.dir.is_some(),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

fn build_filter(settings: &LoggingSettings, echo_sql: bool) -> Result<EnvFilter> {
    let level = parse_log_level(&settings.level)?;
    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    if echo_sql {
        filter = filter.add_directive("sqlx::query=debug".parse()?);
    }
    Ok(filter)
}

/// Parse log level string to Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("WARN"), Ok(Level::WARN)));
        assert!(parse_log_level("verbose").is_err());
    }

    #[test]
    fn test_echo_adds_sql_directive() {
        let settings = LoggingSettings::default();
        let filter = temp_env::with_var("RUST_LOG", None::<&str>, || build_filter(&settings, true).unwrap());
        assert!(filter.to_string().contains("sqlx::query=debug"));
    }

    // Installs the global subscriber, so it is the only test that calls init.
    #[test]
    fn test_init_with_log_dir_keeps_guard() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LoggingSettings {
            dir: Some(dir.path().display().to_string()),
            ..LoggingSettings::default()
        };

        let logger = LoggerImpl::init(&settings, false).unwrap();
        assert!(logger._guard.is_some());
        assert!(LoggerImpl::init(&settings, false).is_err());
    }
}
