//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Pretty or JSON console output on stderr
//! - Daily rotated JSON log files via tracing-appender
//! - `RUST_LOG` overrides on top of `LOG_LEVEL`

pub mod logger;

pub use logger::LoggerImpl;
