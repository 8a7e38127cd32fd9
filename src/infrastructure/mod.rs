//! Infrastructure layer module
//!
//! - Configuration management (figment over environment variables)
//! - Logging infrastructure
//!
//! Storage adapters live in `crate::adapters`.

pub mod config;
pub mod logging;
