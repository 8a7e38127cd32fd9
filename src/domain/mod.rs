//! Domain layer for CrewAI Studio
//!
//! Models, the error taxonomy and the persistence ports the adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainResult, StudioError};
