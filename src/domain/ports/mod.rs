//! Port trait definitions (Hexagonal Architecture)
//!
//! Async traits the storage adapters implement:
//! - EntityRepository: CRUD for each entity kind
//! - ToolStateRepository: the enabled-tools map
//! - RecordStore: all-or-nothing bulk writes for import

pub mod entity_repository;
pub mod record_store;
pub mod tool_state_repository;

pub use entity_repository::EntityRepository;
pub use record_store::RecordStore;
pub use tool_state_repository::ToolStateRepository;
