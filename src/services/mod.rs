//! Application services built on the repository ports.

pub mod entity_loader;
pub mod repositories;
pub mod transfer_service;

pub use entity_loader::load_all_entities;
pub use repositories::Repositories;
pub use transfer_service::{TransferService, TransferSummary};
