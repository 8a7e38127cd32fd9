//! Entity repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Serializable;

/// CRUD interface shared by every persisted entity kind.
#[async_trait]
pub trait EntityRepository<E>: Send + Sync
where
    E: Serializable + Send + Sync + 'static,
{
    /// Insert a new entity and return its id. Fails with a persistence error on a
    /// duplicate id or a dangling reference; nothing is written in that case.
    async fn create(&self, entity: &E) -> DomainResult<Uuid>;

    /// Get an entity by ID. Fails with `NotFound` when absent.
    async fn get(&self, id: Uuid) -> DomainResult<E>;

    /// All entities, oldest first (results: newest first).
    async fn list(&self) -> DomainResult<Vec<E>>;

    /// Replace the stored entity with the same id.
    async fn update(&self, entity: &E) -> DomainResult<()>;

    /// Delete an entity. Blocked with `ReferentialIntegrity` while other
    /// entities still reference it.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
}
