//! Bulk record writes used by import.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::EntityRecord;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert or replace every record, in the given order, as one unit: either
    /// all are written or none are. Returns the number written.
    async fn upsert_all(&self, records: &[EntityRecord]) -> DomainResult<usize>;
}
