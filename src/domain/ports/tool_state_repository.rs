//! Tool enablement port.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Which tools the user has switched on, keyed by tool name.
#[async_trait]
pub trait ToolStateRepository: Send + Sync {
    /// Replace the whole map.
    async fn save_tools_state(&self, states: &BTreeMap<String, bool>) -> DomainResult<()>;

    /// The saved map, empty when nothing was saved yet.
    async fn load_tools_state(&self) -> DomainResult<BTreeMap<String, bool>>;
}
