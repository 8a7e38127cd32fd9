//! CLI command implementations, one module per page.

pub mod agent;
pub mod crew;
pub mod init;
pub mod knowledge;
pub mod overview;
pub mod result;
pub mod task;
pub mod tool;
pub mod transfer;

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde_json::Value;

/// Parse `key=value` pairs. Values that read as JSON keep their type,
/// anything else is stored as a string.
pub fn parse_key_values(pairs: &[String]) -> Result<BTreeMap<String, Value>> {
    let mut map = BTreeMap::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Expected key=value, got '{pair}'");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Empty key in '{pair}'");
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(map)
}
