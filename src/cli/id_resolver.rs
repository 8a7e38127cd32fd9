//! Short ID prefix resolution for CLI commands.
//!
//! Allows users to specify any unique prefix of a UUID instead of the full
//! 36-char ID, similar to git short hashes.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::models::EntityKind;

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("Invalid ID prefix '{prefix}': must contain only hex characters and dashes");
    }
    Ok(())
}

/// Resolve an id or unique id prefix of `kind` to a full UUID.
pub async fn resolve_id(pool: &SqlitePool, kind: EntityKind, prefix: &str) -> Result<Uuid> {
    // Fast path: a full UUID is returned as is, existing or not.
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }

    validate_prefix(prefix)?;

    let query = format!("SELECT id FROM {} WHERE id LIKE ?", kind.table());
    let rows: Vec<(String,)> = sqlx::query_as(&query)
        .bind(format!("{}%", prefix.to_lowercase()))
        .fetch_all(pool)
        .await?;

    match rows.as_slice() {
        [] => bail!("No {kind} found matching '{prefix}'"),
        [(id,)] => Ok(Uuid::parse_str(id)?),
        _ => {
            let mut msg = format!("Ambiguous prefix '{prefix}': matches {} {kind}s:", rows.len());
            for (id,) in &rows {
                msg.push_str(&format!("\n  {id}"));
            }
            bail!("{msg}")
        }
    }
}

/// Resolve several ids or prefixes, keeping their order. An id named twice
/// (possibly through different prefixes) is kept once.
pub async fn resolve_ids(pool: &SqlitePool, kind: EntityKind, prefixes: &[String]) -> Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(prefixes.len());
    for prefix in prefixes {
        let id = resolve_id(pool, kind, prefix).await?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{SqliteToolRepository, Engine};
    use crate::domain::models::Tool;
    use crate::domain::ports::EntityRepository;

    #[tokio::test]
    async fn test_resolves_unique_prefix() {
        let engine = Engine::in_memory().await.unwrap();
        let tools = SqliteToolRepository::new(engine.clone());
        let tool = Tool::new("search");
        tools.create(&tool).await.unwrap();

        let prefix = &tool.id.to_string()[..8];
        let resolved = resolve_id(engine.pool(), EntityKind::Tool, prefix).await.unwrap();
        assert_eq!(resolved, tool.id);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_prefixes() {
        let engine = Engine::in_memory().await.unwrap();
        let err = resolve_id(engine.pool(), EntityKind::Agent, "abc123").await.unwrap_err();
        assert!(err.to_string().contains("No agent found"));

        let err = resolve_id(engine.pool(), EntityKind::Agent, "xyz").await.unwrap_err();
        assert!(err.to_string().contains("Invalid ID prefix"));
    }

    #[tokio::test]
    async fn test_resolve_ids_drops_repeats() {
        let engine = Engine::in_memory().await.unwrap();
        let tools = SqliteToolRepository::new(engine.clone());
        let (search, scrape) = (Tool::new("search"), Tool::new("scrape"));
        tools.create(&search).await.unwrap();
        tools.create(&scrape).await.unwrap();

        let prefixes = vec![
            search.id.to_string(),
            scrape.id.to_string()[..8].to_string(),
            search.id.to_string()[..8].to_string(),
        ];
        let ids = resolve_ids(engine.pool(), EntityKind::Tool, &prefixes).await.unwrap();
        assert_eq!(ids, vec![search.id, scrape.id]);
    }

    #[tokio::test]
    async fn test_full_uuid_skips_lookup() {
        let engine = Engine::in_memory().await.unwrap();
        let id = Uuid::new_v4();
        let resolved = resolve_id(engine.pool(), EntityKind::Crew, &id.to_string()).await.unwrap();
        assert_eq!(resolved, id);
    }
}
