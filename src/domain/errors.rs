//! Domain errors for CrewAI Studio.

use thiserror::Error;

use crate::domain::models::EntityKind;

/// Errors surfaced by the studio core.
///
/// Driver and serialization failures are translated into this taxonomy at the
/// repository boundary, so page controllers never see a raw `sqlx` error.
#[derive(Debug, Error)]
pub enum StudioError {
    /// Missing or invalid settings. Fatal at start-up.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A write was rejected by the store (constraint violation, dangling
    /// reference, unavailable database).
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A delete was blocked because other entities still reference the target.
    #[error("Cannot delete {kind} {id}: still referenced by {}", referenced_by.join(", "))]
    ReferentialIntegrity {
        kind: EntityKind,
        id: String,
        referenced_by: Vec<String>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type DomainResult<T> = Result<T, StudioError>;

impl StudioError {
    pub fn not_found(kind: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Translate a failed write on `kind`/`id` into the taxonomy, keeping the
    /// constraint that fired visible in the message.
    pub fn from_write(err: sqlx::Error, kind: EntityKind, id: impl ToString) -> Self {
        let id = id.to_string();
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return match violated_table(db_err.message()) {
                    Some(table) if table != kind.table() => {
                        Self::Persistence(format!("{kind} {id} lists the same entry twice in {table}"))
                    }
                    _ => Self::Persistence(format!("{kind} {id} already exists")),
                };
            }
            if db_err.is_foreign_key_violation() {
                return Self::Persistence(format!(
                    "{kind} {id} references an entity that does not exist"
                ));
            }
        }
        Self::from(err)
    }

    /// Whether the error is something a user can fix from the page that raised it.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

/// Table named in a SQLite constraint message such as
/// `UNIQUE constraint failed: agent_tools.agent_id, agent_tools.tool_id`.
fn violated_table(message: &str) -> Option<&str> {
    let columns = message.split_once(": ")?.1;
    columns.split_once('.').map(|(table, _)| table.trim())
}

impl From<sqlx::Error> for StudioError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Decode(e) | sqlx::Error::ColumnDecode { source: e, .. } => {
                Self::Serialization(e.to_string())
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referential_integrity_message_lists_dependents() {
        let err = StudioError::ReferentialIntegrity {
            kind: EntityKind::Tool,
            id: "t1".to_string(),
            referenced_by: vec!["agent a1".to_string(), "agent a2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Cannot delete tool t1: still referenced by agent a1, agent a2"
        );
    }

    #[test]
    fn test_only_configuration_errors_are_fatal() {
        assert!(!StudioError::Configuration("DB_URL".into()).is_recoverable());
        assert!(StudioError::Persistence("boom".into()).is_recoverable());
        assert!(StudioError::not_found(EntityKind::Crew, "c1").is_recoverable());
    }

    #[test]
    fn test_violated_table() {
        assert_eq!(
            violated_table("UNIQUE constraint failed: agent_tools.agent_id, agent_tools.tool_id"),
            Some("agent_tools")
        );
        assert_eq!(violated_table("UNIQUE constraint failed: tools.name"), Some("tools"));
        assert_eq!(violated_table("database is locked"), None);
    }

    #[test]
    fn test_row_not_found_is_persistence_error() {
        let err: StudioError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StudioError::Persistence(_)));
    }
}
