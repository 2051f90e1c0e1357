//! Error types for the migration-state engine

use thiserror::Error;

use crate::hash::ContentHash;

/// Errors raised by the engine and by validation at the persistence boundary.
#[derive(Debug, Error)]
pub enum StateError {
    /// A hash string is not a lowercase hex SHA-256 digest.
    #[error("Invalid content hash '{0}'")]
    InvalidHash(String),

    /// A slug contains characters outside `[a-z0-9_-]` or is empty.
    #[error("Invalid migration slug '{0}'")]
    InvalidSlug(String),

    /// A table name cannot be used as a history file name.
    #[error("Invalid table name '{0}'")]
    InvalidTableName(String),

    /// A persisted migration record violates its invariants.
    #[error("Malformed migration record '{slug}': {reason}")]
    MalformedRecord { slug: String, reason: String },

    /// A table history entry does not hash to its key.
    #[error("Table history for '{table}' is corrupt: {hash} does not match its schema text")]
    CorruptHistory { table: String, hash: ContentHash },

    /// The slug is already present in the sequence.
    #[error("Migration '{0}' already exists")]
    DuplicateSlug(String),

    /// The slug is not present in the sequence.
    #[error("Migration '{0}' not found")]
    UnknownMigration(String),

    /// The state directory has not been initialized.
    #[error("No migration state found at '{0}'. Run `schemahash init` first.")]
    NotInitialized(String),

    /// `init` would overwrite an existing sequence.
    #[error("Refusing to overwrite existing migration state at '{0}' without --force")]
    AlreadyInitialized(String),

    /// The live database does not match a migration's start state.
    #[error("Cannot run migration '{slug}': tables in violation: {}", tables.join(", "))]
    PreconditionViolated { slug: String, tables: Vec<String> },

    /// No single migration follows from the current database state.
    #[error("Next migration isn't clean/obvious. Run `check`, then pass a slug to `migrate`.")]
    NoObviousMigration,

    /// The external SQL execution reported failure.
    #[error("Execution of migration '{slug}' failed: {reason}")]
    ExecutionFailed { slug: String, reason: String },
}

impl StateError {
    /// Create a malformed-record error.
    pub fn malformed(slug: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            slug: slug.into(),
            reason: reason.into(),
        }
    }

    /// Whether the error came from a corrupt or invalid on-disk state.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidHash(_)
                | Self::InvalidSlug(_)
                | Self::MalformedRecord { .. }
                | Self::CorruptHistory { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_display_lists_tables() {
        let err = StateError::PreconditionViolated {
            slug: "20260101000000-add-users".to_string(),
            tables: vec!["users".to_string(), "posts".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("20260101000000-add-users"));
        assert!(msg.contains("users, posts"));
    }

    #[test]
    fn test_is_corruption() {
        assert!(StateError::malformed("x", "bad").is_corruption());
        assert!(StateError::InvalidHash("zz".to_string()).is_corruption());
        assert!(!StateError::NoObviousMigration.is_corruption());
    }
}
