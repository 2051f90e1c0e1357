//! Pre- and postcondition checks of a migration against a live snapshot

use serde::Serialize;

use crate::error::StateError;
use crate::hash::ContentHash;
use crate::migration::{MigrationRecord, MigrationSequence};
use crate::snapshot::SchemaSnapshot;

/// Which side of the migration the live database should match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Before running: changed tables must be at their start hash.
    Pre,
    /// After running: changed tables must be at their end hash.
    Post,
}

/// A changed table whose live hash is not the one the migration expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub table: String,
    pub expected: ContentHash,
    pub actual: ContentHash,
}

/// Compare every table in the migration's change-set with the snapshot.
/// An empty result means the check passed.
pub fn check_validity(
    record: &MigrationRecord,
    snapshot: &SchemaSnapshot,
    mode: Mode,
) -> Vec<Violation> {
    record
        .changed_tables()
        .into_iter()
        .filter_map(|table| {
            let expected = match mode {
                Mode::Pre => record.start_of(table),
                Mode::Post => record.end_of(table),
            };
            let actual = snapshot.hash_of(table);
            (actual != expected).then(|| Violation {
                table: table.to_string(),
                expected,
                actual,
            })
        })
        .collect()
}

/// Look the slug up, then run [`check_validity`].
pub fn check_slug(
    sequence: &MigrationSequence,
    slug: &str,
    snapshot: &SchemaSnapshot,
    mode: Mode,
) -> Result<Vec<Violation>, StateError> {
    let record = sequence
        .get(slug)
        .ok_or_else(|| StateError::UnknownMigration(slug.to_string()))?;
    Ok(check_validity(record, snapshot, mode))
}
