//! The loaded migration state: sequence, derived index and table history

use tracing::debug;

use crate::error::StateError;
use crate::history::TableHistoryStore;
use crate::index::TransformIndex;
use crate::migration::{MigrationRecord, MigrationSequence, Slug};
use crate::resolve::Resolver;
use crate::snapshot::SchemaSnapshot;
use crate::validate::{check_slug, Mode, Violation};

#[derive(Debug, Clone, Default)]
pub struct MigrationState {
    sequence: MigrationSequence,
    index: TransformIndex,
    tables: TableHistoryStore,
}

impl MigrationState {
    /// Empty state, as after `init` before the first migration is recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble loaded parts. The index is always derived, never loaded.
    pub fn from_parts(sequence: MigrationSequence, tables: TableHistoryStore) -> Self {
        let index = TransformIndex::rebuild(&sequence);
        Self {
            sequence,
            index,
            tables,
        }
    }

    pub fn sequence(&self) -> &MigrationSequence {
        &self.sequence
    }

    pub fn index(&self) -> &TransformIndex {
        &self.index
    }

    pub fn tables(&self) -> &TableHistoryStore {
        &self.tables
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.sequence, &self.index).with_history_tables(self.tables.tables())
    }

    pub fn check_validity(
        &self,
        slug: &str,
        snapshot: &SchemaSnapshot,
        mode: Mode,
    ) -> Result<Vec<Violation>, StateError> {
        check_slug(&self.sequence, slug, snapshot, mode)
    }

    /// Record a migration that has been (or, for `init`, is taken to have been)
    /// executed between `start` and `end`.
    pub fn record_migration(
        &mut self,
        slug: Slug,
        comment: &str,
        sql: &str,
        start: &SchemaSnapshot,
        end: &SchemaSnapshot,
    ) -> Result<&MigrationRecord, StateError> {
        let record = MigrationRecord::new(comment, sql, &start.hashes(), &end.hashes());
        self.sequence.insert(slug.clone(), record)?;

        let record = self
            .sequence
            .get(slug.as_str())
            .ok_or_else(|| StateError::UnknownMigration(slug.to_string()))?;
        self.index.index_migration(&slug, record);
        let added = self.tables.append_snapshot(end);

        debug!(
            slug = %slug,
            changed = record.changed_tables().len(),
            new_schema_texts = added,
            "recorded migration"
        );
        Ok(record)
    }
}
