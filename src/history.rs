//! Per-table archive of every schema text ever recorded

use std::collections::BTreeMap;

use crate::error::StateError;
use crate::hash::ContentHash;
use crate::snapshot::SchemaSnapshot;

/// Hash to schema text for one table. Sorted so serialization is stable.
pub type TableHistory = BTreeMap<ContentHash, String>;

/// Append-only, content-addressed schema text, per table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableHistoryStore {
    tables: BTreeMap<String, TableHistory>,
}

impl TableHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a loaded history, checking every entry hashes to its key.
    pub fn insert_table(
        &mut self,
        table: impl Into<String>,
        history: TableHistory,
    ) -> Result<(), StateError> {
        let table = table.into();
        if let Some(hash) = history
            .iter()
            .find(|(hash, text)| ContentHash::of(text) != **hash)
            .map(|(hash, _)| hash.clone())
        {
            return Err(StateError::CorruptHistory { table, hash });
        }
        self.tables.insert(table, history);
        Ok(())
    }

    /// Record one schema text. Existing hashes are never overwritten.
    /// Returns whether anything new was stored.
    pub fn append(&mut self, table: &str, hash: &ContentHash, text: &str) -> bool {
        let history = self.tables.entry(table.to_string()).or_default();
        if history.contains_key(hash) {
            return false;
        }
        history.insert(hash.clone(), text.to_string());
        true
    }

    /// Record every table text from a snapshot. Returns the number of new entries.
    pub fn append_snapshot(&mut self, snapshot: &SchemaSnapshot) -> usize {
        snapshot
            .entries()
            .filter(|(table, entry)| self.append(table, entry.hash(), entry.text()))
            .count()
    }

    pub fn get(&self, table: &str) -> Option<&TableHistory> {
        self.tables.get(table)
    }

    /// Schema text of `table` at `hash`, if it was ever recorded.
    pub fn text_at(&self, table: &str, hash: &ContentHash) -> Option<&str> {
        self.tables
            .get(table)
            .and_then(|h| h.get(hash))
            .map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TableHistory)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }
}
