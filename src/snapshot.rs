//! In-memory capture of a live database's per-table schema state

use std::collections::BTreeMap;

use crate::hash::{joint_hash, ContentHash, TableHashes};

/// Canonical schema text of one table together with its hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    hash: ContentHash,
    text: String,
}

impl SnapshotEntry {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            hash: ContentHash::of(&text),
            text,
        }
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Table name to schema entry, for every table present in the database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    tables: BTreeMap<String, SnapshotEntry>,
}

impl SchemaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `(table, schema text)` pairs.
    pub fn from_texts<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut snapshot = Self::new();
        for (table, text) in entries {
            snapshot.insert(table, text);
        }
        snapshot
    }

    pub fn insert(&mut self, table: impl Into<String>, text: impl Into<String>) {
        self.tables.insert(table.into(), SnapshotEntry::new(text));
    }

    pub fn get(&self, table: &str) -> Option<&SnapshotEntry> {
        self.tables.get(table)
    }

    /// Hash of the table, or the empty hash if it doesn't exist.
    pub fn hash_of(&self, table: &str) -> ContentHash {
        self.tables
            .get(table)
            .map(|entry| entry.hash.clone())
            .unwrap_or_else(ContentHash::empty)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &SnapshotEntry)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Drop the schema text, keeping only hashes.
    pub fn hashes(&self) -> TableHashes {
        self.tables
            .iter()
            .map(|(table, entry)| (table.clone(), entry.hash.clone()))
            .collect()
    }

    pub fn joint_hash(&self) -> ContentHash {
        joint_hash(&self.hashes())
    }

    /// Deterministic text rendering, tables in name order.
    pub fn to_text(&self) -> String {
        self.tables
            .iter()
            .map(|(table, entry)| format!("-- {}\n{}\n", table, entry.text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_table_hashes_empty() {
        let snapshot = SchemaSnapshot::from_texts([("users", "CREATE TABLE users (id INT)")]);
        assert!(snapshot.hash_of("posts").is_empty_schema());
        assert_eq!(
            snapshot.hash_of("users"),
            ContentHash::of("CREATE TABLE users (id INT)")
        );
    }

    #[test]
    fn test_text_rendering_is_order_independent() {
        let a = SchemaSnapshot::from_texts([("b", "B"), ("a", "A")]);
        let b = SchemaSnapshot::from_texts([("a", "A"), ("b", "B")]);
        assert_eq!(a.to_text(), b.to_text());
        assert_eq!(ContentHash::of(&a.to_text()), ContentHash::of(&b.to_text()));
        assert_eq!(a.joint_hash(), b.joint_hash());
    }
}
