//! Derived lookup structures over a migration sequence
//!
//! The index is a cache. It is rebuilt from the sequence on every load and
//! only ever extended in place by [`TransformIndex::index_migration`], which
//! performs the same step `rebuild` runs for each migration.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::warn;

use crate::hash::{joint_hash, ContentHash};
use crate::migration::{MigrationRecord, MigrationSequence, Slug};

/// A (table, start hash) pair claimed by more than one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchPoint {
    pub table: String,
    pub start_hash: ContentHash,
    pub slugs: Vec<Slug>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformIndex {
    /// table -> start hash -> migrations advancing the table from that hash
    per_table: BTreeMap<String, BTreeMap<ContentHash, BTreeSet<Slug>>>,
    /// joint start state -> migrations starting there
    joint_starts: BTreeMap<ContentHash, BTreeSet<Slug>>,
    /// every hash any migration mentions, on either side
    seen: HashSet<ContentHash>,
    /// every table any migration mentions
    tables: BTreeSet<String>,
}

impl TransformIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the index from scratch.
    pub fn rebuild(sequence: &MigrationSequence) -> Self {
        let mut index = Self::new();
        for (slug, record) in sequence.iter() {
            index.index_migration(slug, record);
        }
        index
    }

    /// Register one migration. Conflicting claims on the same (table, hash)
    /// are all kept and logged as branch points.
    pub fn index_migration(&mut self, slug: &Slug, record: &MigrationRecord) {
        self.joint_starts
            .entry(joint_hash(record.start_hashes()))
            .or_default()
            .insert(slug.clone());

        for table in record.start_hashes().keys().chain(record.end_hashes().keys()) {
            let start = record.start_of(table);
            let end = record.end_of(table);
            self.tables.insert(table.clone());
            self.seen.insert(start.clone());
            self.seen.insert(end.clone());

            if start == end {
                continue;
            }
            let claims = self
                .per_table
                .entry(table.clone())
                .or_default()
                .entry(start.clone())
                .or_default();
            if claims.insert(slug.clone()) && claims.len() > 1 {
                warn!(
                    table = %table,
                    start_hash = %start.short(),
                    migrations = ?claims.iter().map(Slug::as_str).collect::<Vec<_>>(),
                    "multiple migrations transform the same table state"
                );
            }
        }
    }

    /// Migrations advancing `table` from `hash`.
    pub fn transforms_from(&self, table: &str, hash: &ContentHash) -> Option<&BTreeSet<Slug>> {
        self.per_table.get(table).and_then(|starts| starts.get(hash))
    }

    /// Migrations whose full start state has this joint hash.
    pub fn starting_at(&self, joint: &ContentHash) -> Option<&BTreeSet<Slug>> {
        self.joint_starts.get(joint)
    }

    pub fn has_seen(&self, hash: &ContentHash) -> bool {
        self.seen.contains(hash)
    }

    pub fn knows_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(String::as_str)
    }

    /// Every (table, hash) with more than one outgoing migration.
    pub fn branch_points(&self) -> Vec<BranchPoint> {
        let mut points = vec![];
        for (table, starts) in &self.per_table {
            for (hash, slugs) in starts {
                if slugs.len() > 1 {
                    points.push(BranchPoint {
                        table: table.clone(),
                        start_hash: hash.clone(),
                        slugs: slugs.iter().cloned().collect(),
                    });
                }
            }
        }
        points
    }
}
