//! Deciding which migration(s) should run next against a live snapshot
//!
//! Two strategies:
//! - simple: the whole database sits at the joint start state of exactly one
//!   migration (linear history)
//! - advanced: each table is followed along its own hash chain and the
//!   migrations it points at are grouped and pre-validated (branched history)

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::hash::{joint_hash, ContentHash};
use crate::index::TransformIndex;
use crate::migration::{MigrationSequence, Slug};
use crate::snapshot::SchemaSnapshot;
use crate::validate::{check_validity, Mode, Violation};

/// A table whose live state the history cannot account for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableIssue {
    /// The table has history, but not at this hash.
    UnknownState { table: String, hash: ContentHash },
    /// The table exists live but no migration ever mentioned it.
    UnknownTable { table: String, hash: ContentHash },
}

impl TableIssue {
    pub fn table(&self) -> &str {
        match self {
            TableIssue::UnknownState { table, .. } | TableIssue::UnknownTable { table, .. } => {
                table
            }
        }
    }
}

/// One migration some tables are waiting on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Candidate {
    /// Tables whose current hash this migration advances.
    pub ready_tables: Vec<String>,
    /// Precondition failures over the migration's full change-set.
    pub violations: Vec<Violation>,
}

impl Candidate {
    pub fn is_runnable(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Per-table resolution result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdvancedResolution {
    pub candidates: BTreeMap<Slug, Candidate>,
    /// Tables at a known hash with nothing further to apply.
    pub up_to_date: Vec<String>,
    pub issues: Vec<TableIssue>,
}

impl AdvancedResolution {
    /// No pending work and nothing unrecognized.
    pub fn is_clear(&self) -> bool {
        self.candidates.is_empty() && self.issues.is_empty()
    }

    pub fn runnable(&self) -> impl Iterator<Item = (&Slug, &Candidate)> {
        self.candidates.iter().filter(|(_, c)| c.is_runnable())
    }

    pub fn blocked(&self) -> impl Iterator<Item = (&Slug, &Candidate)> {
        self.candidates.iter().filter(|(_, c)| !c.is_runnable())
    }
}

/// Overall answer to "where does this database stand?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    UpToDate,
    /// Exactly one migration follows from the current joint state.
    Next { slug: Slug },
    /// Tables diverge; see the per-table breakdown.
    Divergent(AdvancedResolution),
    /// No migration has been recorded at all.
    NoMatch,
}

pub struct Resolver<'a> {
    sequence: &'a MigrationSequence,
    index: &'a TransformIndex,
    history_tables: BTreeSet<&'a str>,
}

impl<'a> Resolver<'a> {
    pub fn new(sequence: &'a MigrationSequence, index: &'a TransformIndex) -> Self {
        Self {
            sequence,
            index,
            history_tables: BTreeSet::new(),
        }
    }

    /// Also treat these tables as historically known (e.g. from the table history store).
    pub fn with_history_tables(mut self, tables: impl IntoIterator<Item = &'a str>) -> Self {
        self.history_tables.extend(tables);
        self
    }

    /// True when the snapshot equals the end state of the most recent migration.
    pub fn is_up_to_date(&self, snapshot: &SchemaSnapshot) -> bool {
        match self.sequence.latest() {
            Some((_, record)) => snapshot.joint_hash() == joint_hash(record.end_hashes()),
            None => false,
        }
    }

    /// The single migration whose full start state equals the snapshot.
    /// Ambiguous joint states (two migrations from one checkpoint) yield `None`.
    pub fn find_next_simple(&self, snapshot: &SchemaSnapshot) -> Option<Slug> {
        let slugs = self.index.starting_at(&snapshot.joint_hash())?;
        if slugs.len() == 1 {
            slugs.iter().next().cloned()
        } else {
            None
        }
    }

    /// Follow every table independently and group the migrations they point at.
    pub fn find_next_advanced(&self, snapshot: &SchemaSnapshot) -> AdvancedResolution {
        let mut tables: BTreeSet<&str> = self.index.tables().collect();
        tables.extend(self.history_tables.iter().copied());
        tables.extend(snapshot.tables());

        let mut result = AdvancedResolution::default();
        for table in tables {
            let hash = snapshot.hash_of(table);
            match self.index.transforms_from(table, &hash) {
                Some(slugs) => {
                    for slug in slugs {
                        result
                            .candidates
                            .entry(slug.clone())
                            .or_default()
                            .ready_tables
                            .push(table.to_string());
                    }
                }
                None if self.index.has_seen(&hash) => result.up_to_date.push(table.to_string()),
                None => {
                    let table = table.to_string();
                    let issue = if self.is_known_table(&table) {
                        TableIssue::UnknownState { table, hash }
                    } else {
                        TableIssue::UnknownTable { table, hash }
                    };
                    result.issues.push(issue);
                }
            }
        }

        for (slug, candidate) in result.candidates.iter_mut() {
            if let Some(record) = self.sequence.get(slug.as_str()) {
                candidate.violations = check_validity(record, snapshot, Mode::Pre);
            }
        }

        result
    }

    /// Run the checks in the order an operator wants them answered.
    pub fn resolve(&self, snapshot: &SchemaSnapshot) -> Resolution {
        if self.is_up_to_date(snapshot) {
            return Resolution::UpToDate;
        }
        if let Some(slug) = self.find_next_simple(snapshot) {
            return Resolution::Next { slug };
        }
        let advanced = self.find_next_advanced(snapshot);
        if !advanced.is_clear() {
            Resolution::Divergent(advanced)
        } else if self.sequence.is_empty() {
            Resolution::NoMatch
        } else {
            // every table sits at a known hash with nothing further recorded,
            // e.g. the end of a branch other than the latest one
            Resolution::UpToDate
        }
    }

    /// No pending work: at the latest migration or at the end of any other branch.
    pub fn is_settled(&self, snapshot: &SchemaSnapshot) -> bool {
        self.resolve(snapshot) == Resolution::UpToDate
    }

    fn is_known_table(&self, table: &str) -> bool {
        self.index.knows_table(table) || self.history_tables.contains(table)
    }
}
