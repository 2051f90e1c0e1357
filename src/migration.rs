//! Migration records, their slugs and the ordered sequence

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::StateError;
use crate::hash::{ContentHash, TableHashes};

/// Maximum number of comment characters carried into a slug.
const SLUG_COMMENT_LEN: usize = 40;

/// Fixed-width UTC timestamp prefix. Lexicographic order equals creation order.
const SLUG_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Unique, chronologically sortable migration identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Accept `[a-z0-9_-]+`, the alphabet `generate` produces.
    pub fn parse(s: &str) -> Result<Self, StateError> {
        let valid = !s.is_empty()
            && s.bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(StateError::InvalidSlug(s.to_string()))
        }
    }

    /// Build `YYYYMMDDHHMMSS-<comment>`.
    ///
    /// The timestamp is moved past the latest existing slug's when the clock
    /// hasn't advanced (same second, or skew), so a new slug always sorts last.
    /// `-N` is appended if the result is still taken.
    pub fn generate(now: DateTime<Utc>, comment: &str, sequence: &MigrationSequence) -> Self {
        let mut secs = now.timestamp();
        if let Some(last) = sequence.latest().and_then(|(slug, _)| slug.timestamp()) {
            secs = secs.max(last.timestamp() + 1);
        }
        let stamp = DateTime::from_timestamp(secs, 0).unwrap_or(now);

        let base = format!("{}-{}", stamp.format(SLUG_TIME_FORMAT), slugify(comment));
        if !sequence.contains(&base) {
            return Self(base);
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}-{}", base, n);
            if !sequence.contains(&candidate) {
                return Self(candidate);
            }
            n += 1;
        }
    }

    /// Creation time encoded in the prefix, if the slug has one.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        let prefix = self.0.get(..14)?;
        NaiveDateTime::parse_from_str(prefix, SLUG_TIME_FORMAT)
            .ok()
            .map(|t| t.and_utc())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = StateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

fn slugify(comment: &str) -> String {
    let mut out = String::new();
    for c in comment.chars().take(SLUG_COMMENT_LEN) {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "migration".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A named transformation from one set of table states to another.
///
/// Both hash maps always carry the same table keys. A table missing on
/// one side at construction time is mapped to the empty hash there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    comment: String,
    #[serde(default)]
    end_hashes: TableHashes,
    sql_content_hash: ContentHash,
    #[serde(default)]
    start_hashes: TableHashes,
}

impl MigrationRecord {
    pub fn new(
        comment: impl Into<String>,
        sql: &str,
        start: &TableHashes,
        end: &TableHashes,
    ) -> Self {
        let mut record = Self {
            comment: comment.into(),
            end_hashes: end.clone(),
            sql_content_hash: ContentHash::of(sql),
            start_hashes: start.clone(),
        };
        record.normalize();
        record
    }

    /// Fill in the empty hash for tables only one side mentions.
    pub fn normalize(&mut self) {
        for table in self.end_hashes.keys() {
            self.start_hashes
                .entry(table.clone())
                .or_insert_with(ContentHash::empty);
        }
        for table in self.start_hashes.keys() {
            self.end_hashes
                .entry(table.clone())
                .or_insert_with(ContentHash::empty);
        }
    }

    /// Check the key-set invariant.
    pub fn validate(&self, slug: &Slug) -> Result<(), StateError> {
        if !self.start_hashes.keys().eq(self.end_hashes.keys()) {
            return Err(StateError::malformed(
                slug.as_str(),
                "start_hashes and end_hashes name different tables",
            ));
        }
        Ok(())
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn start_hashes(&self) -> &TableHashes {
        &self.start_hashes
    }

    pub fn end_hashes(&self) -> &TableHashes {
        &self.end_hashes
    }

    pub fn sql_content_hash(&self) -> &ContentHash {
        &self.sql_content_hash
    }

    pub fn start_of(&self, table: &str) -> ContentHash {
        self.start_hashes
            .get(table)
            .cloned()
            .unwrap_or_else(ContentHash::empty)
    }

    pub fn end_of(&self, table: &str) -> ContentHash {
        self.end_hashes
            .get(table)
            .cloned()
            .unwrap_or_else(ContentHash::empty)
    }

    /// Tables whose hash differs between start and end.
    pub fn changed_tables(&self) -> Vec<&str> {
        self.start_hashes
            .keys()
            .chain(self.end_hashes.keys())
            .map(String::as_str)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .filter(|table| self.start_of(table) != self.end_of(table))
            .collect()
    }
}

/// All migrations, keyed by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationSequence {
    migrations: BTreeMap<Slug, MigrationRecord>,
}

impl MigrationSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slug: Slug, record: MigrationRecord) -> Result<(), StateError> {
        if self.migrations.contains_key(&slug) {
            return Err(StateError::DuplicateSlug(slug.to_string()));
        }
        self.migrations.insert(slug, record);
        Ok(())
    }

    pub fn get(&self, slug: &str) -> Option<&MigrationRecord> {
        self.migrations.get(slug)
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.migrations.contains_key(slug)
    }

    /// Slugs in lexicographic, and therefore chronological, order.
    pub fn slugs(&self) -> impl Iterator<Item = &Slug> {
        self.migrations.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Slug, &MigrationRecord)> {
        self.migrations.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Slug, &mut MigrationRecord)> {
        self.migrations.iter_mut()
    }

    /// Most recent migration.
    pub fn latest(&self) -> Option<(&Slug, &MigrationRecord)> {
        self.migrations.iter().next_back()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

impl std::borrow::Borrow<str> for Slug {
    fn borrow(&self) -> &str {
        &self.0
    }
}
