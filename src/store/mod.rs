//! YAML/SQL file persistence for the migration state
//!
//! Two kinds of state file live under the state directory: a single
//! sequence file holding every migration record, and one history file per
//! table. Both are written with sorted keys so the history diffs cleanly
//! under version control. Migration bodies are stored as raw SQL by slug.

mod layout;
mod lock;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StateError;
use crate::history::{TableHistory, TableHistoryStore};
use crate::migration::MigrationSequence;
use crate::state::MigrationState;

pub use layout::{validate_table_name, validate_table_names, Layout};
pub use lock::StateLock;

pub struct StateStore {
    layout: Layout,
}

impl StateStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn is_initialized(&self) -> bool {
        self.layout.sequence_file().exists()
    }

    /// Create the directory tree. Refuses to clobber an existing sequence
    /// unless `force` is set.
    pub fn create(&self, force: bool) -> Result<()> {
        if self.is_initialized() && !force {
            return Err(StateError::AlreadyInitialized(self.root().display().to_string()).into());
        }
        std::fs::create_dir_all(self.layout.sql_dir())?;
        std::fs::create_dir_all(self.layout.table_dir())?;
        Ok(())
    }

    pub fn lock(&self) -> Result<StateLock> {
        StateLock::try_acquire(&self.layout.lock_file())
    }

    // ============================================
    // FULL STATE
    // ============================================

    /// Load the sequence and the history of every table it mentions, then
    /// rebuild the index.
    pub fn load(&self) -> Result<MigrationState> {
        if !self.is_initialized() {
            return Err(StateError::NotInitialized(self.root().display().to_string()).into());
        }
        let sequence = self.load_sequence()?;

        let tables: BTreeSet<&str> = sequence
            .iter()
            .flat_map(|(_, record)| record.end_hashes().keys().map(String::as_str))
            .collect();

        let mut histories = TableHistoryStore::new();
        for table in tables {
            let history = self.load_table_history(table)?;
            if !history.is_empty() {
                histories.insert_table(table, history)?;
            }
        }

        debug!(
            root = %self.root().display(),
            migrations = sequence.len(),
            "loaded migration state"
        );
        Ok(MigrationState::from_parts(sequence, histories))
    }

    pub fn save(&self, state: &MigrationState) -> Result<()> {
        self.save_sequence(state.sequence())?;
        for (table, history) in state.tables().iter() {
            self.save_table_history(table, history)?;
        }
        debug!(
            root = %self.root().display(),
            migrations = state.sequence().len(),
            "saved migration state"
        );
        Ok(())
    }

    // ============================================
    // SEQUENCE
    // ============================================

    /// Read and validate every migration record.
    pub fn load_sequence(&self) -> Result<MigrationSequence> {
        let path = self.layout.sequence_file();
        let mut sequence: MigrationSequence = read_yaml(&path)?.unwrap_or_default();

        for (slug, record) in sequence.iter_mut() {
            record.normalize();
            record.validate(slug)?;
            for table in record.start_hashes().keys() {
                validate_table_name(table)
                    .map_err(|e| StateError::malformed(slug.as_str(), e.to_string()))?;
            }
        }
        Ok(sequence)
    }

    pub fn save_sequence(&self, sequence: &MigrationSequence) -> Result<()> {
        write_yaml(&self.layout.sequence_file(), sequence)
    }

    // ============================================
    // TABLE HISTORY
    // ============================================

    /// History of one table; empty if it has never been saved.
    pub fn load_table_history(&self, table: &str) -> Result<TableHistory> {
        let path = self.layout.table_file(table)?;
        Ok(read_yaml(&path)?.unwrap_or_default())
    }

    pub fn save_table_history(&self, table: &str, history: &TableHistory) -> Result<()> {
        write_yaml(&self.layout.table_file(table)?, history)
    }

    // ============================================
    // SQL BODIES
    // ============================================

    pub fn sql_path(&self, slug: &str) -> PathBuf {
        self.layout.sql_file(slug)
    }

    pub fn write_sql(&self, slug: &str, sql: &str) -> Result<PathBuf> {
        let path = self.sql_path(slug);
        write_atomic(&path, sql.as_bytes())?;
        Ok(path)
    }

    pub fn read_sql(&self, slug: &str) -> Result<String> {
        let path = self.sql_path(slug);
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read migration SQL {}", path.display()))
    }

    pub fn remove_sql(&self, slug: &str) -> Result<()> {
        let path = self.sql_path(slug);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(Some(value))
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_yaml::to_string(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    write_atomic(path, content.as_bytes())
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}
