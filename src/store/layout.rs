//! On-disk layout of the state directory
//!
//! ```text
//! <state dir>/
//! ├── sequence.yml            # every migration record, keyed by slug
//! ├── sql/<slug>.sql          # migration bodies
//! ├── table_data/<table>.yml  # schema text history, keyed by hash
//! └── .lock
//! ```

use std::path::{Path, PathBuf};

use crate::error::StateError;

pub const SEQUENCE_FILE: &str = "sequence.yml";
pub const SQL_DIR: &str = "sql";
pub const TABLE_DIR: &str = "table_data";
pub const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sequence_file(&self) -> PathBuf {
        self.root.join(SEQUENCE_FILE)
    }

    pub fn sql_dir(&self) -> PathBuf {
        self.root.join(SQL_DIR)
    }

    pub fn sql_file(&self, slug: &str) -> PathBuf {
        self.sql_dir().join(format!("{}.sql", slug))
    }

    pub fn table_dir(&self) -> PathBuf {
        self.root.join(TABLE_DIR)
    }

    pub fn table_file(&self, table: &str) -> Result<PathBuf, StateError> {
        validate_table_name(table)?;
        Ok(self.table_dir().join(format!("{}.yml", table)))
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

/// Table names become file names; reject the ones that can't.
pub fn validate_table_name(table: &str) -> Result<(), StateError> {
    let bad = table.is_empty()
        || table.starts_with('.')
        || table.contains(['/', '\\', '\0']);
    if bad {
        Err(StateError::InvalidTableName(table.to_string()))
    } else {
        Ok(())
    }
}

/// [`validate_table_name`] over every name, stopping at the first bad one.
pub fn validate_table_names<'a>(
    tables: impl IntoIterator<Item = &'a str>,
) -> Result<(), StateError> {
    tables.into_iter().try_for_each(validate_table_name)
}
