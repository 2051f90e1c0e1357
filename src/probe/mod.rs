//! Database collaborators: schema introspection and SQL execution
//!
//! Backends:
//! - SQLite: in-process through rusqlite
//! - Postgres: shells out to `pg_dump` and `psql`

mod postgres;
mod sqlite;

pub use postgres::PostgresDatabase;
pub use sqlite::SqliteDatabase;

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::{Backend, Config};
use crate::snapshot::SchemaSnapshot;

/// Reads the live schema.
pub trait SchemaProbe {
    /// Human-readable description of the target database.
    fn describe(&self) -> String;

    /// Names of every user table.
    fn list_tables(&self) -> Result<BTreeSet<String>>;

    /// Canonical DDL of one table. Identical schemas must give identical text.
    fn table_schema(&self, table: &str) -> Result<String>;

    /// Canonical DDL of the whole database.
    fn full_schema(&self) -> Result<String>;

    /// Capture every table's schema at this instant.
    fn capture_snapshot(&self) -> Result<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot::new();
        for table in self.list_tables()? {
            let text = self.table_schema(&table)?;
            snapshot.insert(table, text);
        }
        Ok(snapshot)
    }
}

/// Runs migration scripts.
pub trait SqlExecutor {
    fn run_sql(&self, path: &Path) -> Result<()>;
}

/// A database that can be both inspected and migrated.
pub trait Database: SchemaProbe + SqlExecutor {}

impl<T: SchemaProbe + SqlExecutor> Database for T {}

/// Open the configured backend.
pub fn open_database(config: &Config) -> Result<Box<dyn Database>> {
    match config.database.backend {
        Backend::Sqlite => {
            let db = SqliteDatabase::open(&config.database_path())?;
            Ok(Box::new(db))
        }
        Backend::Postgres => {
            let db = PostgresDatabase::new(
                config.database.url.clone(),
                config.postgres.pg_dump.clone(),
                config.postgres.psql.clone(),
            );
            Ok(Box::new(db))
        }
    }
}

/// Strip lines that vary without the schema changing: blank lines,
/// `--` comments and `SET ...;` session settings. Trailing whitespace goes too.
pub fn canonicalize(raw: &str) -> String {
    raw.lines()
        .map(str::trim_end)
        .filter(|line| {
            let trimmed = line.trim_start();
            !(trimmed.is_empty()
                || trimmed.starts_with("--")
                || (line.starts_with("SET ") && trimmed.ends_with(';')))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_strips_noise() {
        let raw = "--\n-- PostgreSQL database dump\n--\n\nSET statement_timeout = 0;\nSET client_encoding = 'UTF8';\n\nCREATE TABLE users (   \n    id integer NOT NULL\n);\n\n  -- trailing comment\n";
        assert_eq!(
            canonicalize(raw),
            "CREATE TABLE users (\n    id integer NOT NULL\n);"
        );
    }

    #[test]
    fn test_canonicalize_is_stable_across_noise() {
        let a = "CREATE TABLE t (id int);\n";
        let b = "-- dumped at 12:00\nSET search_path = public;\n\nCREATE TABLE t (id int);\n\n";
        assert_eq!(canonicalize(a), canonicalize(b));
    }

    #[test]
    fn test_canonicalize_keeps_indented_set_clauses() {
        let raw = "CREATE RULE r AS ON UPDATE TO t DO INSTEAD UPDATE u\n    SET x = 1;";
        assert_eq!(canonicalize(raw), raw);
    }
}
