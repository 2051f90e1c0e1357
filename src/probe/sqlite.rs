//! SQLite backend
//!
//! Canonical table text is the table's `CREATE TABLE` statement followed by
//! its indexes and triggers, each ordered by name, as stored in `sqlite_master`.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::{canonicalize, SchemaProbe, SqlExecutor};

pub struct SqliteDatabase {
    path: Option<PathBuf>,
    conn: Connection,
}

impl SqliteDatabase {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            conn,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            path: None,
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn statements(&self, sql: &str, table: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

impl SchemaProbe for SqliteDatabase {
    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite::memory:".to_string(),
        }
    }

    fn list_tables(&self) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<BTreeSet<_>, _>>().map_err(Into::into)
    }

    fn table_schema(&self, table: &str) -> Result<String> {
        let mut parts = self.statements(
            "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1 AND sql IS NOT NULL",
            table,
        )?;
        parts.extend(self.statements(
            "SELECT sql FROM sqlite_master
             WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL
             ORDER BY name",
            table,
        )?);
        parts.extend(self.statements(
            "SELECT sql FROM sqlite_master
             WHERE type = 'trigger' AND tbl_name = ?1 AND sql IS NOT NULL
             ORDER BY name",
            table,
        )?);

        let text: Vec<String> = parts.iter().map(|sql| format!("{};", sql.trim())).collect();
        Ok(canonicalize(&text.join("\n")))
    }

    fn full_schema(&self) -> Result<String> {
        let mut sections = vec![];
        for table in self.list_tables()? {
            sections.push(self.table_schema(&table)?);
        }
        let mut stmt = self.conn.prepare(
            "SELECT sql FROM sqlite_master WHERE type = 'view' AND sql IS NOT NULL ORDER BY name",
        )?;
        let views = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for view in views {
            sections.push(format!("{};", view?.trim()));
        }
        Ok(sections.join("\n\n"))
    }
}

impl SqlExecutor for SqliteDatabase {
    fn run_sql(&self, path: &Path) -> Result<()> {
        let sql = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        self.conn
            .execute_batch(&sql)
            .with_context(|| format!("Failed to execute {}", path.display()))?;
        Ok(())
    }
}
