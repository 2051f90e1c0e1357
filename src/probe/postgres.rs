//! Postgres backend via the `pg_dump` and `psql` client tools
//!
//! Assumes the current user can already connect to the database (via
//! `PGPASSWORD`, `.pgpass` or peer auth).

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::{canonicalize, SchemaProbe, SqlExecutor};

pub struct PostgresDatabase {
    database: String,
    pg_dump: String,
    psql: String,
}

impl PostgresDatabase {
    pub fn new(database: String, pg_dump: String, psql: String) -> Self {
        Self {
            database,
            pg_dump,
            psql,
        }
    }

    /// Schema-only dump without privileges, optionally of a single table.
    fn dump(&self, table: Option<&str>) -> Result<String> {
        let mut cmd = Command::new(&self.pg_dump);
        cmd.arg("-xs").arg(&self.database);
        if let Some(table) = table {
            cmd.arg("-t").arg(table);
        }
        debug!(command = ?cmd, "running pg_dump");

        let output = cmd
            .output()
            .with_context(|| format!("Failed to run {}", self.pg_dump))?;
        if !output.status.success() {
            bail!(
                "pg_dump exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        String::from_utf8(output.stdout).context("pg_dump produced non-UTF-8 output")
    }
}

/// Table names from `CREATE TABLE` lines of a dump.
pub(crate) fn parse_table_names(dump: &str) -> BTreeSet<String> {
    dump.lines()
        .filter_map(|line| {
            line.strip_prefix("CREATE TABLE ")
                .or_else(|| line.strip_prefix("CREATE UNLOGGED TABLE "))
        })
        .filter_map(|rest| {
            let name: String = rest
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != '(')
                .collect();
            (!name.is_empty()).then_some(name)
        })
        .collect()
}

impl SchemaProbe for PostgresDatabase {
    fn describe(&self) -> String {
        format!("postgres:{}", self.database)
    }

    fn list_tables(&self) -> Result<BTreeSet<String>> {
        Ok(parse_table_names(&self.dump(None)?))
    }

    fn table_schema(&self, table: &str) -> Result<String> {
        Ok(canonicalize(&self.dump(Some(table))?))
    }

    fn full_schema(&self) -> Result<String> {
        Ok(canonicalize(&self.dump(None)?))
    }
}

impl SqlExecutor for PostgresDatabase {
    fn run_sql(&self, path: &Path) -> Result<()> {
        let status = Command::new(&self.psql)
            .arg(&self.database)
            .args(["-v", "ON_ERROR_STOP=1", "-q", "-f"])
            .arg(path)
            .status()
            .with_context(|| format!("Failed to run {}", self.psql))?;
        if !status.success() {
            bail!("psql exited with {} while running {}", status, path.display());
        }
        Ok(())
    }
}
