//! Configuration management with YAML support

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub postgres: PostgresConfig,
}

/// Which kind of database is being tracked
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Postgres,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: Backend,

    /// File path for SQLite, database name or connection string for Postgres
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// Where migration state lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_dir")]
    pub dir: String,
}

/// Client tools used by the Postgres backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(default = "default_pg_dump")]
    pub pg_dump: String,

    #[serde(default = "default_psql")]
    pub psql: String,
}

// Default value functions
fn default_database_url() -> String {
    "app.db".to_string()
}

fn default_state_dir() -> String {
    "schemahash".to_string()
}

fn default_pg_dump() -> String {
    "pg_dump".to_string()
}

fn default_psql() -> String {
    "psql".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            url: default_database_url(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            pg_dump: default_pg_dump(),
            psql: default_psql(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./schemahash.yaml (current directory)
    /// 3. ~/.config/schemahash/schemahash.yaml
    pub fn load(path: &str) -> Result<Self> {
        let mut search_paths = vec![
            PathBuf::from(shellexpand::tilde(path).to_string()),
            PathBuf::from("schemahash.yaml"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("schemahash").join("schemahash.yaml"));
        }

        for search_path in &search_paths {
            if search_path.exists() {
                let content = std::fs::read_to_string(search_path)?;
                let config: Config = serde_yaml::from_str(&content)?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, database: Option<String>, state_dir: Option<String>) -> Self {
        if let Some(url) = database {
            self.database.url = url;
        }
        if let Some(dir) = state_dir {
            self.state.dir = dir;
        }
        self
    }

    /// Get the SQLite database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.url).to_string())
    }

    /// Get the state directory, expanding ~ to home directory
    pub fn state_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.state.dir).to_string())
    }
}
