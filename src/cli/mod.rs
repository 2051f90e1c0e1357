//! Command implementations

pub mod add;
pub mod check;
pub mod history;
pub mod init;
pub mod migrate;
pub mod report;
pub mod show;

use anyhow::Result;

use crate::config::Config;
use crate::probe::{open_database, Database};
use crate::store::StateStore;

/// Everything a command needs: where state lives and the database it tracks.
pub struct Context {
    pub store: StateStore,
    pub db: Box<dyn Database>,
}

impl Context {
    pub fn new(store: StateStore, db: Box<dyn Database>) -> Self {
        Self { store, db }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let store = StateStore::open(config.state_dir());
        let db = open_database(config)?;
        Ok(Self::new(store, db))
    }
}
