pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod history;
pub mod index;
pub mod migration;
pub mod probe;
pub mod resolve;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod validate;

pub use config::Config;
pub use error::StateError;
pub use hash::{joint_hash, ContentHash, TableHashes};
pub use history::{TableHistory, TableHistoryStore};
pub use index::{BranchPoint, TransformIndex};
pub use migration::{MigrationRecord, MigrationSequence, Slug};
pub use probe::{Database, SchemaProbe, SqlExecutor};
pub use resolve::{AdvancedResolution, Candidate, Resolution, Resolver, TableIssue};
pub use snapshot::{SchemaSnapshot, SnapshotEntry};
pub use state::MigrationState;
pub use store::StateStore;
pub use validate::{check_validity, Mode, Violation};
