//! Init command implementation

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use super::{report, Context};
use crate::migration::Slug;
use crate::snapshot::SchemaSnapshot;
use crate::state::MigrationState;
use crate::store::validate_table_names;

pub const INITIAL_COMMENT: &str = "Initial schema.";

/// Record the database as it stands now as the first migration.
pub fn run(ctx: &Context, force: bool) -> Result<Slug> {
    ctx.store.create(force)?;
    let _lock = ctx.store.lock()?;

    let snapshot = ctx.db.capture_snapshot()?;
    validate_table_names(snapshot.tables())?;
    let sql = ctx.db.full_schema()?;

    let mut state = MigrationState::new();
    let slug = Slug::generate(Utc::now(), INITIAL_COMMENT, state.sequence());
    ctx.store.write_sql(slug.as_str(), &sql)?;
    state.record_migration(slug.clone(), INITIAL_COMMENT, &sql, &SchemaSnapshot::new(), &snapshot)?;
    ctx.store.save(&state)?;

    info!(slug = %slug, tables = snapshot.len(), database = %ctx.db.describe(), "initialized");
    report::success(&format!(
        "Initialized {} with {} tables as {}",
        ctx.store.root().display(),
        snapshot.len(),
        slug
    ));
    Ok(slug)
}
