//! Add command implementation

use anyhow::{Context as _, Result};
use chrono::Utc;
use std::path::Path;
use tracing::{info, warn};

use super::{report, Context};
use crate::error::StateError;
use crate::migration::Slug;
use crate::store::validate_table_names;

/// Copy a SQL file into the state, run it, and record the schema change it made.
pub fn run(ctx: &Context, file: &Path, comment: &str) -> Result<Slug> {
    let sql = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let _lock = ctx.store.lock()?;
    let mut state = ctx.store.load()?;
    let start = ctx.db.capture_snapshot()?;
    validate_table_names(start.tables())?;
    if !state.resolver().is_settled(&start) {
        warn!("database has pending or unrecognized schema changes");
        report::warn(
            "Database is not at the end of any recorded migration; recording from the current state anyway.",
        );
    }

    let slug = Slug::generate(Utc::now(), comment, state.sequence());
    let path = ctx.store.write_sql(slug.as_str(), &sql)?;

    if let Err(e) = ctx.db.run_sql(&path) {
        report::error("Failure. Cleaning up.");
        ctx.store.remove_sql(slug.as_str())?;
        return Err(StateError::ExecutionFailed {
            slug: slug.to_string(),
            reason: format!("{:#}", e),
        }
        .into());
    }

    let end = ctx.db.capture_snapshot()?;
    if let Err(e) = validate_table_names(end.tables()) {
        report::error("The migration created a table that can't be recorded. Cleaning up.");
        ctx.store.remove_sql(slug.as_str())?;
        return Err(e.into());
    }
    let record = state.record_migration(slug.clone(), comment, &sql, &start, &end)?;
    let changed: Vec<String> = record.changed_tables().iter().map(|t| t.to_string()).collect();
    ctx.store.save(&state)?;

    info!(slug = %slug, changed = ?changed, "added migration");
    if changed.is_empty() {
        report::warn(&format!("Recorded {}, but it changed no table schema.", slug));
    } else {
        report::success(&format!("Recorded {} (changed: {})", slug, changed.join(", ")));
    }
    Ok(slug)
}
