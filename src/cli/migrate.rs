//! Migrate command implementation

use anyhow::Result;
use tracing::{info, warn};

use super::{report, Context};
use crate::error::StateError;
use crate::hash::ContentHash;
use crate::migration::Slug;
use crate::snapshot::SchemaSnapshot;
use crate::state::MigrationState;
use crate::validate::Mode;

/// Outcome of running one migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The database reached the recorded end state.
    Clean,
    /// The SQL ran but some changed tables ended up elsewhere.
    Diverged,
}

/// Run the named migration, or the one simple resolution points at.
/// With `all`, keep following simple resolution until nothing is left.
pub fn run(ctx: &Context, slug: Option<String>, all: bool) -> Result<Vec<Slug>> {
    let _lock = ctx.store.lock()?;
    let state = ctx.store.load()?;

    if let Some(slug) = slug {
        let slug = Slug::parse(&slug)?;
        let snapshot = ctx.db.capture_snapshot()?;
        apply(ctx, &state, &slug, &snapshot)?;
        return Ok(vec![slug]);
    }

    let mut applied = vec![];
    // every migration can run at most once along a linear chain
    for _ in 0..state.sequence().len().max(1) {
        let snapshot = ctx.db.capture_snapshot()?;
        let Some(next) = state.resolver().find_next_simple(&snapshot) else {
            break;
        };
        let outcome = apply(ctx, &state, &next, &snapshot)?;
        applied.push(next);
        if !all || outcome == Applied::Diverged {
            break;
        }
    }

    if applied.is_empty() {
        let snapshot = ctx.db.capture_snapshot()?;
        if state.resolver().is_settled(&snapshot) {
            report::success("Already up to date.");
        } else {
            return Err(StateError::NoObviousMigration.into());
        }
    }
    Ok(applied)
}

/// Precheck, execute, postcheck one migration against the live database.
pub fn apply(
    ctx: &Context,
    state: &MigrationState,
    slug: &Slug,
    start: &SchemaSnapshot,
) -> Result<Applied> {
    let violations = state.check_validity(slug.as_str(), start, Mode::Pre)?;
    if !violations.is_empty() {
        report::error(&format!("Can't run {}:", slug));
        report::violations(&violations);
        return Err(StateError::PreconditionViolated {
            slug: slug.to_string(),
            tables: violations.into_iter().map(|v| v.table).collect(),
        }
        .into());
    }

    if sql_has_drifted(ctx, state, slug)? {
        warn!(slug = %slug, "migration SQL changed since it was recorded");
        report::warn(&format!("SQL for {} changed since it was recorded.", slug));
    }

    report::info(&format!("Running {}", slug));
    ctx.db
        .run_sql(&ctx.store.sql_path(slug.as_str()))
        .map_err(|e| StateError::ExecutionFailed {
            slug: slug.to_string(),
            reason: format!("{:#}", e),
        })?;

    let end = ctx.db.capture_snapshot()?;
    let violations = state.check_validity(slug.as_str(), &end, Mode::Post)?;
    if violations.is_empty() {
        info!(slug = %slug, "migration applied");
        report::success(&format!("Applied {}", slug));
        Ok(Applied::Clean)
    } else {
        warn!(
            slug = %slug,
            tables = violations.len(),
            "post-run state does not match the recorded end state"
        );
        report::error(&format!(
            "Run failed! {} may have left these tables in an unexpected state:",
            slug
        ));
        report::violations(&violations);
        Ok(Applied::Diverged)
    }
}

/// Whether the stored body no longer hashes to what was recorded.
/// Informational only: the body still runs.
pub fn sql_has_drifted(ctx: &Context, state: &MigrationState, slug: &Slug) -> Result<bool> {
    let Some(record) = state.sequence().get(slug.as_str()) else {
        return Ok(false);
    };
    let sql = ctx.store.read_sql(slug.as_str())?;
    Ok(ContentHash::of(&sql) != *record.sql_content_hash())
}
