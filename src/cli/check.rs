//! Check command implementation

use anyhow::Result;

use super::{report, Context};
use crate::resolve::Resolution;

/// Exit status for `check`: 0 up to date, 2 pending work, 1 nothing resolvable.
pub fn exit_code(resolution: &Resolution) -> i32 {
    match resolution {
        Resolution::UpToDate => 0,
        Resolution::Next { .. } => 2,
        Resolution::Divergent(advanced) if advanced.candidates.is_empty() => 1,
        Resolution::Divergent(_) => 2,
        Resolution::NoMatch => 1,
    }
}

pub fn run(ctx: &Context, json: bool) -> Result<Resolution> {
    let snapshot = ctx.db.capture_snapshot()?;
    let state = ctx.store.load()?;
    let resolution = state.resolver().resolve(&snapshot);

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        report::resolution(&resolution);
    }
    Ok(resolution)
}
