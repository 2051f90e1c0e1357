//! History command implementation

use anyhow::Result;

use super::{report, Context};

pub fn run(ctx: &Context) -> Result<()> {
    let state = ctx.store.load()?;

    report::header("Known migrations");
    for (slug, record) in state.sequence().iter() {
        let changed = record.changed_tables();
        let summary = if changed.is_empty() {
            "no table changes".to_string()
        } else {
            changed.join(", ")
        };
        report::list_item(&format!("{}  {}  [{}]", slug, record.comment(), summary));
    }

    for point in state.index().branch_points() {
        report::warn(&format!(
            "Branch: {} at {} is advanced by {}",
            point.table,
            point.start_hash.short(),
            point
                .slugs
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    Ok(())
}
