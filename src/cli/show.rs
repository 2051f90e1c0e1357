//! Show command implementation

use anyhow::Result;

use super::{report, Context};
use crate::error::StateError;

/// Print a migration's metadata and SQL. Defaults to the most recent one.
pub fn run(ctx: &Context, slug: Option<String>) -> Result<()> {
    let state = ctx.store.load()?;
    let (slug, record) = match slug {
        Some(slug) => {
            let record = state
                .sequence()
                .get(&slug)
                .ok_or_else(|| StateError::UnknownMigration(slug.clone()))?;
            (slug, record)
        }
        None => {
            let (slug, record) = state
                .sequence()
                .latest()
                .ok_or_else(|| StateError::NotInitialized(ctx.store.root().display().to_string()))?;
            (slug.to_string(), record)
        }
    };

    report::header(&format!("Showing {}", slug));
    report::kv("Comment", record.comment());
    report::kv("Changed", &record.changed_tables().join(", "));
    report::kv("File", &ctx.store.sql_path(&slug).display().to_string());
    println!();
    println!("{}", ctx.store.read_sql(&slug)?);

    for table in record.changed_tables() {
        let end = record.end_of(table);
        report::header(&format!("{} after {}", table, slug));
        match state.tables().text_at(table, &end) {
            Some(text) => println!("{}", text),
            None if end.is_empty_schema() => println!("(dropped)"),
            None => report::warn(&format!(
                "No recorded schema text for {} at {}",
                table,
                end.short()
            )),
        }
    }
    Ok(())
}
