//! Styled terminal rendering of engine results

use owo_colors::OwoColorize;

use crate::resolve::{AdvancedResolution, Resolution, TableIssue};
use crate::validate::Violation;

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a list item
pub fn list_item(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

pub fn violations(violations: &[Violation]) {
    for v in violations {
        list_item(&format!(
            "{}: expected {}, found {}",
            v.table.bold(),
            v.expected.short(),
            describe_hash(v.actual.short(), v.actual.is_empty_schema())
        ));
    }
}

fn describe_hash(short: &str, absent: bool) -> String {
    if absent {
        "<absent>".to_string()
    } else {
        short.to_string()
    }
}

pub fn resolution(resolution: &Resolution) {
    match resolution {
        Resolution::UpToDate => success("Up to date."),
        Resolution::Next { slug } => {
            info(&format!("Next migration (simple): {}", slug.as_str().blue()));
        }
        Resolution::Divergent(advanced) => {
            warn("Non-linearizable migrations.");
            advanced_resolution(advanced);
        }
        Resolution::NoMatch => error("No migrations recorded."),
    }
}

pub fn advanced_resolution(result: &AdvancedResolution) {
    for issue in &result.issues {
        match issue {
            TableIssue::UnknownState { table, hash } => {
                error(&format!("Unknown state: {}: {}", table, hash));
            }
            TableIssue::UnknownTable { table, .. } => {
                error(&format!("Unknown table: {}", table));
            }
        }
    }

    for (slug, candidate) in result.runnable() {
        println!(
            "Migration: {} for tables: {}",
            slug.as_str().blue(),
            candidate.ready_tables.join(", ").blue()
        );
    }

    for (slug, candidate) in result.blocked() {
        println!(
            "Can't run migration: {} for tables: {}",
            slug.as_str().yellow(),
            candidate.ready_tables.join(", ").yellow()
        );
        println!("  tables in violation:");
        violations(&candidate.violations);
    }
}
