//! Working-tree and in-progress operation summary.

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use mergeadvisor_core::git::GitBackend;

use crate::style;

/// Show the current branch, tracking state, and any in-progress operation.
pub fn run(backend: GitBackend) -> Result<()> {
    let head = backend.head_branch().context("failed to resolve HEAD")?;
    let unmerged = backend
        .unmerged_entries()
        .context("failed to read index state")?;

    println!();
    println!("{}", style::header("Working tree"));
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Branch", "Commit", "Tracking"]);
    table.add_row(vec![
        Cell::new(&head.name),
        Cell::new(&head.commit_id[..12.min(head.commit_id.len())]),
        Cell::new(head.tracking.as_deref().unwrap_or("-")),
    ]);
    println!("{table}");

    match backend.operation_in_progress() {
        Some(op) => {
            println!(
                "{}",
                style::warn(&format!(
                    "{} in progress, {} unmerged file(s)",
                    op,
                    unmerged.len()
                ))
            );
            for entry in &unmerged {
                println!("  {}", style::dim(&entry.path));
            }
        }
        None => println!("{}", style::success("No operation in progress")),
    }
    println!();
    Ok(())
}
