//! Rendering of reports, plans, and execution results.

use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};

use mergeadvisor_core::conflict::ConflictPattern;
use mergeadvisor_core::divergence::DivergenceReport;
use mergeadvisor_core::executor::{FileOutcome, FileResult};
use mergeadvisor_core::plan::ResolutionPlan;

use crate::style;

/// Print the divergence report: per-branch commit summaries and the
/// contested files.
pub fn print_divergence(report: &DivergenceReport) {
    println!();
    println!(
        "{}",
        style::header(&format!(
            "Divergence: {} vs {}",
            style::current_branch(&report.current.name),
            style::incoming_branch(&report.target.name)
        ))
    );
    println!(
        "{}",
        style::dim(&format!("merge-base {}", &report.merge_base[..12.min(report.merge_base.len())]))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Branch", "Unique commits", "Files changed", "Latest commit"]);
    for (branch, commits, changes) in [
        (
            &report.current.name,
            &report.current_commits,
            &report.current_changes,
        ),
        (
            &report.target.name,
            &report.target_commits,
            &report.target_changes,
        ),
    ] {
        let latest = commits
            .last()
            .map(|c| c.title.clone())
            .unwrap_or_else(|| "-".into());
        table.add_row(vec![
            Cell::new(branch),
            Cell::new(commits.len()),
            Cell::new(changes.len()),
            Cell::new(latest),
        ]);
    }
    println!("{table}");

    if report.contested_files.is_empty() {
        println!("{}", style::success("No contested files"));
    } else {
        println!(
            "{}",
            style::warn(&format!(
                "{} contested file(s): {}",
                report.contested_files.len(),
                report.contested_files.join(", ")
            ))
        );
        if report.predicted_conflicts.is_empty() {
            println!("{}", style::dim("all contested files should merge cleanly"));
        } else {
            println!(
                "{}",
                style::warn(&format!(
                    "{} likely to conflict: {}",
                    report.predicted_conflicts.len(),
                    report.predicted_conflicts.join(", ")
                ))
            );
        }
    }
    println!();
}

/// Print the resolution plan with its statistics.
pub fn print_plan(plan: &ResolutionPlan, patterns: &[ConflictPattern]) {
    println!();
    println!(
        "{}",
        style::header(&format!(
            "Resolution plan: {} conflict(s) in {} file(s), {} pattern(s), overall {}",
            plan.stats.total_conflicts,
            plan.stats.files_affected,
            plan.stats.patterns_found,
            plan.overall
        ))
    );
    println!();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Pattern", "Kind", "Count", "Files", "Strategy", "Rationale"]);
    for proposal in &plan.proposals {
        let pattern = patterns.iter().find(|p| p.id == proposal.pattern_id);
        let (kind, count, files) = match pattern {
            Some(p) => (
                p.kind.to_string(),
                p.occurrence_count.to_string(),
                p.files.join("\n"),
            ),
            None => ("-".into(), "-".into(), "-".into()),
        };
        table.add_row(vec![
            Cell::new(&proposal.pattern_id),
            Cell::new(kind),
            Cell::new(count),
            Cell::new(files),
            Cell::new(proposal.strategy.to_string()),
            Cell::new(&proposal.rationale),
        ]);
    }
    println!("{table}");

    for proposal in &plan.proposals {
        if !proposal.preserved_todo.is_empty() {
            println!(
                "{}",
                style::dim(&format!(
                    "{}: preserves {}",
                    proposal.pattern_id,
                    proposal.preserved_todo.join("; ")
                ))
            );
        }
    }
    println!();
}

/// Print per-file execution outcomes.
pub fn print_file_results(files: &[FileResult]) {
    for file in files {
        let line = format!("{} ({})", file.path, file.outcome);
        match file.outcome {
            FileOutcome::Resolved => println!("{}", style::success(&line)),
            FileOutcome::StillConflicted => println!("{}", style::warn(&line)),
            FileOutcome::Skipped => println!("{}", style::dim(&line)),
        }
    }
}
