//! The full interactive merge/rebase workflow.
//!
//! analyze -> attempt -> extract -> cluster -> recommend -> present plan
//! -> approval loop -> execute -> verify -> finalize/pause/abort.
//!
//! Every decision goes through the closed-option decision port; an
//! interactive cancel at any suspension point aborts the backend
//! operation and restores the pre-attempt tree.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use mergeadvisor_core::config::AdvisorConfig;
use mergeadvisor_core::errors::{CoreError, DecisionError, ExecutionError};
use mergeadvisor_core::executor::{FileOutcome, GateClearance};
use mergeadvisor_core::git::{AttemptOutcome, GitBackend, MergeMode};
use mergeadvisor_core::session::{review_plan, AdvisorSession, PlanDecision};
use mergeadvisor_core::verify::{FailureDisposition, VerificationGate};

use crate::interact::CliDecisionPort;
use crate::present;
use crate::style;

/// Run the interactive workflow for one merge or rebase.
pub async fn run(
    backend: GitBackend,
    config: AdvisorConfig,
    mode: MergeMode,
    branch: &str,
    no_commit: bool,
) -> Result<()> {
    let session = AdvisorSession::start(backend, config, mode, branch)
        .context("failed to start advisor session")?;

    println!();
    match mode {
        MergeMode::Merge => println!(
            "{}",
            style::header(&format!(
                "Merging {} into {}",
                style::incoming_branch(&session.target().name),
                style::current_branch(&session.current().name)
            ))
        ),
        MergeMode::Rebase => println!(
            "{}",
            style::header(&format!(
                "Rebasing {} onto {}",
                style::current_branch(&session.current().name),
                style::incoming_branch(&session.target().name)
            ))
        ),
    }

    let report = session.analyze().context("divergence analysis failed")?;
    present::print_divergence(&report);

    match session.attempt().await.context("attempt failed")? {
        AttemptOutcome::Clean => {
            println!("{}", style::success("Completed without conflicts"));
            return Ok(());
        }
        AttemptOutcome::Conflicted => {
            println!("{}", style::warn("Conflicts detected, building resolution plan"));
        }
    }

    let mut port = CliDecisionPort::new();

    // A rebase can stop on several conflicted steps; each round gets its
    // own extraction and plan.
    loop {
        let extraction = session.extract().context("conflict extraction failed")?;
        for malformed in &extraction.malformed {
            println!(
                "{}",
                style::warn(&format!(
                    "{} near line {}: unparseable conflict markers, resolve this file by hand",
                    malformed.path, malformed.line
                ))
            );
        }
        if extraction.records.is_empty() {
            println!(
                "{}",
                style::warn(
                    "No automatable conflicts; resolve the remaining files by hand, \
                     stage them, and finish with git"
                )
            );
            return Ok(());
        }

        let planned = session.plan(&report, extraction)?;
        present::print_plan(&planned.plan, &planned.patterns);

        let plan = match review_plan(&mut port, planned.plan.clone(), &planned.patterns) {
            Ok(PlanDecision::Approved(plan)) => plan,
            Ok(PlanDecision::Rejected)
            | Err(CoreError::Decision(DecisionError::Aborted)) => {
                session.abort().await.context("backend abort failed")?;
                println!("{}", style::warn("Aborted; working tree restored"));
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut executor = session.executor();
        match executor
            .apply(&plan, &planned.patterns, &planned.records)
            .await
        {
            Ok(()) => {}
            Err(ExecutionError::ResidualConflict { files }) => {
                println!(
                    "{}",
                    style::error(&format!(
                        "Rewrite left markers in {}; aborted and restored the tree",
                        files.join(", ")
                    ))
                );
                anyhow::bail!("residual conflict markers after rewrite");
            }
            Err(e) => return Err(e.into()),
        }
        present::print_file_results(executor.file_results());

        let manual_left = executor
            .file_results()
            .iter()
            .any(|f| f.outcome == FileOutcome::StillConflicted);
        if manual_left {
            executor.pause().context("failed to pause execution")?;
            println!(
                "{}",
                style::warn(
                    "Manual patterns remain in the tree; resolve them, stage the files, \
                     then finish with git"
                )
            );
            return Ok(());
        }

        // Verification gate.
        let gate = session
            .verification_gate()
            .context("no test command available; set [verify] test_command")?;
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.blue} {msg}")
                .expect("static template"),
        );
        spinner.set_message(format!("Running {}", gate.command()));
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));
        let outcome = gate.run(session.backend().workdir()).await;
        spinner.finish_and_clear();
        let outcome = outcome.context("verification run failed")?;

        let clearance = if outcome.passed {
            println!("{}", style::success("Tests passed"));
            GateClearance::Passed
        } else {
            println!(
                "{}",
                style::error(&format!("Tests failed (exit {})", outcome.exit_code))
            );
            println!("{}", style::dim(&outcome.summary));
            let mut clearance = None;
            while clearance.is_none() {
                match VerificationGate::disposition(&mut port, &outcome) {
                    Ok(FailureDisposition::Abort) | Err(DecisionError::Aborted) => {
                        executor.abort().await.context("backend abort failed")?;
                        println!("{}", style::warn("Aborted; working tree restored"));
                        return Ok(());
                    }
                    Ok(FailureDisposition::ShowFailures) => {
                        println!("{}", outcome.output);
                    }
                    Ok(FailureDisposition::ContinueAnyway) => {
                        clearance = Some(GateClearance::Overridden);
                    }
                    Ok(FailureDisposition::PauseForManualFix) => {
                        executor.pause().context("failed to pause execution")?;
                        println!(
                            "{}",
                            style::warn(
                                "Paused; fix the failures, then finish with git"
                            )
                        );
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            clearance.unwrap_or(GateClearance::Overridden)
        };

        if no_commit {
            executor.pause().context("failed to pause execution")?;
            println!(
                "{}",
                style::success("Resolution staged; finish with git when ready")
            );
            return Ok(());
        }

        executor.commit(clearance).await.context("finalize failed")?;

        if session.backend().operation_in_progress().is_none() {
            println!("{}", style::success("Resolution committed"));
            return Ok(());
        }
        // Another conflicted rebase step.
        println!(
            "{}",
            style::warn("Rebase stopped on the next conflicted step")
        );
    }
}
