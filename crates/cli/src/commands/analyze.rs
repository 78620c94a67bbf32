//! Read-only divergence analysis.

use anyhow::{Context, Result};

use mergeadvisor_core::config::AdvisorConfig;
use mergeadvisor_core::git::{GitBackend, MergeMode};
use mergeadvisor_core::session::AdvisorSession;

use crate::present;

/// Analyze divergence against `branch` and render the report.
pub fn run(backend: GitBackend, config: AdvisorConfig, branch: &str, json: bool) -> Result<()> {
    let session = AdvisorSession::start(backend, config, MergeMode::Merge, branch)
        .context("failed to start analysis session")?;
    let report = session.analyze().context("divergence analysis failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    present::print_divergence(&report);
    Ok(())
}
