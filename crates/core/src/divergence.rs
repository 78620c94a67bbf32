//! Branch divergence analysis.
//!
//! Given snapshots of the current and target branches, the analyzer
//! computes the commits unique to each side, the files each side touched
//! since the merge-base, and the intersection: the contested files that
//! can produce conflicts. Contested files are additionally probed with a
//! three-way merge to predict which of them will actually conflict.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::DivergenceError;
use crate::git::GitBackend;
use crate::models::{BranchRef, CommitSummary, FileChangeEntry};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of analyzing the divergence between two branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceReport {
    /// The checked-out branch receiving changes.
    pub current: BranchRef,
    /// The branch being merged or rebased in.
    pub target: BranchRef,
    /// Nearest common ancestor of the two branches.
    pub merge_base: String,
    /// Commits only on the current branch, oldest first.
    pub current_commits: Vec<CommitSummary>,
    /// Commits only on the target branch, oldest first.
    pub target_commits: Vec<CommitSummary>,
    /// Files changed since the merge-base on the current side.
    pub current_changes: Vec<FileChangeEntry>,
    /// Files changed since the merge-base on the target side.
    pub target_changes: Vec<FileChangeEntry>,
    /// Files modified by both sides, sorted.
    pub contested_files: Vec<String>,
    /// Contested files whose three-way merge fails cleanly; subset of
    /// `contested_files`.
    pub predicted_conflicts: Vec<String>,
}

impl DivergenceReport {
    /// Free-text summary of what the current branch has been doing,
    /// derived from its commit titles.
    pub fn current_intent(&self) -> String {
        intent_summary(&self.current.name, &self.current_commits)
    }

    /// Free-text summary of what the target branch has been doing.
    pub fn target_intent(&self) -> String {
        intent_summary(&self.target.name, &self.target_commits)
    }
}

/// Summarize a branch's work from its commit titles.
fn intent_summary(branch: &str, commits: &[CommitSummary]) -> String {
    if commits.is_empty() {
        return format!("'{branch}' has no unique commits");
    }
    let mut titles: Vec<&str> = commits
        .iter()
        .rev()
        .take(3)
        .map(|c| c.title.as_str())
        .collect();
    titles.reverse();
    format!("'{}': {}", branch, titles.join("; "))
}

/// Contested files: paths changed on both sides, sorted for determinism.
pub fn contested_files(
    current: &[FileChangeEntry],
    target: &[FileChangeEntry],
) -> Vec<String> {
    let current_paths: BTreeSet<&str> = current.iter().map(|c| c.path.as_str()).collect();
    let target_paths: BTreeSet<&str> = target.iter().map(|c| c.path.as_str()).collect();
    current_paths
        .intersection(&target_paths)
        .map(|p| p.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Stateless divergence analyzer.
pub struct DivergenceAnalyzer;

impl DivergenceAnalyzer {
    /// Analyze the divergence between `current` and `target`.
    ///
    /// Fails with [`DivergenceError::NoMergeBase`] when the histories are
    /// unrelated; the analyzer never guesses a base.
    pub fn analyze(
        backend: &GitBackend,
        current: &BranchRef,
        target: &BranchRef,
    ) -> Result<DivergenceReport, DivergenceError> {
        info!(current = %current.name, target = %target.name, "analyzing divergence");

        let merge_base = backend
            .merge_base(&current.commit_id, &target.commit_id)?
            .ok_or_else(|| DivergenceError::NoMergeBase {
                current: current.name.clone(),
                target: target.name.clone(),
            })?;

        let current_commits = backend.commits_only_on(&current.commit_id, &target.commit_id)?;
        let target_commits = backend.commits_only_on(&target.commit_id, &current.commit_id)?;
        let current_changes = backend.changed_since(&merge_base, &current.commit_id)?;
        let target_changes = backend.changed_since(&merge_base, &target.commit_id)?;
        let contested = contested_files(&current_changes, &target_changes);
        let predicted =
            Self::predict_conflicts(backend, &merge_base, current, target, &contested)?;

        debug!(
            current_commits = current_commits.len(),
            target_commits = target_commits.len(),
            contested = contested.len(),
            predicted = predicted.len(),
            "divergence computed"
        );

        Ok(DivergenceReport {
            current: current.clone(),
            target: target.clone(),
            merge_base,
            current_commits,
            target_commits,
            current_changes,
            target_changes,
            contested_files: contested,
            predicted_conflicts: predicted,
        })
    }

    /// Probe each contested file with a three-way merge; files that do
    /// not merge cleanly are predicted to conflict.
    fn predict_conflicts(
        backend: &GitBackend,
        merge_base: &str,
        current: &BranchRef,
        target: &BranchRef,
        contested: &[String],
    ) -> Result<Vec<String>, DivergenceError> {
        let mut predicted = Vec::new();
        for path in contested {
            let ancestor = backend.file_text_at(merge_base, path)?.unwrap_or_default();
            let ours = backend
                .file_text_at(&current.commit_id, path)?
                .unwrap_or_default();
            let theirs = backend
                .file_text_at(&target.commit_id, path)?
                .unwrap_or_default();
            if diffy::merge(&ancestor, &ours, &theirs).is_err() {
                predicted.push(path.clone());
            }
        }
        Ok(predicted)
    }
}
