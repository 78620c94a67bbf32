//! Shared data model for one advisor run.
//!
//! These types are immutable snapshots produced once per analysis and never
//! mutated afterwards. Branch and commit state is captured explicitly here
//! rather than re-queried, so one workflow run always reasons about one
//! consistent view of the repository.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

/// Immutable snapshot of a branch, taken at session start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BranchRef {
    /// Short branch name (e.g. `main`, `feature/retry`).
    pub name: String,
    /// Commit id the branch pointed at when the snapshot was taken.
    pub commit_id: String,
    /// Tracking remote branch, if configured (e.g. `origin/main`).
    pub tracking: Option<String>,
}

// ---------------------------------------------------------------------------
// Commits and file changes
// ---------------------------------------------------------------------------

/// Kind of change to a file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    Renamed { from: String },
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
            Self::Renamed { from } => write!(f, "renamed from {}", from),
        }
    }
}

/// One changed file within a commit or a diff against the merge-base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChangeEntry {
    /// Path relative to the repository root.
    pub path: String,
    /// The kind of change.
    pub change_kind: ChangeKind,
    /// Lines added by the change.
    pub lines_added: usize,
    /// Lines removed by the change.
    pub lines_removed: usize,
}

/// Summary of a single commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Full commit id.
    pub id: String,
    /// First line of the commit message.
    pub title: String,
    /// Remaining message body (may be empty).
    pub body: String,
    /// Ordered list of files the commit changed.
    pub changes: Vec<FileChangeEntry>,
}

impl CommitSummary {
    /// Abbreviated commit id for display.
    pub fn short_id(&self) -> &str {
        if self.id.len() > 8 {
            &self.id[..8]
        } else {
            &self.id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_display() {
        assert_eq!(ChangeKind::Modified.to_string(), "modified");
        assert_eq!(
            ChangeKind::Renamed {
                from: "old.rs".into()
            }
            .to_string(),
            "renamed from old.rs"
        );
    }

    #[test]
    fn test_short_id() {
        let commit = CommitSummary {
            id: "0123456789abcdef".into(),
            title: "add retry".into(),
            body: String::new(),
            changes: Vec::new(),
        };
        assert_eq!(commit.short_id(), "01234567");

        let short = CommitSummary {
            id: "abc".into(),
            title: String::new(),
            body: String::new(),
            changes: Vec::new(),
        };
        assert_eq!(short.short_id(), "abc");
    }
}
