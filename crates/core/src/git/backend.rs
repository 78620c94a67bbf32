//! Git repository backend.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use git2::{BranchType, Delta, Diff, DiffFindOptions, Oid, Patch, Repository, RepositoryState, Sort};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;
use crate::models::{BranchRef, ChangeKind, CommitSummary, FileChangeEntry};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Whether the session merges the target branch into the current one or
/// rebases the current branch onto it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    Merge,
    Rebase,
}

impl std::fmt::Display for MergeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

/// Outcome of starting or continuing a merge/rebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The operation completed without conflicts.
    Clean,
    /// The operation stopped with conflicts in the working tree.
    Conflicted,
}

/// Kind of an unmerged index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmergedKind {
    /// Both sides modified the file; markers are present in the tree.
    BothModified,
    /// Both sides added the same path independently.
    BothAdded,
    /// The current branch deleted, the incoming branch modified.
    DeletedByUs,
    /// The incoming branch deleted, the current branch modified.
    DeletedByThem,
    /// The file was renamed differently on each side.
    Renamed,
}

/// One unmerged entry from the index after a conflicted merge/rebase.
#[derive(Debug, Clone)]
pub struct UnmergedEntry {
    /// Primary path of the conflict (our side when present).
    pub path: String,
    /// Path on the incoming side, when it differs (renames).
    pub their_path: Option<String>,
    /// Blob id of our side, when present.
    pub our_id: Option<String>,
    /// Blob id of the incoming side, when present.
    pub their_id: Option<String>,
    pub kind: UnmergedKind,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// High-level Git backend over one repository working tree.
pub struct GitBackend {
    repo: Repository,
    workdir: PathBuf,
}

impl GitBackend {
    /// Open the repository containing `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GitError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::discover(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::NoWorkingTree(path.display().to_string()))?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    // -----------------------------------------------------------------------
    // Branch queries
    // -----------------------------------------------------------------------

    /// Snapshot the currently checked-out branch.
    pub fn head_branch(&self) -> Result<BranchRef, GitError> {
        let head = self.repo.head()?;
        if !head.is_branch() {
            return Err(GitError::RefNotFound("HEAD (detached)".into()));
        }
        let name = head.shorthand().unwrap_or("HEAD").to_string();
        self.branch_ref(&name)
    }

    /// Snapshot a local branch by name.
    pub fn branch_ref(&self, name: &str) -> Result<BranchRef, GitError> {
        let branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| GitError::RefNotFound(name.to_string()))?;
        let commit = branch.get().peel_to_commit()?;
        let tracking = branch
            .upstream()
            .ok()
            .and_then(|u| u.name().ok().flatten().map(String::from));
        Ok(BranchRef {
            name: name.to_string(),
            commit_id: commit.id().to_string(),
            tracking,
        })
    }

    fn resolve_commit(&self, refname: &str) -> Result<Oid, GitError> {
        let object = self
            .repo
            .revparse_single(refname)
            .map_err(|_| GitError::RefNotFound(refname.to_string()))?;
        Ok(object.peel_to_commit()?.id())
    }

    /// Nearest common ancestor of two refs, or `None` for unrelated
    /// histories.
    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>, GitError> {
        let oid_a = self.resolve_commit(a)?;
        let oid_b = self.resolve_commit(b)?;
        match self.repo.merge_base(oid_a, oid_b) {
            Ok(base) => Ok(Some(base.to_string())),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // History queries
    // -----------------------------------------------------------------------

    /// Commits reachable from `tip` but not from `exclude`, oldest first.
    #[instrument(skip(self))]
    pub fn commits_only_on(&self, tip: &str, exclude: &str) -> Result<Vec<CommitSummary>, GitError> {
        let mut walk = self.repo.revwalk()?;
        walk.push(self.resolve_commit(tip)?)?;
        walk.hide(self.resolve_commit(exclude)?)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            let tree = commit.tree()?;
            let parent_tree = match commit.parent_count() {
                0 => None,
                _ => Some(commit.parent(0)?.tree()?),
            };
            let mut diff =
                self.repo
                    .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
            let changes = self.diff_entries(&mut diff)?;
            commits.push(CommitSummary {
                id: commit.id().to_string(),
                title: commit.summary().unwrap_or_default().to_string(),
                body: commit.body().unwrap_or_default().to_string(),
                changes,
            });
        }
        debug!(tip, exclude, count = commits.len(), "collected divergent commits");
        Ok(commits)
    }

    /// Name-status changes between `base` and `tip` trees.
    pub fn changed_since(&self, base: &str, tip: &str) -> Result<Vec<FileChangeEntry>, GitError> {
        let base_tree = self
            .repo
            .find_commit(self.resolve_commit(base)?)?
            .tree()?;
        let tip_tree = self.repo.find_commit(self.resolve_commit(tip)?)?.tree()?;
        let mut diff = self
            .repo
            .diff_tree_to_tree(Some(&base_tree), Some(&tip_tree), None)?;
        self.diff_entries(&mut diff)
    }

    fn diff_entries(&self, diff: &mut Diff<'_>) -> Result<Vec<FileChangeEntry>, GitError> {
        diff.find_similar(Some(&mut DiffFindOptions::new()))?;
        let mut entries = Vec::new();
        for (idx, delta) in diff.deltas().enumerate() {
            let change_kind = match delta.status() {
                Delta::Added => ChangeKind::Added,
                Delta::Deleted => ChangeKind::Deleted,
                Delta::Renamed => ChangeKind::Renamed {
                    from: delta
                        .old_file()
                        .path()
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or_default(),
                },
                Delta::Unmodified => continue,
                _ => ChangeKind::Modified,
            };
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default();
            let (lines_added, lines_removed) = match Patch::from_diff(diff, idx)? {
                Some(patch) => {
                    let (_, adds, dels) = patch.line_stats()?;
                    (adds, dels)
                }
                None => (0, 0),
            };
            entries.push(FileChangeEntry {
                path,
                change_kind,
                lines_added,
                lines_removed,
            });
        }
        Ok(entries)
    }

    // -----------------------------------------------------------------------
    // Working-tree state
    // -----------------------------------------------------------------------

    /// Operation currently in progress in this working tree, if any.
    pub fn operation_in_progress(&self) -> Option<&'static str> {
        match self.repo.state() {
            RepositoryState::Merge => Some("merge"),
            RepositoryState::Rebase
            | RepositoryState::RebaseInteractive
            | RepositoryState::RebaseMerge => Some("rebase"),
            _ => None,
        }
    }

    /// Unmerged entries from the index after a conflicted attempt.
    pub fn unmerged_entries(&self) -> Result<Vec<UnmergedEntry>, GitError> {
        let mut index = self.repo.index()?;
        // The attempt ran in a subprocess; reload the index from disk.
        index.read(false)?;
        let mut entries = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let path_of = |e: &Option<git2::IndexEntry>| {
                e.as_ref()
                    .map(|e| String::from_utf8_lossy(&e.path).to_string())
            };
            let id_of =
                |e: &Option<git2::IndexEntry>| e.as_ref().map(|e| e.id.to_string());

            let our_path = path_of(&conflict.our);
            let their_path = path_of(&conflict.their);
            let ancestor_path = path_of(&conflict.ancestor);

            let kind = match (&conflict.ancestor, &conflict.our, &conflict.their) {
                (_, Some(_), None) => UnmergedKind::DeletedByThem,
                (_, None, Some(_)) => UnmergedKind::DeletedByUs,
                (None, Some(_), Some(_)) => UnmergedKind::BothAdded,
                (Some(_), Some(_), Some(_)) => {
                    if our_path != their_path {
                        UnmergedKind::Renamed
                    } else {
                        UnmergedKind::BothModified
                    }
                }
                (_, None, None) => continue,
            };

            let path = our_path
                .clone()
                .or_else(|| their_path.clone())
                .or(ancestor_path)
                .unwrap_or_default();
            entries.push(UnmergedEntry {
                path,
                their_path: their_path.filter(|p| Some(p) != our_path.as_ref()),
                our_id: id_of(&conflict.our),
                their_id: id_of(&conflict.their),
                kind,
            });
        }
        debug!(count = entries.len(), "collected unmerged entries");
        Ok(entries)
    }

    /// Content of a blob by id (used for the sides of marker-less conflicts).
    pub fn blob_text(&self, id: &str) -> Result<String, GitError> {
        let oid = Oid::from_str(id)?;
        let blob = self.repo.find_blob(oid)?;
        Ok(String::from_utf8_lossy(blob.content()).to_string())
    }

    /// Content of `path` at a commit, or `None` when absent there.
    pub fn file_text_at(&self, commitish: &str, path: &str) -> Result<Option<String>, GitError> {
        let commit = self.repo.find_commit(self.resolve_commit(commitish)?)?;
        let tree = commit.tree()?;
        match tree.get_path(Path::new(path)) {
            Ok(entry) => {
                let object = entry.to_object(&self.repo)?;
                Ok(object
                    .as_blob()
                    .map(|b| String::from_utf8_lossy(b.content()).to_string()))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // -----------------------------------------------------------------------
    // Porcelain operations
    // -----------------------------------------------------------------------

    /// Start a merge or rebase of `branch` into/onto the current branch.
    #[instrument(skip(self))]
    pub async fn begin(&self, mode: MergeMode, branch: &str) -> Result<AttemptOutcome, GitError> {
        let args: &[&str] = match mode {
            MergeMode::Merge => &["merge", branch],
            MergeMode::Rebase => &["rebase", branch],
        };
        let output = self.git_output(args).await?;
        if output.status.success() {
            info!(%mode, branch, "attempt completed cleanly");
            return Ok(AttemptOutcome::Clean);
        }
        if self.operation_in_progress().is_some() {
            info!(%mode, branch, "attempt stopped with conflicts");
            return Ok(AttemptOutcome::Conflicted);
        }
        Err(Self::command_failed(&format!("{mode}"), &output))
    }

    /// Continue an in-progress rebase after conflicts were staged.
    #[instrument(skip(self))]
    pub async fn continue_rebase(&self) -> Result<AttemptOutcome, GitError> {
        let output = self.git_output(&["rebase", "--continue"]).await?;
        if output.status.success() {
            return Ok(AttemptOutcome::Clean);
        }
        if self.operation_in_progress().is_some() {
            info!("rebase continued into another conflicted step");
            return Ok(AttemptOutcome::Conflicted);
        }
        Err(Self::command_failed("rebase --continue", &output))
    }

    /// Abort the in-progress operation, restoring the pre-attempt tree.
    #[instrument(skip(self))]
    pub async fn abort(&self, mode: MergeMode) -> Result<(), GitError> {
        let args: &[&str] = match mode {
            MergeMode::Merge => &["merge", "--abort"],
            MergeMode::Rebase => &["rebase", "--abort"],
        };
        self.run_git(args).await?;
        info!(%mode, "aborted in-progress operation");
        Ok(())
    }

    /// Stage one path (content change or deletion).
    pub async fn stage(&self, path: &str) -> Result<(), GitError> {
        self.run_git(&["add", "--", path]).await?;
        debug!(path, "staged file");
        Ok(())
    }

    /// Create the merge commit from the staged resolution, keeping the
    /// message git prepared for the merge.
    #[instrument(skip(self))]
    pub async fn finalize_merge(&self) -> Result<(), GitError> {
        self.run_git(&["commit", "--no-edit"]).await?;
        info!("created merge commit");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Subprocess plumbing
    // -----------------------------------------------------------------------

    async fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.git_output(args).await?;
        if !output.status.success() {
            let operation = args.join(" ");
            let err = Self::command_failed(&operation, &output);
            warn!(%operation, "git command failed");
            return Err(err);
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn git_output(&self, args: &[&str]) -> Result<std::process::Output, GitError> {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.workdir)
            .args(args)
            .env("GIT_EDITOR", "true")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = %format!("git {}", args.join(" ")), "running git command");
        cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::BinaryNotFound("git".into())
            } else {
                GitError::IoError(e)
            }
        })
    }

    fn command_failed(operation: &str, output: &std::process::Output) -> GitError {
        let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.is_empty() {
            stderr = String::from_utf8_lossy(&output.stdout).trim().to_string();
        }
        GitError::CommandFailed {
            operation: operation.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_mode_display() {
        assert_eq!(MergeMode::Merge.to_string(), "merge");
        assert_eq!(MergeMode::Rebase.to_string(), "rebase");
    }

    #[test]
    fn test_open_rejects_non_repository() {
        let dir = tempfile::tempdir().unwrap();
        let result = GitBackend::open(dir.path());
        assert!(matches!(result, Err(GitError::RepositoryNotFound(_))));
    }
}
