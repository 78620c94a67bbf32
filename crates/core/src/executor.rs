//! Resolution executor.
//!
//! Applies an approved plan to the working tree under a small state
//! machine:
//!
//! ```text
//! PLANNED -> APPLYING -> STAGED -> { COMMITTED | PAUSED_FOR_REVIEW | ABORTED }
//! ```
//!
//! Every transition is checked; any non-terminal state can move to
//! `ABORTED`, which invokes the backend's native abort exactly once and
//! leaves the working tree in its pre-attempt state. A rewrite that
//! leaves conflict markers behind aborts rather than staging damaged
//! files.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::conflict::extractor::contains_conflict_markers;
use crate::conflict::{ConflictKind, ConflictPattern, ConflictRecord, Strategy};
use crate::errors::{ConflictError, ExecutionError};
use crate::git::{GitBackend, MergeMode};
use crate::plan::ResolutionPlan;
use crate::verify::TestOutcome;

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// States of one execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Planned,
    Applying,
    Staged,
    Committed,
    PausedForReview,
    Aborted,
}

impl std::fmt::Display for ExecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::Applying => write!(f, "applying"),
            Self::Staged => write!(f, "staged"),
            Self::Committed => write!(f, "committed"),
            Self::PausedForReview => write!(f, "paused_for_review"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl ExecState {
    /// Whether the machine may move from `self` to `to`.
    pub fn can_transition(self, to: ExecState) -> bool {
        use ExecState::*;
        matches!(
            (self, to),
            (Planned, Applying)
                | (Applying, Staged)
                | (Staged, Committed)
                | (Staged, PausedForReview)
                | (Planned, Aborted)
                | (Applying, Aborted)
                | (Staged, Aborted)
                | (PausedForReview, Aborted)
        )
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Per-file outcome of an execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Resolved,
    StillConflicted,
    Skipped,
}

impl std::fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::StillConflicted => write!(f, "still conflicted"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileResult {
    pub path: String,
    pub outcome: FileOutcome,
}

/// How the verification gate was cleared before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateClearance {
    /// The test command passed.
    Passed,
    /// The user chose to continue despite a failure; the override is
    /// recorded here.
    Overridden,
}

/// Terminal artifact of one workflow run.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub state: ExecState,
    pub files: Vec<FileResult>,
    pub staged_files: Vec<String>,
    pub test_outcome: Option<TestOutcome>,
    pub gate: Option<GateClearance>,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Applies an approved plan's strategies to the working tree.
pub struct ResolutionExecutor<'a> {
    backend: &'a GitBackend,
    mode: MergeMode,
    state: ExecState,
    files: Vec<FileResult>,
    staged: Vec<String>,
    gate: Option<GateClearance>,
    abort_invoked: bool,
}

impl<'a> ResolutionExecutor<'a> {
    pub fn new(backend: &'a GitBackend, mode: MergeMode) -> Self {
        Self {
            backend,
            mode,
            state: ExecState::Planned,
            files: Vec::new(),
            staged: Vec::new(),
            gate: None,
            abort_invoked: false,
        }
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    pub fn staged_files(&self) -> &[String] {
        &self.staged
    }

    pub fn file_results(&self) -> &[FileResult] {
        &self.files
    }

    fn transition(&mut self, to: ExecState) -> Result<(), ExecutionError> {
        if !self.state.can_transition(to) {
            return Err(ExecutionError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        debug!(from = %self.state, to = %to, "execution state transition");
        self.state = to;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Apply
    // -----------------------------------------------------------------------

    /// Apply the plan's per-pattern strategies to their member records.
    ///
    /// Files are rewritten sequentially in plan order; regions within one
    /// file are rewritten bottom-up so recorded line ranges stay valid.
    /// Files whose automated rewrites leave markers behind trigger an
    /// abort with [`ExecutionError::ResidualConflict`].
    pub async fn apply(
        &mut self,
        plan: &ResolutionPlan,
        patterns: &[ConflictPattern],
        records: &[ConflictRecord],
    ) -> Result<(), ExecutionError> {
        self.transition(ExecState::Applying)?;
        info!(patterns = plan.proposals.len(), "applying resolution plan");

        let record_by_id: HashMap<&str, &ConflictRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();
        let pattern_by_id: HashMap<&str, &ConflictPattern> =
            patterns.iter().map(|p| (p.id.as_str(), p)).collect();

        // Per-file work lists, in plan order.
        let mut file_order: Vec<&str> = Vec::new();
        let mut ops_by_file: HashMap<&str, Vec<ResolveOp<'_>>> = HashMap::new();
        for proposal in &plan.proposals {
            let pattern = pattern_by_id
                .get(proposal.pattern_id.as_str())
                .ok_or_else(|| {
                    ConflictError::RecordNotFound(proposal.pattern_id.clone())
                })?;
            for member_id in &pattern.member_ids {
                let record = record_by_id
                    .get(member_id.as_str())
                    .copied()
                    .ok_or_else(|| ConflictError::RecordNotFound(member_id.clone()))?;
                if !file_order.contains(&record.file_path.as_str()) {
                    file_order.push(&record.file_path);
                }
                ops_by_file
                    .entry(record.file_path.as_str())
                    .or_default()
                    .push(ResolveOp {
                        record,
                        strategy: proposal.strategy,
                        todo: &proposal.preserved_todo,
                    });
            }
        }

        let mut residual: Vec<String> = Vec::new();
        for path in file_order {
            let ops = &ops_by_file[path];
            let outcome = self.apply_file(path, ops).await?;
            if outcome == FileOutcome::Resolved {
                self.backend.stage(path).await?;
                self.staged.push(path.to_string());
            }
            if outcome == FileOutcome::StillConflicted
                && ops.iter().all(|op| op.strategy != Strategy::Manual)
            {
                residual.push(path.to_string());
            }
            self.files.push(FileResult {
                path: path.to_string(),
                outcome,
            });
        }

        if !residual.is_empty() {
            warn!(files = ?residual, "rewrite left conflict markers, aborting");
            self.abort().await?;
            return Err(ExecutionError::ResidualConflict { files: residual });
        }

        self.transition(ExecState::Staged)?;
        info!(staged = self.staged.len(), "plan applied");
        Ok(())
    }

    /// Rewrite one file according to its ops.
    async fn apply_file(
        &self,
        path: &str,
        ops: &[ResolveOp<'_>],
    ) -> Result<FileOutcome, ExecutionError> {
        let abs = self.backend.workdir().join(path);

        // Whole-file conflicts (delete-vs-modify, renames) replace or
        // remove the file outright.
        if let Some(op) = ops.iter().find(|op| is_whole_file(op.record)) {
            return self.apply_whole_file(&abs, op);
        }

        if ops.iter().all(|op| op.strategy == Strategy::Manual) {
            debug!(path, "all blocks manual, leaving file untouched");
            return Ok(FileOutcome::StillConflicted);
        }

        let contents = std::fs::read_to_string(&abs)?;
        let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();

        // Bottom-up keeps earlier ranges valid while later ones rewrite.
        let mut ordered: Vec<&ResolveOp<'_>> = ops.iter().collect();
        ordered.sort_by(|a, b| b.record.start_line.cmp(&a.record.start_line));
        let mut manual_left = false;
        for op in ordered {
            if op.strategy == Strategy::Manual {
                manual_left = true;
                continue;
            }
            rewrite_block(&mut lines, op.record, op.strategy, op.todo);
        }

        let rewritten = join_lines(&lines, contents.ends_with('\n'));
        std::fs::write(&abs, &rewritten)?;

        if manual_left {
            return Ok(FileOutcome::StillConflicted);
        }
        if contains_conflict_markers(&rewritten) {
            return Ok(FileOutcome::StillConflicted);
        }
        Ok(FileOutcome::Resolved)
    }

    fn apply_whole_file(
        &self,
        abs: &std::path::Path,
        op: &ResolveOp<'_>,
    ) -> Result<FileOutcome, ExecutionError> {
        let chosen = match op.strategy {
            Strategy::KeepBase => &op.record.base_text,
            Strategy::KeepIncoming => &op.record.incoming_text,
            Strategy::MergeBoth => {
                // Whole-file sides cannot be concatenated meaningfully.
                return Ok(FileOutcome::Skipped);
            }
            Strategy::Manual => return Ok(FileOutcome::StillConflicted),
        };
        if chosen.is_empty() {
            if abs.exists() {
                std::fs::remove_file(abs)?;
            }
        } else {
            std::fs::write(abs, chosen)?;
        }
        Ok(FileOutcome::Resolved)
    }

    // -----------------------------------------------------------------------
    // Terminal transitions
    // -----------------------------------------------------------------------

    /// Abort the execution and the backend's in-progress operation.
    ///
    /// The backend's native abort is invoked exactly once, no matter how
    /// the abort is reached.
    pub async fn abort(&mut self) -> Result<(), ExecutionError> {
        self.transition(ExecState::Aborted)?;
        if !self.abort_invoked {
            self.abort_invoked = true;
            self.backend.abort(self.mode).await?;
        }
        info!("execution aborted, working tree restored");
        Ok(())
    }

    /// Stop after staging for a later, explicit commit.
    pub fn pause(&mut self) -> Result<(), ExecutionError> {
        self.transition(ExecState::PausedForReview)?;
        info!("execution paused for review");
        Ok(())
    }

    /// Finalize the staged resolution. Callers clear the verification
    /// gate first; the clearance is recorded in the result.
    pub async fn commit(&mut self, clearance: GateClearance) -> Result<(), ExecutionError> {
        if !self.state.can_transition(ExecState::Committed) {
            return Err(ExecutionError::InvalidTransition {
                from: self.state.to_string(),
                to: ExecState::Committed.to_string(),
            });
        }
        match self.mode {
            MergeMode::Merge => self.backend.finalize_merge().await?,
            MergeMode::Rebase => {
                self.backend.continue_rebase().await?;
            }
        }
        self.state = ExecState::Committed;
        self.gate = Some(clearance);
        info!(clearance = ?clearance, "resolution committed");
        Ok(())
    }

    /// Consume the executor into its terminal artifact.
    pub fn into_result(self, test_outcome: Option<TestOutcome>) -> ExecutionResult {
        ExecutionResult {
            state: self.state,
            files: self.files,
            staged_files: self.staged,
            test_outcome,
            gate: self.gate,
        }
    }
}

struct ResolveOp<'r> {
    record: &'r ConflictRecord,
    strategy: Strategy,
    todo: &'r [String],
}

/// Whole-file conflicts (delete-vs-modify, renames) have no marker block
/// to rewrite; the file is replaced or removed outright.
fn is_whole_file(record: &ConflictRecord) -> bool {
    matches!(
        record.kind,
        ConflictKind::DeletionVsModification | ConflictKind::Rename
    )
}

// ---------------------------------------------------------------------------
// Region rewriting
// ---------------------------------------------------------------------------

/// Replace a record's marker block with the chosen side(s).
///
/// `lines` holds the whole file; the record's 1-indexed `start_line` /
/// `end_line` bound the marker block inclusive of both markers.
fn rewrite_block(
    lines: &mut Vec<String>,
    record: &ConflictRecord,
    strategy: Strategy,
    todo: &[String],
) {
    if record.start_line == 0 || record.end_line > lines.len() {
        return;
    }
    let mut replacement: Vec<String> = Vec::new();
    match strategy {
        Strategy::KeepBase => {
            replacement.extend(record.base_text.lines().map(str::to_string));
            annotate(&mut replacement, &record.base_text, todo);
        }
        Strategy::KeepIncoming => {
            replacement.extend(record.incoming_text.lines().map(str::to_string));
            annotate(&mut replacement, &record.incoming_text, todo);
        }
        Strategy::MergeBoth => {
            replacement.extend(record.base_text.lines().map(str::to_string));
            replacement.extend(record.incoming_text.lines().map(str::to_string));
        }
        Strategy::Manual => return,
    }
    lines.splice(record.start_line - 1..record.end_line, replacement);
}

/// Append preserved TODO lines that the kept side does not already carry.
fn annotate(replacement: &mut Vec<String>, kept: &str, todo: &[String]) {
    for line in todo {
        if !kept.contains(line.as_str()) {
            replacement.push(line.clone());
        }
    }
}

fn join_lines(lines: &[String], trailing_newline: bool) -> String {
    let mut out = lines.join("\n");
    if trailing_newline && !out.is_empty() {
        out.push('\n');
    }
    out
}
