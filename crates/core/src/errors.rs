//! Error types for the MergeAdvisor core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Nothing in this crate retries a failed operation silently: every failure
//! either blocks on a human decision or triggers an explicit, logged state
//! transition to `aborted`.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Divergence(#[from] DivergenceError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Decision(#[from] DecisionError),
}

// ---------------------------------------------------------------------------
// Git backend errors
// ---------------------------------------------------------------------------

/// Errors from the Git backend (git2 queries and `git` CLI operations).
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git {operation} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        operation: String,
        exit_code: i32,
        stderr: String,
    },

    /// The path is not inside a git repository.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A ref (branch, tag, SHA) could not be resolved.
    #[error("git ref not found: {0}")]
    RefNotFound(String),

    /// A merge or rebase is already in progress in this working tree.
    ///
    /// A second workflow against the same tree is rejected at startup
    /// rather than left as undefined behaviour.
    #[error("a {0} is already in progress in this working tree; finish or abort it first")]
    OperationInProgress(String),

    /// The repository has a bare or missing working tree.
    #[error("repository at '{0}' has no working tree")]
    NoWorkingTree(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Divergence errors
// ---------------------------------------------------------------------------

/// Errors from branch divergence analysis.
#[derive(Debug, Error)]
pub enum DivergenceError {
    /// The two branches share no common ancestor (unrelated histories).
    /// Fatal: the analyzer reports rather than guessing a base.
    #[error("no merge-base between '{current}' and '{target}': unrelated histories")]
    NoMergeBase {
        current: String,
        target: String,
    },

    /// Underlying backend failure.
    #[error("divergence analysis failed: {0}")]
    Git(#[from] GitError),
}

// ---------------------------------------------------------------------------
// Conflict extraction errors
// ---------------------------------------------------------------------------

/// Errors from conflict extraction and classification.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// A conflict start marker has no matching end marker. Fatal for the
    /// file it occurs in; the workflow offers manual resolution for that
    /// file only.
    #[error("malformed conflict markers in '{path}' near line {line}")]
    MalformedConflict {
        path: String,
        line: usize,
    },

    /// A record id was not found in the current extraction.
    #[error("conflict record not found: {0}")]
    RecordNotFound(String),

    /// Underlying backend failure while reading conflict sides.
    #[error("conflict backend error: {0}")]
    Git(#[from] GitError),

    /// Generic I/O wrapper (reading conflicted files).
    #[error("conflict I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Plan errors
// ---------------------------------------------------------------------------

/// Errors from resolution plan assembly and adjustment.
#[derive(Debug, Error)]
pub enum PlanError {
    /// An adjust request referenced a pattern id not present in the plan.
    #[error("unknown pattern id: {0}")]
    UnknownPattern(String),

    /// A plan cannot be built from zero patterns.
    #[error("cannot build a resolution plan with no conflict patterns")]
    EmptyPlan,
}

// ---------------------------------------------------------------------------
// Execution errors
// ---------------------------------------------------------------------------

/// Errors from the resolution executor state machine.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A rewrite pass left conflict markers behind. The execution aborts
    /// and the backend's native abort restores the pre-attempt tree.
    #[error("unresolved conflict markers remain after rewrite in: {}", files.join(", "))]
    ResidualConflict {
        files: Vec<String>,
    },

    /// A state-machine transition was invalid.
    #[error("invalid execution state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    /// Underlying backend failure during apply/stage/commit.
    #[error("execution git error: {0}")]
    Git(#[from] GitError),

    /// Underlying conflict-model failure.
    #[error("execution conflict error: {0}")]
    Conflict(#[from] ConflictError),

    /// Generic I/O wrapper (rewriting working-tree files).
    #[error("execution I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Verification errors
// ---------------------------------------------------------------------------

/// Errors from the verification gate.
///
/// A failing test run is *not* an error; it is a [`crate::verify::TestOutcome`]
/// routed to the four-option disposition. These errors cover the gate itself
/// being unable to run.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// No build file matched the project-type probe and no override is set.
    #[error("no test command detected for project at '{0}'; set [verify] test_command")]
    NoProjectType(String),

    /// The test command could not be spawned.
    #[error("failed to spawn test command '{command}': {detail}")]
    SpawnFailed {
        command: String,
        detail: String,
    },

    /// The test command exceeded the configured timeout.
    #[error("test command '{command}' timed out after {timeout_secs}s")]
    TimedOut {
        command: String,
        timeout_secs: u64,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Decision errors
// ---------------------------------------------------------------------------

/// Errors from the human decision boundary.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// The user cancelled the interaction (Ctrl-C / escape). The workflow
    /// maps this to an explicit abort.
    #[error("interaction aborted by user")]
    Aborted,

    /// The decision input stream is closed or unusable.
    #[error("decision input unavailable: {0}")]
    InputClosed(String),
}
