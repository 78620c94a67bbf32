//! Git backend: the VCS adapter the advisor sits on top of.
//!
//! Read-side queries (branches, merge-base, commit logs, diffs, unmerged
//! index entries) go through `git2`. Porcelain-level operations that own
//! the merge/rebase lifecycle (begin, continue, abort, stage, commit) shell
//! out to the `git` CLI, which stays the single source of truth for
//! in-progress state.

pub mod backend;

pub use backend::{
    AttemptOutcome, GitBackend, MergeMode, UnmergedEntry, UnmergedKind,
};
