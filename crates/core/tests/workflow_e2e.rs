//! End-to-end tests for the advisor workflow over real git repositories.
//!
//! These tests exercise the real `AdvisorSession` with:
//! - Local git repos built in `tempfile::TempDir`s via the `git` CLI
//! - Real merge attempts, marker extraction, and plan execution
//! - A scripted decision port standing in for the human
//!
//! No network I/O. Tests skip gracefully if `git` is not installed.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use mergeadvisor_core::config::AdvisorConfig;
use mergeadvisor_core::conflict::{ConflictKind, Strategy};
use mergeadvisor_core::decision::ScriptedDecisions;
use mergeadvisor_core::errors::{CoreError, DivergenceError, ExecutionError, GitError};
use mergeadvisor_core::executor::{ExecState, GateClearance};
use mergeadvisor_core::git::{AttemptOutcome, GitBackend, MergeMode};
use mergeadvisor_core::session::{review_plan, AdvisorSession, PlanDecision};
use mergeadvisor_core::verify::{FailureDisposition, VerificationGate};

// ===========================================================================
// Helpers
// ===========================================================================

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .env("GIT_EDITOR", "true")
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn init_repo(dir: &Path) {
    git(dir, &["init"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(dir, &["config", "user.email", "advisor@example.com"]);
    git(dir, &["config", "user.name", "Advisor Tests"]);
}

fn commit_file(dir: &Path, file: &str, content: &str, message: &str) {
    let path = dir.join(file);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    git(dir, &["add", "--", file]);
    git(dir, &["commit", "-m", message]);
}

const BASE_NET: &str = "\
fn send(addr: &str, timeout: u32) -> bool {
    connect(addr, timeout)
}

fn recv(buf: &mut [u8]) -> usize {
    read_into(buf)
}

fn shutdown() {
    close_all()
}

// helper
fn log() {}
";

const MAIN_NET: &str = "\
fn send(addr: &str, timeout: u32, retries: u8) -> bool {
    connect_with_retries(addr, timeout, retries)
}

fn recv(buf: &mut [u8]) -> usize {
    read_into(buf)
}

fn shutdown() {
    close_all()
}

// helper for logging
fn log() {}
";

const FEATURE_NET: &str = "\
fn send(addr: &str) -> bool {
    // TODO: restore timeout handling
    connect(addr)
}

fn recv(buf: &mut [u8]) -> usize {
    read_into(buf)
}

fn shutdown() {
    close_all()
}

// logging helper
fn log() {}
";

/// Two branches with one contested file carrying two marker blocks:
/// a signature change (incoming side has a TODO) and a pure-comment
/// difference.
fn contested_repo() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    init_repo(dir);
    commit_file(dir, "src/net.rs", BASE_NET, "add network helpers");
    git(dir, &["checkout", "-b", "feature"]);
    commit_file(dir, "src/net.rs", FEATURE_NET, "drop timeout parameter");
    git(dir, &["checkout", "main"]);
    commit_file(dir, "src/net.rs", MAIN_NET, "add retry support to send");
    tmp
}

fn session(dir: &Path, mode: MergeMode, target: &str) -> AdvisorSession {
    let mut config = AdvisorConfig::default();
    config.verify.test_command = Some("true".into());
    let backend = GitBackend::open(dir).unwrap();
    AdvisorSession::start(backend, config, mode, target).unwrap()
}

// ===========================================================================
// Divergence
// ===========================================================================

#[test]
fn test_divergence_report() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = contested_repo();
    let session = session(tmp.path(), MergeMode::Merge, "feature");
    let report = session.analyze().unwrap();

    assert_eq!(report.current.name, "main");
    assert_eq!(report.target.name, "feature");
    assert_eq!(report.current_commits.len(), 1);
    assert_eq!(report.target_commits.len(), 1);
    assert_eq!(report.current_commits[0].title, "add retry support to send");
    assert_eq!(report.contested_files, vec!["src/net.rs"]);
    assert_eq!(report.predicted_conflicts, vec!["src/net.rs"]);
    assert!(report.target_intent().contains("drop timeout parameter"));

    let change = &report.current_changes[0];
    assert_eq!(change.path, "src/net.rs");
    assert!(change.lines_added > 0);
}

#[test]
fn test_unrelated_histories_report_no_merge_base() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    init_repo(dir);
    commit_file(dir, "a.txt", "a\n", "first");
    git(dir, &["checkout", "--orphan", "other"]);
    commit_file(dir, "b.txt", "b\n", "unrelated root");
    git(dir, &["checkout", "main"]);

    let session = session(dir, MergeMode::Merge, "other");
    let result = session.analyze();
    assert!(matches!(
        result,
        Err(DivergenceError::NoMergeBase { .. })
    ));
}

// ===========================================================================
// The two-pattern scenario, end to end
// ===========================================================================

#[tokio::test]
async fn test_two_pattern_merge_workflow() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = contested_repo();
    let session = session(tmp.path(), MergeMode::Merge, "feature");
    let report = session.analyze().unwrap();

    assert_eq!(session.attempt().await.unwrap(), AttemptOutcome::Conflicted);

    let extraction = session.extract().unwrap();
    assert_eq!(extraction.records.len(), 2);
    assert!(extraction.malformed.is_empty());

    let planned = session.plan(&report, extraction).unwrap();
    assert_eq!(planned.patterns.len(), 2);
    assert_eq!(planned.plan.stats.total_conflicts, 2);
    assert_eq!(planned.plan.stats.files_affected, 1);
    assert_eq!(planned.plan.stats.patterns_found, 2);

    // Pattern 1: signature change, incoming side incomplete -> keep base,
    // preserving the TODO text.
    let p1 = &planned.patterns[0];
    assert_eq!(p1.kind, ConflictKind::SignatureChange);
    let prop1 = planned.plan.proposal_for(&p1.id).unwrap();
    assert_eq!(prop1.strategy, Strategy::KeepBase);
    assert!(prop1
        .preserved_todo
        .iter()
        .any(|l| l.contains("restore timeout handling")));

    // Pattern 2: pure comment difference -> merge both.
    let p2 = &planned.patterns[1];
    assert_eq!(p2.kind, ConflictKind::Documentation);
    let prop2 = planned.plan.proposal_for(&p2.id).unwrap();
    assert_eq!(prop2.strategy, Strategy::MergeBoth);

    // Approve through the closed-option review loop.
    let mut port = ScriptedDecisions::new();
    port.push_choice(0);
    let plan = match review_plan(&mut port, planned.plan.clone(), &planned.patterns).unwrap() {
        PlanDecision::Approved(plan) => plan,
        PlanDecision::Rejected => panic!("expected approval"),
    };

    // Execute: apply, verify, commit.
    let mut executor = session.executor();
    executor.apply(&plan, &planned.patterns, &planned.records).await.unwrap();
    assert_eq!(executor.state(), ExecState::Staged);
    assert_eq!(executor.staged_files(), ["src/net.rs"]);

    let resolved = std::fs::read_to_string(tmp.path().join("src/net.rs")).unwrap();
    assert!(!resolved.contains("<<<<<<<"));
    assert!(!resolved.contains(">>>>>>>"));
    // Base side kept, with the incoming TODO preserved as an annotation.
    assert!(resolved.contains("retries: u8"));
    assert!(resolved.contains("// TODO: restore timeout handling"));
    assert!(!resolved.contains("connect(addr)"));
    // Both comments kept.
    assert!(resolved.contains("// helper for logging"));
    assert!(resolved.contains("// logging helper"));

    let gate = session.verification_gate().unwrap();
    let outcome = gate.run(session.backend().workdir()).await.unwrap();
    assert!(outcome.passed);

    executor.commit(GateClearance::Passed).await.unwrap();
    assert_eq!(executor.state(), ExecState::Committed);
    assert!(session.backend().operation_in_progress().is_none());

    let log = git(tmp.path(), &["log", "--oneline", "-1"]);
    assert!(log.contains("Merge"));

    let result = executor.into_result(Some(outcome));
    assert_eq!(result.state, ExecState::Committed);
    assert_eq!(result.gate, Some(GateClearance::Passed));
}

// ===========================================================================
// Verification gate dispositions
// ===========================================================================

#[tokio::test]
async fn test_failing_tests_keep_state_staged() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = contested_repo();
    let mut config = AdvisorConfig::default();
    config.verify.test_command = Some("echo failing; exit 1".into());
    let backend = GitBackend::open(tmp.path()).unwrap();
    let session = AdvisorSession::start(backend, config, MergeMode::Merge, "feature").unwrap();

    let report = session.analyze().unwrap();
    session.attempt().await.unwrap();
    let planned = session.plan(&report, session.extract().unwrap()).unwrap();

    let mut executor = session.executor();
    executor
        .apply(&planned.plan, &planned.patterns, &planned.records)
        .await
        .unwrap();
    assert_eq!(executor.state(), ExecState::Staged);

    let gate = session.verification_gate().unwrap();
    let outcome = gate.run(session.backend().workdir()).await.unwrap();
    assert!(!outcome.passed);
    assert_eq!(outcome.exit_code, 1);

    // State must remain staged until a disposition is chosen.
    assert_eq!(executor.state(), ExecState::Staged);
    let mut port = ScriptedDecisions::new();
    port.push_choice(3); // pause for a manual fix
    let disposition = VerificationGate::disposition(&mut port, &outcome).unwrap();
    assert_eq!(disposition, FailureDisposition::PauseForManualFix);

    executor.pause().unwrap();
    assert_eq!(executor.state(), ExecState::PausedForReview);
}

// ===========================================================================
// Abort
// ===========================================================================

#[tokio::test]
async fn test_abort_restores_pre_attempt_tree() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = contested_repo();
    let session = session(tmp.path(), MergeMode::Merge, "feature");
    let report = session.analyze().unwrap();
    session.attempt().await.unwrap();
    let planned = session.plan(&report, session.extract().unwrap()).unwrap();

    let mut executor = session.executor();
    executor
        .apply(&planned.plan, &planned.patterns, &planned.records)
        .await
        .unwrap();

    executor.abort().await.unwrap();
    assert_eq!(executor.state(), ExecState::Aborted);
    assert!(session.backend().operation_in_progress().is_none());

    // The working tree is back to the pre-attempt state.
    let restored = std::fs::read_to_string(tmp.path().join("src/net.rs")).unwrap();
    assert_eq!(restored, MAIN_NET);

    // The backend abort runs exactly once; a second abort is an invalid
    // transition, not a second `git merge --abort`.
    let result = executor.abort().await;
    assert!(matches!(
        result,
        Err(ExecutionError::InvalidTransition { .. })
    ));
}

// ===========================================================================
// Exclusive ownership
// ===========================================================================

#[test]
fn test_startup_rejects_in_progress_merge() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = contested_repo();
    // Start a conflicted merge outside the advisor.
    let status = Command::new("git")
        .current_dir(tmp.path())
        .args(["merge", "feature"])
        .output()
        .unwrap();
    assert!(!status.status.success());

    let backend = GitBackend::open(tmp.path()).unwrap();
    let result = AdvisorSession::start(
        backend,
        AdvisorConfig::default(),
        MergeMode::Merge,
        "feature",
    );
    assert!(matches!(
        result,
        Err(CoreError::Git(GitError::OperationInProgress(_)))
    ));

    git(tmp.path(), &["merge", "--abort"]);
}

// ===========================================================================
// Rebase mode
// ===========================================================================

#[tokio::test]
async fn test_rebase_conflicts_are_extracted() {
    if !git_available() {
        eprintln!("git not installed, skipping");
        return;
    }
    let tmp = contested_repo();
    git(tmp.path(), &["checkout", "feature"]);

    let session = session(tmp.path(), MergeMode::Rebase, "main");
    assert_eq!(session.attempt().await.unwrap(), AttemptOutcome::Conflicted);

    let extraction = session.extract().unwrap();
    assert_eq!(extraction.records.len(), 2);

    session.abort().await.unwrap();
    assert!(session.backend().operation_in_progress().is_none());
}
