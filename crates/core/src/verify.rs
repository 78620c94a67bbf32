//! Verification gate.
//!
//! After a resolution is staged, the project's test command decides
//! whether the workflow may finalize. The command comes from config when
//! set, otherwise from probing the project type by build-file presence.
//! A failing run is never fatal by itself: it is routed to a closed
//! four-option disposition and the workflow blocks until one is chosen.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::VerifyConfig;
use crate::decision::{DecisionOption, DecisionPort};
use crate::errors::{DecisionError, VerifyError};

/// Build files probed in order; first hit wins.
const PROBE_TABLE: &[(&str, &str)] = &[
    ("Cargo.toml", "cargo test"),
    ("package.json", "npm test"),
    ("go.mod", "go test ./..."),
    ("pyproject.toml", "pytest"),
    ("Makefile", "make test"),
];

/// Lines of output kept in the failure summary.
const SUMMARY_LINES: usize = 15;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of one test run.
#[derive(Debug, Clone)]
pub struct TestOutcome {
    pub passed: bool,
    pub exit_code: i32,
    /// Tail of the combined output, for compact display.
    pub summary: String,
    /// Full combined stdout + stderr.
    pub output: String,
}

/// The four dispositions offered when the test command fails. The gate
/// never silently continues or silently aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    Abort,
    ShowFailures,
    ContinueAnyway,
    PauseForManualFix,
}

impl FailureDisposition {
    /// All dispositions, in presentation order.
    pub const ALL: [FailureDisposition; 4] = [
        Self::Abort,
        Self::ShowFailures,
        Self::ContinueAnyway,
        Self::PauseForManualFix,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Abort => "abort the merge",
            Self::ShowFailures => "show the test failures",
            Self::ContinueAnyway => "continue anyway",
            Self::PauseForManualFix => "pause for a manual fix",
        }
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Runs the externally supplied test command and gates completion.
#[derive(Debug, Clone)]
pub struct VerificationGate {
    command: String,
    timeout_secs: u64,
}

impl VerificationGate {
    /// Resolve the test command for a project.
    ///
    /// An explicit `[verify] test_command` takes precedence; otherwise the
    /// project type is probed by build-file presence.
    pub fn detect(workdir: &Path, config: &VerifyConfig) -> Result<Self, VerifyError> {
        if let Some(command) = &config.test_command {
            debug!(%command, "using configured test command");
            return Ok(Self {
                command: command.clone(),
                timeout_secs: config.timeout_secs,
            });
        }
        for (build_file, command) in PROBE_TABLE.iter().copied() {
            if workdir.join(build_file).exists() {
                info!(build_file, command, "detected project test command");
                return Ok(Self {
                    command: command.to_string(),
                    timeout_secs: config.timeout_secs,
                });
            }
        }
        Err(VerifyError::NoProjectType(
            workdir.display().to_string(),
        ))
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the test command, capturing exit status and output.
    pub async fn run(&self, workdir: &Path) -> Result<TestOutcome, VerifyError> {
        info!(command = %self.command, "running verification");
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&self.command)
            .current_dir(workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = tokio::time::timeout(
            Duration::from_secs(self.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| VerifyError::TimedOut {
            command: self.command.clone(),
            timeout_secs: self.timeout_secs,
        })?
        .map_err(|e| VerifyError::SpawnFailed {
            command: self.command.clone(),
            detail: e.to_string(),
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        let exit_code = output.status.code().unwrap_or(-1);
        let passed = output.status.success();
        if passed {
            info!("verification passed");
        } else {
            warn!(exit_code, "verification failed");
        }
        Ok(TestOutcome {
            passed,
            exit_code,
            summary: tail_lines(&combined, SUMMARY_LINES),
            output: combined,
        })
    }

    /// Offer the four-option disposition for a failed run and block until
    /// one is chosen.
    pub fn disposition(
        port: &mut dyn DecisionPort,
        outcome: &TestOutcome,
    ) -> Result<FailureDisposition, DecisionError> {
        let options: Vec<DecisionOption> = FailureDisposition::ALL
            .iter()
            .map(|d| DecisionOption::new(d.label()))
            .collect();
        let prompt = format!(
            "tests failed (exit {}); how should the workflow proceed?",
            outcome.exit_code
        );
        let index = port.choose(&prompt, &options)?;
        Ok(FailureDisposition::ALL[index])
    }
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ScriptedDecisions;

    fn outcome(exit_code: i32) -> TestOutcome {
        TestOutcome {
            passed: exit_code == 0,
            exit_code,
            summary: String::new(),
            output: String::new(),
        }
    }

    #[test]
    fn test_configured_command_wins_over_probe() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        let config = VerifyConfig {
            test_command: Some("./run-tests.sh".into()),
            timeout_secs: 10,
        };
        let gate = VerificationGate::detect(dir.path(), &config).unwrap();
        assert_eq!(gate.command(), "./run-tests.sh");
    }

    #[test]
    fn test_probe_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Makefile"), "test:").unwrap();
        std::fs::write(dir.path().join("go.mod"), "module x").unwrap();
        let gate = VerificationGate::detect(dir.path(), &VerifyConfig::default()).unwrap();
        // go.mod precedes Makefile in the probe table.
        assert_eq!(gate.command(), "go test ./...");
    }

    #[test]
    fn test_no_project_type() {
        let dir = tempfile::tempdir().unwrap();
        let result = VerificationGate::detect(dir.path(), &VerifyConfig::default());
        assert!(matches!(result, Err(VerifyError::NoProjectType(_))));
    }

    #[tokio::test]
    async fn test_run_captures_pass() {
        let dir = tempfile::tempdir().unwrap();
        let gate = VerificationGate {
            command: "echo all good".into(),
            timeout_secs: 30,
        };
        let outcome = gate.run(dir.path()).await.unwrap();
        assert!(outcome.passed);
        assert_eq!(outcome.exit_code, 0);
        assert!(outcome.output.contains("all good"));
    }

    #[tokio::test]
    async fn test_run_captures_failure_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let gate = VerificationGate {
            command: "echo boom; exit 3".into(),
            timeout_secs: 30,
        };
        let outcome = gate.run(dir.path()).await.unwrap();
        assert!(!outcome.passed);
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.summary.contains("boom"));
    }

    #[test]
    fn test_disposition_offers_exactly_four_options() {
        let mut port = ScriptedDecisions::new();
        port.push_choice(2);
        let disposition =
            VerificationGate::disposition(&mut port, &outcome(1)).unwrap();
        assert_eq!(disposition, FailureDisposition::ContinueAnyway);
    }

    #[test]
    fn test_tail_lines() {
        let text = (1..=20)
            .map(|i| format!("line {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let tail = tail_lines(&text, 5);
        assert!(tail.starts_with("line 16"));
        assert!(tail.ends_with("line 20"));
    }
}
