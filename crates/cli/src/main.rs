//! MergeAdvisor command-line tool.
//!
//! Wraps a git working tree and produces a structured, user-approved
//! resolution plan before touching any file: divergence analysis,
//! conflict extraction and clustering, per-pattern strategy proposals,
//! plan review, plan-driven resolution, and a test-gated finish.

mod commands;
mod interact;
mod present;
mod style;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mergeadvisor_core::config::AdvisorConfig;
use mergeadvisor_core::git::{GitBackend, MergeMode};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// MergeAdvisor command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "mergeadvisor",
    version,
    about = "Plan and apply merge conflict resolutions behind a reviewable plan"
)]
struct Cli {
    /// Path to an explicit TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository path (any path inside the working tree).
    #[arg(short = 'C', long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze divergence against a branch without touching the tree.
    Analyze {
        /// Branch to compare against.
        branch: String,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Merge a branch behind a reviewed resolution plan.
    Merge {
        /// Branch to merge into the current one.
        branch: String,

        /// Stop after staging; do not create the merge commit.
        #[arg(long)]
        no_commit: bool,
    },

    /// Rebase the current branch onto another behind a reviewed plan.
    Rebase {
        /// Branch to rebase onto.
        branch: String,

        /// Stop after staging each step; do not continue automatically.
        #[arg(long)]
        no_commit: bool,
    },

    /// Show working-tree and in-progress operation state.
    Status,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .without_time()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let backend = GitBackend::open(&cli.repo).context("failed to open repository")?;
    let config = AdvisorConfig::load(backend.workdir(), cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Analyze { branch, json } => commands::analyze::run(backend, config, &branch, json),
        Commands::Merge { branch, no_commit } => {
            commands::run::run(backend, config, MergeMode::Merge, &branch, no_commit).await
        }
        Commands::Rebase { branch, no_commit } => {
            commands::run::run(backend, config, MergeMode::Rebase, &branch, no_commit).await
        }
        Commands::Status => commands::status::run(backend),
    }
}
