//! MergeAdvisor core library.
//!
//! This crate provides the decision layer of the advisor: branch
//! divergence analysis, conflict extraction and classification, pattern
//! clustering, strategy recommendation, plan assembly, plan-driven
//! resolution, and the test-gated verification step. The version-control
//! machinery itself is consumed through the [`git`] backend, never
//! reimplemented.

pub mod config;
pub mod conflict;
pub mod decision;
pub mod divergence;
pub mod errors;
pub mod executor;
pub mod git;
pub mod models;
pub mod plan;
pub mod session;
pub mod verify;

// Re-exports for convenience.
pub use config::AdvisorConfig;
pub use errors::CoreError;
pub use session::AdvisorSession;
