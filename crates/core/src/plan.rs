//! Resolution plan assembly.
//!
//! The plan is the single reviewable artifact the user approves before
//! anything touches the working tree. Plans are immutable once built:
//! adjusting a proposal returns a new plan and leaves the original
//! untouched, which lets the frontend run a "show alternatives, pick,
//! regenerate" loop without re-running extraction or clustering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::conflict::{ConflictPattern, Strategy, StrategyProposal};
use crate::errors::PlanError;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Aggregate statistics over one plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanStats {
    /// Total conflict records covered by the plan.
    pub total_conflicts: usize,
    /// Distinct files the conflicts touch.
    pub files_affected: usize,
    /// Number of patterns found.
    pub patterns_found: usize,
}

/// The reviewable resolution plan. Immutable once presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionPlan {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Overall strategy label: a single strategy name when uniform,
    /// otherwise `mixed`.
    pub overall: String,
    /// One proposal per pattern, in pattern presentation order.
    pub proposals: Vec<StrategyProposal>,
    pub stats: PlanStats,
}

impl ResolutionPlan {
    /// Look up the proposal for a pattern id.
    pub fn proposal_for(&self, pattern_id: &str) -> Option<&StrategyProposal> {
        self.proposals.iter().find(|p| p.pattern_id == pattern_id)
    }

    /// Whether any proposal requires manual resolution.
    pub fn has_manual(&self) -> bool {
        self.proposals
            .iter()
            .any(|p| p.strategy == Strategy::Manual)
    }

    /// Return a new plan with one proposal's strategy replaced.
    ///
    /// The previous recommendation moves into the alternatives; every
    /// other proposal is carried over untouched. `self` is not modified.
    pub fn adjust(&self, pattern_id: &str, strategy: Strategy) -> Result<Self, PlanError> {
        let index = self
            .proposals
            .iter()
            .position(|p| p.pattern_id == pattern_id)
            .ok_or_else(|| PlanError::UnknownPattern(pattern_id.to_string()))?;

        let mut proposals = self.proposals.clone();
        let previous = &self.proposals[index];
        let mut alternatives = previous.alternatives.clone();
        alternatives.retain(|a| a.strategy != strategy);
        if !alternatives.iter().any(|a| a.strategy == previous.strategy) {
            alternatives.push(crate::conflict::Alternative {
                strategy: previous.strategy,
                impact: "previously recommended".into(),
            });
        }
        proposals[index] = StrategyProposal {
            pattern_id: previous.pattern_id.clone(),
            strategy,
            rationale: format!("user override (was {})", previous.strategy),
            alternatives,
            preserved_todo: previous.preserved_todo.clone(),
        };

        debug!(pattern_id, %strategy, "plan adjusted");
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            overall: overall_label(&proposals),
            proposals,
            stats: self.stats,
        })
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles analyzer + clusterer + recommender output into one plan.
pub struct PlanBuilder;

impl PlanBuilder {
    /// Build a plan from patterns and their proposals.
    ///
    /// Proposals must cover the patterns one-to-one; an empty input is an
    /// error rather than an empty plan.
    pub fn build(
        patterns: &[ConflictPattern],
        proposals: Vec<StrategyProposal>,
    ) -> Result<ResolutionPlan, PlanError> {
        if patterns.is_empty() || proposals.is_empty() {
            return Err(PlanError::EmptyPlan);
        }

        let total_conflicts = patterns.iter().map(|p| p.occurrence_count).sum();
        let mut files: Vec<&str> = Vec::new();
        for pattern in patterns {
            for file in &pattern.files {
                if !files.contains(&file.as_str()) {
                    files.push(file);
                }
            }
        }

        let stats = PlanStats {
            total_conflicts,
            files_affected: files.len(),
            patterns_found: patterns.len(),
        };
        info!(
            total = stats.total_conflicts,
            files = stats.files_affected,
            patterns = stats.patterns_found,
            "resolution plan built"
        );

        Ok(ResolutionPlan {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            overall: overall_label(&proposals),
            proposals,
            stats,
        })
    }
}

fn overall_label(proposals: &[StrategyProposal]) -> String {
    let first = match proposals.first() {
        Some(p) => p.strategy,
        None => return "empty".into(),
    };
    if proposals.iter().all(|p| p.strategy == first) {
        first.to_string()
    } else {
        "mixed".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{Alternative, ConflictKind};

    fn pattern(id: &str, count: usize, files: &[&str]) -> ConflictPattern {
        ConflictPattern {
            id: id.into(),
            kind: ConflictKind::LogicDifference,
            description: format!("pattern {id}"),
            member_ids: (0..count).map(|i| format!("{id}-r{i}")).collect(),
            files: files.iter().map(|f| f.to_string()).collect(),
            has_todo_base: false,
            has_todo_incoming: false,
            occurrence_count: count,
        }
    }

    fn proposal(pattern_id: &str, strategy: Strategy) -> StrategyProposal {
        StrategyProposal {
            pattern_id: pattern_id.into(),
            strategy,
            rationale: "test".into(),
            alternatives: vec![Alternative {
                strategy: Strategy::Manual,
                impact: "by hand".into(),
            }],
            preserved_todo: Vec::new(),
        }
    }

    #[test]
    fn test_stats_are_consistent() {
        let patterns = vec![
            pattern("P1", 3, &["a.rs", "b.rs"]),
            pattern("P2", 1, &["a.rs"]),
        ];
        let proposals = vec![
            proposal("P1", Strategy::KeepBase),
            proposal("P2", Strategy::MergeBoth),
        ];
        let plan = PlanBuilder::build(&patterns, proposals).unwrap();
        assert_eq!(plan.stats.total_conflicts, 4);
        assert_eq!(plan.stats.files_affected, 2);
        assert_eq!(plan.stats.patterns_found, 2);
        assert_eq!(plan.overall, "mixed");
    }

    #[test]
    fn test_uniform_overall_label() {
        let patterns = vec![pattern("P1", 1, &["a.rs"])];
        let proposals = vec![proposal("P1", Strategy::KeepIncoming)];
        let plan = PlanBuilder::build(&patterns, proposals).unwrap();
        assert_eq!(plan.overall, "keep-incoming");
    }

    #[test]
    fn test_empty_plan_rejected() {
        let result = PlanBuilder::build(&[], Vec::new());
        assert!(matches!(result, Err(PlanError::EmptyPlan)));
    }

    #[test]
    fn test_adjust_replaces_only_target_proposal() {
        let patterns = vec![
            pattern("P1", 2, &["a.rs"]),
            pattern("P2", 1, &["b.rs"]),
        ];
        let proposals = vec![
            proposal("P1", Strategy::KeepBase),
            proposal("P2", Strategy::MergeBoth),
        ];
        let plan = PlanBuilder::build(&patterns, proposals).unwrap();
        let adjusted = plan.adjust("P1", Strategy::KeepIncoming).unwrap();

        // The adjusted proposal changed and records the override.
        let p1 = adjusted.proposal_for("P1").unwrap();
        assert_eq!(p1.strategy, Strategy::KeepIncoming);
        assert!(p1.rationale.contains("keep-base"));
        assert!(p1
            .alternatives
            .iter()
            .any(|a| a.strategy == Strategy::KeepBase));

        // The other proposal is untouched, alternatives included.
        let p2 = adjusted.proposal_for("P2").unwrap();
        assert_eq!(p2.strategy, Strategy::MergeBoth);
        assert_eq!(p2.alternatives, plan.proposal_for("P2").unwrap().alternatives);

        // The original plan is unchanged.
        assert_eq!(plan.proposal_for("P1").unwrap().strategy, Strategy::KeepBase);
        assert_eq!(adjusted.stats, plan.stats);
    }

    #[test]
    fn test_adjust_unknown_pattern_is_an_error() {
        let patterns = vec![pattern("P1", 1, &["a.rs"])];
        let proposals = vec![proposal("P1", Strategy::KeepBase)];
        let plan = PlanBuilder::build(&patterns, proposals).unwrap();
        assert!(matches!(
            plan.adjust("P9", Strategy::Manual),
            Err(PlanError::UnknownPattern(_))
        ));
    }

    #[test]
    fn test_has_manual() {
        let patterns = vec![pattern("P1", 1, &["a.rs"])];
        let plan =
            PlanBuilder::build(&patterns, vec![proposal("P1", Strategy::Manual)]).unwrap();
        assert!(plan.has_manual());
    }
}
