//! Strategy recommendation.
//!
//! One [`StrategyProposal`] per pattern, produced by an ordered decision
//! policy. The policy never resolves unilaterally: every proposal carries
//! at least one alternative, and anything without a dominant side is
//! routed to manual resolution.
//!
//! Completeness is a weighted score over observable maturity signals
//! (absence of TODO/FIXME markers, how consistently a side is present
//! across the pattern's records). The weights live in
//! [`StrategyConfig`](crate::config::StrategyConfig) because their exact
//! balance is judgment, not fact.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::cluster::ConflictPattern;
use super::extractor::{todo_lines, ConflictKind, ConflictRecord};
use crate::config::StrategyConfig;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Named resolution strategies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Keep the current branch's side.
    KeepBase,
    /// Keep the incoming branch's side.
    KeepIncoming,
    /// Keep both sides (base first, then incoming).
    MergeBoth,
    /// Leave the block for a human to resolve.
    Manual,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepBase => write!(f, "keep-base"),
            Self::KeepIncoming => write!(f, "keep-incoming"),
            Self::MergeBoth => write!(f, "merge-both"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// An alternative to the recommended strategy, with an impact estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Alternative {
    pub strategy: Strategy,
    /// What choosing this alternative would affect.
    pub impact: String,
}

/// The recommendation for one pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyProposal {
    pub pattern_id: String,
    pub strategy: Strategy,
    pub rationale: String,
    /// Never empty: silent unilateral resolution is rejected by design.
    pub alternatives: Vec<Alternative>,
    /// TODO/FIXME lines preserved from the losing side, to be kept as an
    /// annotation when the winning side is written.
    pub preserved_todo: Vec<String>,
}

/// Free-text summaries of what each branch has been doing, derived from
/// commit titles.
#[derive(Debug, Clone, Default)]
pub struct BranchIntents {
    pub current: String,
    pub target: String,
}

// ---------------------------------------------------------------------------
// Recommender
// ---------------------------------------------------------------------------

/// Scores patterns and proposes a resolution strategy with rationale.
pub struct StrategyRecommender {
    weights: StrategyConfig,
}

impl StrategyRecommender {
    pub fn new(weights: StrategyConfig) -> Self {
        Self { weights }
    }

    /// Produce a proposal for one pattern.
    ///
    /// Ordered policy, first match wins:
    /// 1. one side complete, the other carrying incomplete work: keep the
    ///    complete side, preserving the incomplete side's TODO text;
    /// 2. both sides purely additive (documentation, imports): merge both;
    /// 3. no dominant side: manual, with both sides as alternatives.
    pub fn recommend(
        &self,
        pattern: &ConflictPattern,
        members: &[&ConflictRecord],
        intents: &BranchIntents,
    ) -> StrategyProposal {
        let base_score = self.completeness(pattern.has_todo_base, side_coverage(members, Side::Base));
        let incoming_score = self.completeness(
            pattern.has_todo_incoming,
            side_coverage(members, Side::Incoming),
        );
        let margin = base_score - incoming_score;
        debug!(
            pattern = %pattern.id,
            base_score,
            incoming_score,
            "scored pattern completeness"
        );

        let proposal = if margin >= self.weights.dominance_threshold {
            self.keep_side(pattern, members, Strategy::KeepBase, intents)
        } else if -margin >= self.weights.dominance_threshold {
            self.keep_side(pattern, members, Strategy::KeepIncoming, intents)
        } else if matches!(
            pattern.kind,
            ConflictKind::Documentation | ConflictKind::ImportChange
        ) {
            StrategyProposal {
                pattern_id: pattern.id.clone(),
                strategy: Strategy::MergeBoth,
                rationale: format!(
                    "both sides are additive {} changes; keeping both loses nothing",
                    pattern.kind
                ),
                alternatives: vec![
                    Alternative {
                        strategy: Strategy::KeepBase,
                        impact: impact_note(pattern, "only the current branch's text"),
                    },
                    Alternative {
                        strategy: Strategy::KeepIncoming,
                        impact: impact_note(pattern, "only the incoming branch's text"),
                    },
                ],
                preserved_todo: Vec::new(),
            }
        } else {
            StrategyProposal {
                pattern_id: pattern.id.clone(),
                strategy: Strategy::Manual,
                rationale: format!(
                    "neither side dominates by completeness; {} vs {}",
                    intents.current, intents.target
                ),
                alternatives: vec![
                    Alternative {
                        strategy: Strategy::KeepBase,
                        impact: impact_note(pattern, "the current branch's side"),
                    },
                    Alternative {
                        strategy: Strategy::KeepIncoming,
                        impact: impact_note(pattern, "the incoming branch's side"),
                    },
                ],
                preserved_todo: Vec::new(),
            }
        };

        info!(
            pattern = %proposal.pattern_id,
            strategy = %proposal.strategy,
            "strategy recommended"
        );
        proposal
    }

    fn keep_side(
        &self,
        pattern: &ConflictPattern,
        members: &[&ConflictRecord],
        strategy: Strategy,
        intents: &BranchIntents,
    ) -> StrategyProposal {
        let (winner_intent, loser, loser_label) = match strategy {
            Strategy::KeepBase => (&intents.current, Side::Incoming, "incoming"),
            _ => (&intents.target, Side::Base, "current"),
        };
        let preserved_todo: Vec<String> = members
            .iter()
            .flat_map(|m| {
                todo_lines(match loser {
                    Side::Base => &m.base_text,
                    Side::Incoming => &m.incoming_text,
                })
            })
            .collect();
        let mut rationale = format!(
            "the {} side shows completed work ({}); the {} side still carries unfinished changes",
            match strategy {
                Strategy::KeepBase => "current",
                _ => "incoming",
            },
            winner_intent,
            loser_label
        );
        if !preserved_todo.is_empty() {
            rationale.push_str("; its TODO text is preserved as an annotation");
        }
        let alternative = match strategy {
            Strategy::KeepBase => Alternative {
                strategy: Strategy::KeepIncoming,
                impact: impact_note(pattern, "the incoming branch's side"),
            },
            _ => Alternative {
                strategy: Strategy::KeepBase,
                impact: impact_note(pattern, "the current branch's side"),
            },
        };
        StrategyProposal {
            pattern_id: pattern.id.clone(),
            strategy,
            rationale,
            alternatives: vec![
                alternative,
                Alternative {
                    strategy: Strategy::Manual,
                    impact: format!(
                        "resolve {} conflict(s) by hand",
                        pattern.occurrence_count
                    ),
                },
            ],
            preserved_todo,
        }
    }

    fn completeness(&self, has_todo: bool, coverage: f64) -> f64 {
        let todo_signal = if has_todo { 0.0 } else { 1.0 };
        self.weights.todo_weight * todo_signal + self.weights.consistency_weight * coverage
    }
}

#[derive(Clone, Copy)]
enum Side {
    Base,
    Incoming,
}

/// Fraction of records where the given side is non-empty. A side that
/// deleted content everywhere scores low on consistency.
fn side_coverage(members: &[&ConflictRecord], side: Side) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let present = members
        .iter()
        .filter(|m| {
            let text = match side {
                Side::Base => &m.base_text,
                Side::Incoming => &m.incoming_text,
            };
            !text.trim().is_empty()
        })
        .count();
    present as f64 / members.len() as f64
}

fn impact_note(pattern: &ConflictPattern, choice: &str) -> String {
    format!(
        "{} conflict(s) in {} would use {}",
        pattern.occurrence_count,
        pattern.files.join(", "),
        choice
    )
}
