//! One workflow run.
//!
//! [`AdvisorSession`] is the run-context object: current branch, target
//! branch, and mode are explicit fields rather than ambient state, so one
//! VCS session's lifecycle stays testable in isolation. A session owns
//! its working tree exclusively; startup rejects a tree with a merge or
//! rebase already in progress.
//!
//! The session exposes one method per workflow stage (analyze, attempt,
//! extract, plan, review, execute, verify). Stages run strictly
//! sequentially; the frontend drives them and renders in between.

use tracing::{info, instrument};

use crate::config::AdvisorConfig;
use crate::conflict::{
    BranchIntents, ConflictExtractor, ConflictPattern, ConflictRecord, ExtractionOutcome,
    MalformedFile, PatternClusterer, StrategyRecommender,
};
use crate::decision::{DecisionOption, DecisionPort};
use crate::divergence::{DivergenceAnalyzer, DivergenceReport};
use crate::errors::{ConflictError, CoreError, DivergenceError, GitError, PlanError};
use crate::executor::ResolutionExecutor;
use crate::git::{AttemptOutcome, GitBackend, MergeMode};
use crate::models::BranchRef;
use crate::plan::{PlanBuilder, ResolutionPlan};
use crate::verify::VerificationGate;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything needed to execute one approved plan.
#[derive(Debug, Clone)]
pub struct PlannedResolution {
    pub records: Vec<ConflictRecord>,
    pub malformed: Vec<MalformedFile>,
    pub patterns: Vec<ConflictPattern>,
    pub plan: ResolutionPlan,
}

/// Outcome of the plan review loop.
#[derive(Debug, Clone)]
pub enum PlanDecision {
    /// The (possibly adjusted) plan the user approved.
    Approved(ResolutionPlan),
    /// The user declined; the workflow aborts.
    Rejected,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One advisor workflow run over one working tree.
pub struct AdvisorSession {
    backend: GitBackend,
    config: AdvisorConfig,
    mode: MergeMode,
    current: BranchRef,
    target: BranchRef,
}

impl AdvisorSession {
    /// Start a session merging/rebasing `target_branch` into the
    /// checked-out branch.
    ///
    /// Branch state is snapshotted here and never re-read. Fails with
    /// [`GitError::OperationInProgress`] when the tree already has a
    /// merge or rebase underway.
    pub fn start(
        backend: GitBackend,
        config: AdvisorConfig,
        mode: MergeMode,
        target_branch: &str,
    ) -> Result<Self, CoreError> {
        if let Some(op) = backend.operation_in_progress() {
            return Err(GitError::OperationInProgress(op.to_string()).into());
        }
        let current = backend.head_branch().map_err(CoreError::Git)?;
        let target = backend.branch_ref(target_branch).map_err(CoreError::Git)?;
        info!(
            current = %current.name,
            target = %target.name,
            %mode,
            "advisor session started"
        );
        Ok(Self {
            backend,
            config,
            mode,
            current,
            target,
        })
    }

    pub fn backend(&self) -> &GitBackend {
        &self.backend
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    pub fn current(&self) -> &BranchRef {
        &self.current
    }

    pub fn target(&self) -> &BranchRef {
        &self.target
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    /// Stage 1: divergence analysis (read-only).
    pub fn analyze(&self) -> Result<DivergenceReport, DivergenceError> {
        DivergenceAnalyzer::analyze(&self.backend, &self.current, &self.target)
    }

    /// Stage 2: let the backend attempt the merge/rebase.
    pub async fn attempt(&self) -> Result<AttemptOutcome, GitError> {
        self.backend.begin(self.mode, &self.target.name).await
    }

    /// Stage 3: extract structured conflicts from the stopped attempt.
    pub fn extract(&self) -> Result<ExtractionOutcome, ConflictError> {
        ConflictExtractor::extract(&self.backend)
    }

    /// Stages 4-6: cluster, recommend, and assemble the reviewable plan.
    #[instrument(skip_all)]
    pub fn plan(
        &self,
        report: &DivergenceReport,
        extraction: ExtractionOutcome,
    ) -> Result<PlannedResolution, CoreError> {
        let patterns = PatternClusterer::cluster(&extraction.records);
        if patterns.is_empty() {
            return Err(PlanError::EmptyPlan.into());
        }

        let recommender = StrategyRecommender::new(self.config.strategy.clone());
        let intents = BranchIntents {
            current: report.current_intent(),
            target: report.target_intent(),
        };
        let proposals = patterns
            .iter()
            .map(|pattern| {
                let members: Vec<&ConflictRecord> = pattern
                    .member_ids
                    .iter()
                    .filter_map(|id| extraction.records.iter().find(|r| &r.id == id))
                    .collect();
                recommender.recommend(pattern, &members, &intents)
            })
            .collect();

        let plan = PlanBuilder::build(&patterns, proposals).map_err(CoreError::Plan)?;
        Ok(PlannedResolution {
            records: extraction.records,
            malformed: extraction.malformed,
            patterns,
            plan,
        })
    }

    /// Fresh executor for this session's backend and mode.
    pub fn executor(&self) -> ResolutionExecutor<'_> {
        ResolutionExecutor::new(&self.backend, self.mode)
    }

    /// Resolve the verification gate for this project.
    pub fn verification_gate(&self) -> Result<VerificationGate, crate::errors::VerifyError> {
        VerificationGate::detect(self.backend.workdir(), &self.config.verify)
    }

    /// Abort the in-progress attempt, restoring the pre-attempt tree.
    pub async fn abort(&self) -> Result<(), GitError> {
        self.backend.abort(self.mode).await
    }
}

// ---------------------------------------------------------------------------
// Plan review loop
// ---------------------------------------------------------------------------

/// Present the plan for approval through the decision port.
///
/// The loop offers approve / adjust / abort. Adjusting picks a pattern,
/// then a replacement strategy from that proposal's alternatives, and
/// regenerates the plan without re-running extraction or clustering.
/// Every choice is a closed, enumerated option.
pub fn review_plan(
    port: &mut dyn DecisionPort,
    mut plan: ResolutionPlan,
    patterns: &[ConflictPattern],
) -> Result<PlanDecision, CoreError> {
    let top_options = [
        DecisionOption::new("approve and apply the plan"),
        DecisionOption::new("adjust a pattern's strategy"),
        DecisionOption::new("abort the workflow"),
    ];

    loop {
        match port.choose("proceed with this resolution plan?", &top_options)? {
            0 => {
                info!(plan = %plan.id, "plan approved");
                return Ok(PlanDecision::Approved(plan));
            }
            1 => {
                let pattern_options: Vec<DecisionOption> = plan
                    .proposals
                    .iter()
                    .map(|proposal| {
                        let description = patterns
                            .iter()
                            .find(|p| p.id == proposal.pattern_id)
                            .map(|p| p.description.clone())
                            .unwrap_or_else(|| proposal.pattern_id.clone());
                        DecisionOption::with_detail(
                            format!("{}: {}", proposal.pattern_id, description),
                            format!("currently {}", proposal.strategy),
                        )
                    })
                    .collect();
                let pattern_idx = port.choose("adjust which pattern?", &pattern_options)?;
                let proposal = &plan.proposals[pattern_idx];
                let pattern_id = proposal.pattern_id.clone();

                let strategy_options: Vec<DecisionOption> = proposal
                    .alternatives
                    .iter()
                    .map(|alt| {
                        DecisionOption::with_detail(alt.strategy.to_string(), alt.impact.clone())
                    })
                    .collect();
                let strategy_idx =
                    port.choose("replace with which strategy?", &strategy_options)?;
                let strategy = proposal.alternatives[strategy_idx].strategy;

                plan = plan.adjust(&pattern_id, strategy).map_err(CoreError::Plan)?;
            }
            _ => {
                info!("plan rejected");
                return Ok(PlanDecision::Rejected);
            }
        }
    }
}
