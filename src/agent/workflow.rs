//! Bounded revision loop
//!
//! PLAN → RESEARCH → JUDGE → (REVISE)* → EXTRACT → SAFETY → EXECUTE
//!
//! The plan is regenerated only on the first cycle or after a
//! `needs_revision` judgement. Research and judging run every cycle.
//! Approval is terminal.

use crate::agent::with_timeout;
use crate::judge::Judge;
use crate::models::{AgentContext, Decision};
use crate::planner::Planner;
use crate::research::Researcher;
use crate::wallet::{describe_outcome, SafetyGate, SafetyVerdict, WalletActionExtractor, WalletExecutor};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Hard ceiling on plan → research → judge iterations per message
pub const MAX_CYCLES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Planning,
    Researching,
    Judging,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Safety gate refused the wallet action
    Rejected,
    /// Wallet executor reported `success = false`
    ExecutionFailed,
    MaxCyclesExceeded,
}

/// Terminal business outcome. Transport and parse errors are `Err` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    Approved,
    Failed { kind: FailureKind, reason: String },
}

pub struct CoordinatorWorkflow {
    planner: Arc<dyn Planner>,
    researcher: Arc<dyn Researcher>,
    judge: Arc<dyn Judge>,
    extractor: WalletActionExtractor,
    safety_gate: SafetyGate,
    wallet: Arc<dyn WalletExecutor>,
    call_timeout: Duration,
}

impl CoordinatorWorkflow {
    pub fn new(
        planner: Arc<dyn Planner>,
        researcher: Arc<dyn Researcher>,
        judge: Arc<dyn Judge>,
        extractor: WalletActionExtractor,
        safety_gate: SafetyGate,
        wallet: Arc<dyn WalletExecutor>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            planner,
            researcher,
            judge,
            extractor,
            safety_gate,
            wallet,
            call_timeout,
        }
    }

    fn enter(state: &mut WorkflowState, next: WorkflowState, cycle: u32) {
        debug!(cycle, from = ?*state, to = ?next, "Workflow transition");
        *state = next;
    }

    /// Drive `context` to a terminal outcome.
    ///
    /// Any collaborator error aborts the run; the caller discards `context`.
    pub async fn run(
        &self,
        context: &mut AgentContext,
        trace: &mut Vec<String>,
    ) -> Result<WorkflowOutcome> {
        let intent = context.user_intent().to_string();
        let preferences = context.user_preferences.clone();
        let mut state = WorkflowState::Idle;

        info!(
            session_id = %context.session_id,
            mode = %context.mode,
            intent = %intent,
            "Workflow: starting revision loop"
        );

        while context.cycle_count < MAX_CYCLES {
            context.cycle_count += 1;
            let cycle = context.cycle_count;

            // === PLAN ===
            let regenerate = context.needs_plan();
            let plan = match context.planning_result.take() {
                Some(plan) if !regenerate => {
                    trace.push(format!("CYCLE {}: PLAN reused", cycle));
                    plan
                }
                _ => {
                    Self::enter(&mut state, WorkflowState::Planning, cycle);
                    let feedback = context
                        .judge_result
                        .as_ref()
                        .filter(|j| j.decision == Decision::NeedsRevision);

                    let plan = with_timeout(
                        "planner",
                        self.call_timeout,
                        self.planner.generate(&intent, &preferences, feedback),
                    )
                    .await?;

                    trace.push(format!(
                        "CYCLE {}: PLAN {} with {} steps",
                        cycle,
                        if feedback.is_some() { "revised" } else { "created" },
                        plan.steps.len()
                    ));
                    plan
                }
            };

            // === RESEARCH ===
            Self::enter(&mut state, WorkflowState::Researching, cycle);
            let research = with_timeout(
                "research",
                self.call_timeout,
                self.researcher.research(&intent, &plan),
            )
            .await?;
            trace.push(format!(
                "CYCLE {}: RESEARCH {} findings",
                cycle,
                research.findings.len()
            ));

            // === JUDGE ===
            Self::enter(&mut state, WorkflowState::Judging, cycle);
            let judgement = with_timeout(
                "judge",
                self.call_timeout,
                self.judge.judge(&intent, &preferences, &plan, &research),
            )
            .await?;
            let decision = judgement.decision;

            info!(cycle, decision = ?decision, "Judgement received");
            trace.push(format!("CYCLE {}: JUDGE {:?}", cycle, decision));

            context.planning_result = Some(plan);
            context.research_result = Some(research);
            context.judge_result = Some(judgement);

            if decision == Decision::Approved {
                let outcome = self.resolve_approved(context, trace).await?;
                Self::enter(&mut state, WorkflowState::Resolved, cycle);
                return Ok(outcome);
            }

            // === REVISE ===
            if cycle < MAX_CYCLES {
                debug!(cycle, decision = ?decision, "Plan not approved - continuing");
            }
        }

        Self::enter(&mut state, WorkflowState::Resolved, context.cycle_count);
        warn!(
            session_id = %context.session_id,
            cycles = context.cycle_count,
            "Maximum revision cycles reached without approval"
        );
        trace.push("RESOLVED: maximum revision cycles reached".to_string());

        Ok(WorkflowOutcome::Failed {
            kind: FailureKind::MaxCyclesExceeded,
            reason: format!(
                "Maximum revision cycles reached ({}) without an approved plan",
                MAX_CYCLES
            ),
        })
    }

    async fn resolve_approved(
        &self,
        context: &mut AgentContext,
        trace: &mut Vec<String>,
    ) -> Result<WorkflowOutcome> {
        // === EXTRACT ===
        if context.wallet_action.is_none() {
            if let Some(plan) = context.planning_result.as_ref() {
                context.wallet_action = with_timeout(
                    "wallet action extraction",
                    self.call_timeout,
                    self.extractor.extract(plan),
                )
                .await?;
            }
        }

        let Some(action) = context.wallet_action.as_ref() else {
            trace.push("RESOLVED: approved, no wallet action".to_string());
            return Ok(WorkflowOutcome::Approved);
        };
        trace.push(format!("EXTRACT: {}", action.kind.as_str()));

        // === SAFETY ===
        let verdict = match tokio::time::timeout(self.call_timeout, self.safety_gate.assess(action)).await {
            Ok(verdict) => verdict,
            Err(_) => SafetyVerdict::blocked(format!(
                "safety check timed out after {}s",
                self.call_timeout.as_secs()
            )),
        };

        if !verdict.safe {
            trace.push(format!("SAFETY: blocked ({})", verdict.reason));
            return Ok(WorkflowOutcome::Failed {
                kind: FailureKind::Rejected,
                reason: format!("Operation rejected: {}", verdict.reason),
            });
        }
        trace.push("SAFETY: passed".to_string());

        // === EXECUTE ===
        let outcome = with_timeout(
            "wallet execution",
            self.call_timeout,
            self.wallet.execute(action),
        )
        .await?;

        let succeeded = outcome.success;
        let failure = outcome
            .error
            .clone()
            .unwrap_or_else(|| outcome.message.clone());
        trace.push(format!("EXECUTE: {}", describe_outcome(&outcome)));
        context.wallet_result = Some(outcome);

        if !succeeded {
            warn!(kind = action.kind.as_str(), error = %failure, "Wallet operation failed");
            return Ok(WorkflowOutcome::Failed {
                kind: FailureKind::ExecutionFailed,
                reason: format!("Operation failed: {}", failure),
            });
        }

        info!(kind = action.kind.as_str(), "Wallet operation executed");
        Ok(WorkflowOutcome::Approved)
    }
}
