//! Coordinator - single entry point for user messages
//!
//! MESSAGE → GREETING? → SESSION → MODE → DIRECT | WORKFLOW → AUDIT → RESPONSE

pub mod direct;
pub mod workflow;

pub use direct::DirectOperation;
pub use workflow::{CoordinatorWorkflow, FailureKind, WorkflowOutcome, WorkflowState, MAX_CYCLES};

use crate::audit::{compute_input_hash, AuditLog, RunRecord};
use crate::config::Config;
use crate::error::CoordinatorError;
use crate::judge::{Judge, LlmJudge, MockJudge};
use crate::llm::{GeminiClient, LanguageModel, UnconfiguredModel};
use crate::mode::ModeSelector;
use crate::models::{
    AgentContext, ExecutionMode, Preferences, ProcessRequest, ProcessResponse,
};
use crate::planner::{LlmPlanner, MockPlanner, Planner};
use crate::research::{LlmResearcher, MockResearcher, Researcher};
use crate::session::{SessionStore, SessionUpdate};
use crate::wallet::{
    describe_outcome, HttpWalletExecutor, SafetyGate, SimulatedWalletExecutor,
    WalletActionExtractor, WalletExecutor,
};
use crate::Result;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

const CAPABILITIES: &str = "Hi! I'm your wallet assistant. I can:\n\
- check balances and create wallets right away (execution mode)\n\
- send transactions, approve tokens or batch transfers after a safety review\n\
- research and build reviewed plans such as DCA or DeFi strategies (planning mode)\n\
Tell me what you'd like to do, optionally with \"mode\": \"execution\" or \"planning\".";

/// Await `fut`, failing with [`CoordinatorError::Timeout`] once `limit` elapses.
pub async fn with_timeout<T, F>(stage: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(stage, timeout_secs = limit.as_secs(), "Collaborator call timed out");
            Err(CoordinatorError::Timeout(stage, limit.as_secs()))
        }
    }
}

/// Routes each message to a direct wallet call or the revision workflow
pub struct Coordinator {
    workflow: CoordinatorWorkflow,
    wallet: Arc<dyn WalletExecutor>,
    sessions: Option<Arc<SessionStore>>,
    audit_log: AuditLog,
    call_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        workflow: CoordinatorWorkflow,
        wallet: Arc<dyn WalletExecutor>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            workflow,
            wallet,
            sessions: None,
            audit_log: AuditLog::new(),
            call_timeout,
        }
    }

    /// Remember mode and preferences per session id
    pub fn with_sessions(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Wire collaborators from configuration.
    ///
    /// Without a Gemini key the offline planner, researcher and judge are used
    /// and the extractor and safety gate fail closed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let wallet: Arc<dyn WalletExecutor> = match &config.wallet_api_base_url {
            Some(base_url) => {
                info!(base_url = %base_url, "Using wallet service");
                Arc::new(HttpWalletExecutor::new(
                    base_url,
                    config.explorer_base_url.clone(),
                    config.call_timeout,
                )?)
            }
            None => {
                info!("WALLET_API_BASE_URL not set - using simulated wallet");
                Arc::new(SimulatedWalletExecutor::new(config.explorer_base_url.clone()))
            }
        };

        let (planner, researcher, judge, think): (
            Arc<dyn Planner>,
            Arc<dyn Researcher>,
            Arc<dyn Judge>,
            Arc<dyn LanguageModel>,
        ) = if config.has_llm() {
            let think: Arc<dyn LanguageModel> = Arc::new(GeminiClient::think(
                config.gemini_api_key.clone(),
                config.think_model.clone(),
            )?);
            let research: Arc<dyn LanguageModel> = Arc::new(GeminiClient::research(
                config.gemini_api_key.clone(),
                config.research_model.clone(),
            )?);

            (
                Arc::new(LlmPlanner::new(think.clone())),
                Arc::new(LlmResearcher::new(research)),
                Arc::new(LlmJudge::new(think.clone())),
                think,
            )
        } else {
            warn!("GEMINI_API_KEY not set - running with offline agents");
            (
                Arc::new(MockPlanner),
                Arc::new(MockResearcher),
                Arc::new(MockJudge::default()),
                Arc::new(UnconfiguredModel::new("think")),
            )
        };

        let workflow = CoordinatorWorkflow::new(
            planner,
            researcher,
            judge,
            WalletActionExtractor::new(think.clone()),
            SafetyGate::new(think),
            wallet.clone(),
            config.call_timeout,
        );

        Ok(Self::new(workflow, wallet, config.call_timeout))
    }

    pub fn sessions(&self) -> Option<&Arc<SessionStore>> {
        self.sessions.as_ref()
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// Handle one user message. Never fails: errors become `failed` responses.
    pub async fn process_message(&self, request: ProcessRequest) -> ProcessResponse {
        let started = Instant::now();
        let session_id = request
            .session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let message = request.message.trim();

        info!(session_id = %session_id, message = %message, "Processing message");

        if message.is_empty() {
            return ProcessResponse::failed("Failed to process request: message is empty", session_id);
        }

        if ModeSelector::is_greeting(message) {
            return ProcessResponse::completed(CAPABILITIES, session_id);
        }

        let (session_mode, preferences) = self.resolve_session(&session_id, &request);
        let requested = request
            .mode
            .filter(|mode| !mode.is_auto())
            .unwrap_or(session_mode);
        let decision = ModeSelector::select(message, requested);

        info!(
            session_id = %session_id,
            requested = %requested,
            selected = %decision.mode,
            requires_user_choice = decision.requires_user_choice,
            "Mode selected"
        );

        let mut trace = vec![format!("MODE: {}", decision.mode)];

        let mut response = if decision.requires_user_choice {
            let mut response = ProcessResponse::completed(
                decision.clarifying_message.unwrap_or_default(),
                &session_id,
            );
            response.mode = Some(ExecutionMode::Auto);
            response.requires_mode_selection = Some(true);
            response.suggested_mode = Some(decision.suggested_mode);
            response
        } else if decision.mode == ExecutionMode::Execution {
            match DirectOperation::detect(message) {
                Some(operation) => self.run_direct(operation, &session_id, &mut trace).await,
                None => {
                    info!(session_id = %session_id, "No direct handler matched - falling back to planning");
                    trace.push("DIRECT: no handler, falling back to planning".to_string());
                    self.run_planning(message, &session_id, preferences, &mut trace)
                        .await
                }
            }
        } else {
            self.run_planning(message, &session_id, preferences, &mut trace)
                .await
        };

        let run_id = Uuid::new_v4();
        response.run_id = Some(run_id);
        self.record_run(run_id, message, &response, trace, started).await;

        response
    }

    fn resolve_session(
        &self,
        session_id: &str,
        request: &ProcessRequest,
    ) -> (ExecutionMode, Preferences) {
        let explicit_mode = request.mode.filter(|mode| !mode.is_auto());

        let Some(store) = &self.sessions else {
            return (
                ExecutionMode::Auto,
                request.preferences.clone().unwrap_or_default(),
            );
        };

        let state = if explicit_mode.is_some() || request.preferences.is_some() {
            store.update(
                session_id,
                SessionUpdate {
                    mode: explicit_mode,
                    preferences: request.preferences.clone(),
                },
            )
        } else {
            store.get_or_create(session_id)
        };

        (state.mode, state.preferences)
    }

    async fn run_direct(
        &self,
        operation: DirectOperation,
        session_id: &str,
        trace: &mut Vec<String>,
    ) -> ProcessResponse {
        info!(session_id = %session_id, operation = operation.name(), "Direct execution");

        let result = with_timeout(
            "wallet execution",
            self.call_timeout,
            operation.run(self.wallet.as_ref()),
        )
        .await;

        let mut response = match result {
            Ok(outcome) => {
                trace.push(format!("DIRECT {}: {}", operation.name(), describe_outcome(&outcome)));
                let mut response = if outcome.success {
                    ProcessResponse::completed(describe_outcome(&outcome), session_id)
                } else {
                    let reason = outcome.error.as_deref().unwrap_or(outcome.message.as_str());
                    ProcessResponse::failed(format!("Operation failed: {}", reason), session_id)
                };
                response.wallet = Some(outcome);
                response
            }
            Err(e) => {
                error!(session_id = %session_id, operation = operation.name(), error = %e, "Direct execution failed");
                trace.push(format!("DIRECT {}: error {}", operation.name(), e));
                ProcessResponse::failed(format!("Failed to process request: {}", e), session_id)
            }
        };

        response.mode = Some(ExecutionMode::Execution);
        response
    }

    async fn run_planning(
        &self,
        message: &str,
        session_id: &str,
        preferences: Preferences,
        trace: &mut Vec<String>,
    ) -> ProcessResponse {
        let mut context =
            AgentContext::new(message, session_id, ExecutionMode::Planning, preferences);

        match self.workflow.run(&mut context, trace).await {
            Ok(outcome) => workflow_response(context, outcome),
            Err(e) => {
                if e.is_malformed_output() {
                    warn!(session_id = %session_id, error = %e, "Workflow aborted on unusable model output");
                } else {
                    error!(session_id = %session_id, error = %e, "Workflow aborted");
                }
                trace.push(format!("ABORTED: {}", e));
                let mut response = ProcessResponse::failed(
                    format!("Failed to process request: {}", e),
                    session_id,
                );
                response.mode = Some(context.mode);
                response
            }
        }
    }

    async fn record_run(
        &self,
        run_id: Uuid,
        message: &str,
        response: &ProcessResponse,
        trace: Vec<String>,
        started: Instant,
    ) {
        let mode = response.mode.unwrap_or_default();
        let record = RunRecord {
            run_id,
            session_id: response.session_id.clone(),
            intent: message.to_string(),
            mode,
            cycles: response.cycles.unwrap_or(0),
            status: response.status,
            input_hash: compute_input_hash(message, &response.session_id, mode),
            response: Arc::new(response.clone()),
            reasoning_trace: trace,
            created_at: Utc::now(),
            execution_time_ms: started.elapsed().as_millis() as u64,
        };

        if let Err(e) = self.audit_log.record(record).await {
            warn!(run_id = %run_id, error = %e, "Failed to record run");
        }

        info!(
            run_id = %run_id,
            status = ?response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Message processed"
        );
    }
}

/// Translate a finished workflow into the caller-facing response
fn workflow_response(context: AgentContext, outcome: WorkflowOutcome) -> ProcessResponse {
    let mut response = match &outcome {
        WorkflowOutcome::Approved => {
            let goal = context
                .planning_result
                .as_ref()
                .map(|plan| plan.goal.as_str())
                .unwrap_or("your request");
            let mut message = format!(
                "Plan approved after {} cycle(s): {}",
                context.cycle_count, goal
            );
            if let Some(outcome) = &context.wallet_result {
                message.push('\n');
                message.push_str(&describe_outcome(outcome));
            }
            ProcessResponse::completed(message, context.session_id.as_str())
        }
        WorkflowOutcome::Failed { reason, .. } => {
            ProcessResponse::failed(reason.as_str(), context.session_id.as_str())
        }
    };

    response.mode = Some(context.mode);
    response.cycles = Some(context.cycle_count);
    response.plan = context.planning_result;
    response.research = context.research_result;
    response.decision = context.judge_result;
    response.wallet = context.wallet_result;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Decision, ResponseStatus, WalletOutcome};
    use crate::test_support::{plan_json, ScriptedModel, StubWallet};
    use serde_json::json;

    struct Harness {
        think: Arc<ScriptedModel>,
        research: Arc<ScriptedModel>,
        wallet: Arc<StubWallet>,
        sessions: Arc<SessionStore>,
        coordinator: Coordinator,
    }

    fn harness(think: ScriptedModel, research: ScriptedModel, wallet: StubWallet) -> Harness {
        let think = Arc::new(think);
        let research = Arc::new(research);
        let wallet = Arc::new(wallet);
        let sessions = Arc::new(SessionStore::new());

        let workflow = CoordinatorWorkflow::new(
            Arc::new(LlmPlanner::new(think.clone())),
            Arc::new(LlmResearcher::new(research.clone())),
            Arc::new(LlmJudge::new(think.clone())),
            WalletActionExtractor::new(think.clone()),
            SafetyGate::new(think.clone()),
            wallet.clone(),
            Duration::from_secs(5),
        );
        let coordinator = Coordinator::new(workflow, wallet.clone(), Duration::from_secs(5))
            .with_sessions(sessions.clone());

        Harness {
            think,
            research,
            wallet,
            sessions,
            coordinator,
        }
    }

    fn idle_models() -> (ScriptedModel, ScriptedModel) {
        (
            ScriptedModel::new(Vec::<String>::new()),
            ScriptedModel::new(Vec::<String>::new()),
        )
    }

    fn request(message: &str, mode: Option<ExecutionMode>) -> ProcessRequest {
        ProcessRequest {
            message: message.to_string(),
            session_id: Some("session-1".to_string()),
            mode,
            preferences: None,
        }
    }

    fn approved_judgement() -> String {
        json!({
            "decision": "approved",
            "reasoning": "Recipient verified and amount is small",
            "riskAssessment": { "financial": "low", "technical": "low", "compliance": "low" },
            "improvementSuggestions": []
        })
        .to_string()
    }

    fn research_response() -> String {
        json!({
            "findings": [{
                "topic": "Gas",
                "summary": "Fees are low right now",
                "relevanceScore": 0.7,
                "sources": []
            }],
            "overallAssessment": "Proceed"
        })
        .to_string()
    }

    fn send_plan_json() -> String {
        json!({
            "goal": "Pay a friend",
            "constraints": [],
            "steps": [
                {
                    "stepNumber": 1,
                    "title": "Check fees",
                    "type": "research",
                    "description": "Check current gas fees",
                    "expectedOutcome": "Fee estimate"
                },
                {
                    "stepNumber": 2,
                    "title": "Send",
                    "type": "execution",
                    "description": "Send 0.5 ETH to 0xabc123",
                    "expectedOutcome": "Funds delivered"
                }
            ],
            "estimatedTimeline": "Minutes",
            "successMetrics": ["Recipient receives 0.5 ETH"]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_balance_check_goes_straight_to_wallet() {
        let (think, research) = idle_models();
        let h = harness(think, research, StubWallet::with_balances());

        let response = h
            .coordinator
            .process_message(request("Check my wallet balance", None))
            .await;

        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(response.mode, Some(ExecutionMode::Execution));
        assert!(response.message.contains("1.25 ETH"));
        assert!(response.message.contains("420.00 USDC"));
        let balances = response.wallet.as_ref().unwrap().balances.as_ref().unwrap();
        assert_eq!(balances.len(), 2);
        assert!(response.plan.is_none());
        assert_eq!(h.think.calls(), 0);
        assert_eq!(h.research.calls(), 0);
        assert_eq!(h.wallet.execute_count(), 1);
    }

    #[tokio::test]
    async fn test_approved_send_runs_full_pipeline() {
        let think = ScriptedModel::new([
            send_plan_json(),
            approved_judgement(),
            r#"{"action": "send_transaction", "parameters": {"to": "0xabc123", "value": "0.5"}}"#.to_string(),
            r#"{"safe": true, "reason": "Small transfer to a stated recipient"}"#.to_string(),
        ]);
        let research = ScriptedModel::new([research_response()]);
        let wallet = StubWallet::new(WalletOutcome {
            success: true,
            message: "Transaction sent".to_string(),
            transaction_hash: Some("0xfeedbeef".to_string()),
            ..Default::default()
        });
        let h = harness(think, research, wallet);

        let response = h
            .coordinator
            .process_message(request("Send 0.5 ETH to 0xabc123", Some(ExecutionMode::Planning)))
            .await;

        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(response.mode, Some(ExecutionMode::Planning));
        assert_eq!(response.cycles, Some(1));
        assert!(response.plan.is_some());
        assert!(response.research.is_some());
        assert_eq!(response.decision.as_ref().unwrap().decision, Decision::Approved);
        let wallet = response.wallet.as_ref().unwrap();
        assert!(wallet.success);
        assert_eq!(wallet.transaction_hash.as_deref(), Some("0xfeedbeef"));
        assert!(response.message.contains("0xfeedbeef"));
        assert_eq!(h.think.calls(), 4);
    }

    #[tokio::test]
    async fn test_plan_without_wallet_steps_completes() {
        let think = ScriptedModel::new([plan_json(), approved_judgement()]);
        let research = ScriptedModel::new([research_response()]);
        let h = harness(think, research, StubWallet::with_balances());

        let response = h
            .coordinator
            .process_message(request("Build me a DCA strategy for ETH", None))
            .await;

        assert_eq!(response.status, ResponseStatus::Completed);
        assert!(response.message.contains("Accumulate ETH"));
        assert!(response.wallet.is_none());
        assert_eq!(h.wallet.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_judge_output_fails_without_partial_state() {
        let think = ScriptedModel::new([plan_json(), "Looks reasonable to me.".to_string()]);
        let research = ScriptedModel::new([research_response()]);
        let h = harness(think, research, StubWallet::with_balances());

        let response = h
            .coordinator
            .process_message(request("Build me a DCA strategy for ETH", None))
            .await;

        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.message.starts_with("Failed to process request:"));
        assert!(response.message.contains("Judge parse failed"));
        assert!(response.plan.is_none());
        assert!(response.research.is_none());
        assert!(response.decision.is_none());
        assert_eq!(h.wallet.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_greeting_needs_no_collaborators() {
        let (think, research) = idle_models();
        let h = harness(think, research, StubWallet::with_balances());

        let response = h.coordinator.process_message(request("hello", None)).await;

        assert_eq!(response.status, ResponseStatus::Completed);
        assert!(response.message.contains("wallet assistant"));
        assert!(response.run_id.is_none());
        assert_eq!(h.think.calls(), 0);
        assert_eq!(h.wallet.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_ambiguous_message_asks_for_mode() {
        let (think, research) = idle_models();
        let h = harness(think, research, StubWallet::with_balances());

        let response = h.coordinator.process_message(request("ethereum tokens", None)).await;

        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(response.requires_mode_selection, Some(true));
        assert_eq!(response.suggested_mode, Some(ExecutionMode::Execution));
        assert_eq!(response.mode, Some(ExecutionMode::Auto));
        assert_eq!(h.think.calls(), 0);
    }

    #[tokio::test]
    async fn test_explicit_mode_is_remembered_for_the_session() {
        let (think, research) = idle_models();
        let h = harness(think, research, StubWallet::with_balances());

        let mut first = request("check balance", Some(ExecutionMode::Execution));
        first.preferences = json!({ "risk": "low" }).as_object().cloned();
        h.coordinator.process_message(first).await;

        let state = h.sessions.get("session-1").unwrap();
        assert_eq!(state.mode, ExecutionMode::Execution);
        assert_eq!(state.preferences["risk"], "low");

        // would be ambiguous under auto selection
        let response = h
            .coordinator
            .process_message(request("ethereum tokens balance", None))
            .await;

        assert!(response.requires_mode_selection.is_none());
        assert_eq!(response.mode, Some(ExecutionMode::Execution));
        assert!(response.wallet.is_some());
        assert_eq!(h.wallet.execute_count(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_execution_request_falls_back_to_planning() {
        let h = harness(
            ScriptedModel::failing("provider down"),
            ScriptedModel::new(Vec::<String>::new()),
            StubWallet::with_balances(),
        );

        let response = h
            .coordinator
            .process_message(request("send 0.5 ETH to 0xabc123", Some(ExecutionMode::Execution)))
            .await;

        assert_eq!(response.mode, Some(ExecutionMode::Planning));
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(h.think.calls(), 1);
        assert_eq!(h.wallet.execute_count(), 0);
    }

    #[tokio::test]
    async fn test_mixed_requests_never_take_a_shortcut() {
        let cases = [
            (
                "Create a new wallet and send 0.5 ETH to 0x1234567890abcdef1234567890abcdef12345678",
                None,
            ),
            ("What's the best way to make my wallet more secure?", None),
            (
                "Transfer my entire balance to 0x1234567890abcdef1234567890abcdef12345678",
                Some(ExecutionMode::Execution),
            ),
        ];

        for (message, mode) in cases {
            let h = harness(
                ScriptedModel::failing("provider down"),
                ScriptedModel::new(Vec::<String>::new()),
                StubWallet::with_balances(),
            );

            let response = h.coordinator.process_message(request(message, mode)).await;

            assert_eq!(response.mode, Some(ExecutionMode::Planning), "{}", message);
            assert_eq!(response.status, ResponseStatus::Failed, "{}", message);
            assert_eq!(h.wallet.created.load(std::sync::atomic::Ordering::SeqCst), 0);
            assert_eq!(h.wallet.execute_count(), 0, "{}", message);
        }
    }

    #[test]
    fn test_workflow_response_reports_context_mode() {
        let mut context = AgentContext::new(
            "Pay a friend",
            "session-1",
            ExecutionMode::Planning,
            Preferences::new(),
        );
        context.cycle_count = MAX_CYCLES;

        let response = workflow_response(
            context,
            WorkflowOutcome::Failed {
                kind: FailureKind::MaxCyclesExceeded,
                reason: "No approved plan".to_string(),
            },
        );

        assert_eq!(response.mode, Some(ExecutionMode::Planning));
        assert_eq!(response.cycles, Some(MAX_CYCLES));
        assert_eq!(response.status, ResponseStatus::Failed);
    }

    #[tokio::test]
    async fn test_runs_are_audited() {
        let (think, research) = idle_models();
        let h = harness(think, research, StubWallet::with_balances());

        let response = h
            .coordinator
            .process_message(request("Check my wallet balance", None))
            .await;
        let run_id = response.run_id.unwrap();

        let record = h.coordinator.audit_log().get(run_id).await.unwrap().unwrap();
        assert_eq!(record.session_id, "session-1");
        assert_eq!(record.mode, ExecutionMode::Execution);
        assert!(!record.reasoning_trace.is_empty());
        assert!(h.coordinator.audit_log().verify_integrity(run_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_session_id_is_generated() {
        let (think, research) = idle_models();
        let h = harness(think, research, StubWallet::with_balances());

        let response = h
            .coordinator
            .process_message(ProcessRequest {
                message: "Check my wallet balance".to_string(),
                ..Default::default()
            })
            .await;

        assert!(Uuid::parse_str(&response.session_id).is_ok());
        assert!(h.sessions.get(&response.session_id).is_some());
    }

    #[tokio::test]
    async fn test_offline_config_builds_working_coordinator() {
        let coordinator = Coordinator::from_config(&Config::default()).unwrap();

        let response = coordinator
            .process_message(request("Check my wallet balance", None))
            .await;

        assert_eq!(response.status, ResponseStatus::Completed);
        assert!(response.wallet.unwrap().balances.is_some());
    }
}
