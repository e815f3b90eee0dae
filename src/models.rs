//! Core data models for the coordinator

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Free-form user preferences (risk appetite, preferred chain, budget...)
pub type Preferences = Map<String, Value>;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Auto,
    Execution,
    Planning,
}

impl ExecutionMode {
    pub fn is_auto(self) -> bool {
        self == ExecutionMode::Auto
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Research,
    Analysis,
    Execution,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    NeedsRevision,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

//
// ================= Plan =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub goal: String,
    pub constraints: Vec<String>,
    pub steps: Vec<Step>,
    pub estimated_timeline: String,
    pub success_metrics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub step_number: u32,
    pub title: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub description: String,
    pub expected_outcome: String,
}

//
// ================= Research =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Research {
    pub findings: Vec<Finding>,
    pub overall_assessment: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Finding {
    pub topic: String,
    pub summary: String,
    pub relevance_score: f64,
    pub sources: Vec<String>,
}

//
// ================= Judgement =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Judgement {
    pub decision: Decision,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub risk_assessment: RiskAssessment,
    #[serde(default)]
    pub improvement_suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RiskAssessment {
    pub financial: RiskLevel,
    pub technical: RiskLevel,
    pub compliance: RiskLevel,
}

//
// ================= Wallet =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WalletActionKind {
    CheckBalance,
    SendTransaction,
    ApproveToken,
    BatchTransactions,
}

impl WalletActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WalletActionKind::CheckBalance => "check_balance",
            WalletActionKind::SendTransaction => "send_transaction",
            WalletActionKind::ApproveToken => "approve_token",
            WalletActionKind::BatchTransactions => "batch_transactions",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "check_balance" => Some(WalletActionKind::CheckBalance),
            "send_transaction" => Some(WalletActionKind::SendTransaction),
            "approve_token" => Some(WalletActionKind::ApproveToken),
            "batch_transactions" => Some(WalletActionKind::BatchTransactions),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletAction {
    pub kind: WalletActionKind,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl WalletAction {
    pub fn new(kind: WalletActionKind, parameters: Map<String, Value>) -> Self {
        Self { kind, parameters }
    }

    /// Check that the parameters required by `kind` are present.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let has_text = |key: &str| {
            self.parameters
                .get(key)
                .and_then(Value::as_str)
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false)
        };

        match self.kind {
            WalletActionKind::CheckBalance => Ok(()),
            WalletActionKind::SendTransaction if !has_text("to") => {
                Err("send_transaction requires a 'to' address".to_string())
            }
            WalletActionKind::ApproveToken if !has_text("token") => {
                Err("approve_token requires a 'token' address".to_string())
            }
            WalletActionKind::ApproveToken if !has_text("spender") => {
                Err("approve_token requires a 'spender' address".to_string())
            }
            WalletActionKind::BatchTransactions => {
                let non_empty = self
                    .parameters
                    .get("transactions")
                    .and_then(Value::as_array)
                    .map(|txs| !txs.is_empty())
                    .unwrap_or(false);
                if non_empty {
                    Ok(())
                } else {
                    Err("batch_transactions requires a non-empty 'transactions' list".to_string())
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for WalletAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.kind.as_str(),
            Value::Object(self.parameters.clone())
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balances: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WalletOutcome {
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

//
// ================= Context =================
//

/// Per-message accumulator owned by one workflow run
#[derive(Debug, Clone)]
pub struct AgentContext {
    user_intent: String,
    pub session_id: String,
    pub mode: ExecutionMode,
    pub user_preferences: Preferences,
    pub cycle_count: u32,
    pub planning_result: Option<Plan>,
    pub research_result: Option<Research>,
    pub judge_result: Option<Judgement>,
    pub wallet_action: Option<WalletAction>,
    pub wallet_result: Option<WalletOutcome>,
}

impl AgentContext {
    pub fn new(
        user_intent: impl Into<String>,
        session_id: impl Into<String>,
        mode: ExecutionMode,
        user_preferences: Preferences,
    ) -> Self {
        Self {
            user_intent: user_intent.into(),
            session_id: session_id.into(),
            mode,
            user_preferences,
            cycle_count: 0,
            planning_result: None,
            research_result: None,
            judge_result: None,
            wallet_action: None,
            wallet_result: None,
        }
    }

    pub fn user_intent(&self) -> &str {
        &self.user_intent
    }

    /// The plan must be (re)generated on the first cycle or after a revision request.
    pub fn needs_plan(&self) -> bool {
        self.planning_result.is_none()
            || matches!(
                self.judge_result.as_ref().map(|j| j.decision),
                Some(Decision::NeedsRevision)
            )
    }
}

//
// ================= Request / Response =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub mode: Option<ExecutionMode>,
    #[serde(default)]
    pub preferences: Option<Preferences>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub message: String,
    pub session_id: String,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research: Option<Research>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Judgement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<WalletOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_mode_selection: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl ProcessResponse {
    pub fn completed(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::with_status(ResponseStatus::Completed, message, session_id)
    }

    pub fn failed(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::with_status(ResponseStatus::Failed, message, session_id)
    }

    fn with_status(
        status: ResponseStatus,
        message: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            session_id: session_id.into(),
            status,
            mode: None,
            plan: None,
            research: None,
            decision: None,
            wallet: None,
            requires_mode_selection: None,
            suggested_mode: None,
            cycles: None,
            run_id: None,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionMode::Auto => "auto",
            ExecutionMode::Execution => "execution",
            ExecutionMode::Planning => "planning",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(kind: WalletActionKind, params: Value) -> WalletAction {
        WalletAction::new(kind, params.as_object().cloned().unwrap_or_default())
    }

    #[test]
    fn test_send_requires_recipient() {
        let missing = action(WalletActionKind::SendTransaction, json!({ "value": "0.5" }));
        assert!(missing.validate().is_err());

        let ok = action(
            WalletActionKind::SendTransaction,
            json!({ "to": "0xabc", "value": "0.5" }),
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_batch_requires_transactions() {
        let empty = action(WalletActionKind::BatchTransactions, json!({ "transactions": [] }));
        assert!(empty.validate().is_err());

        let ok = action(
            WalletActionKind::BatchTransactions,
            json!({ "transactions": [{ "to": "0xabc" }] }),
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_approve_requires_token_and_spender() {
        let no_spender = action(WalletActionKind::ApproveToken, json!({ "token": "0xt" }));
        assert!(no_spender.validate().unwrap_err().contains("spender"));

        let balance = action(WalletActionKind::CheckBalance, json!({}));
        assert!(balance.validate().is_ok());
    }

    #[test]
    fn test_plan_wire_format_is_camel_case() {
        let plan: Plan = serde_json::from_value(json!({
            "goal": "Accumulate ETH",
            "constraints": [],
            "steps": [{
                "stepNumber": 1,
                "title": "Research",
                "type": "research",
                "description": "Look at prices",
                "expectedOutcome": "Price range"
            }],
            "estimatedTimeline": "1 week",
            "successMetrics": ["Entry price below average"]
        }))
        .unwrap();

        assert_eq!(plan.steps[0].step_type, StepType::Research);
        let back = serde_json::to_value(&plan).unwrap();
        assert_eq!(back["estimatedTimeline"], "1 week");
    }

    #[test]
    fn test_context_needs_plan_only_on_start_or_revision() {
        let mut ctx = AgentContext::new("x", "s", ExecutionMode::Planning, Preferences::new());
        assert!(ctx.needs_plan());

        ctx.planning_result = Some(Plan {
            goal: "g".into(),
            constraints: vec![],
            steps: vec![],
            estimated_timeline: "t".into(),
            success_metrics: vec!["m".into()],
        });
        ctx.judge_result = Some(Judgement {
            decision: Decision::Rejected,
            reasoning: String::new(),
            risk_assessment: RiskAssessment::default(),
            improvement_suggestions: vec![],
        });
        assert!(!ctx.needs_plan());

        if let Some(j) = ctx.judge_result.as_mut() {
            j.decision = Decision::NeedsRevision;
        }
        assert!(ctx.needs_plan());
    }
}
