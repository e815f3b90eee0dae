//! Wallet action extraction from approved plans
//!
//! A cheap keyword pre-filter decides whether any execution step could touch
//! the wallet. Only then is the think model asked for a typed action.

use crate::error::CoordinatorError;
use crate::json::parse_first_object;
use crate::llm::LanguageModel;
use crate::models::{Plan, Step, StepType, WalletAction, WalletActionKind};
use crate::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

const WALLET_KEYWORDS: &[&str] = &["wallet", "transaction", "transfer", "send", "approve"];

pub struct WalletActionExtractor {
    model: Arc<dyn LanguageModel>,
}

impl WalletActionExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Execution steps whose description mentions a wallet operation
    pub fn candidate_steps(plan: &Plan) -> Vec<&Step> {
        plan.steps
            .iter()
            .filter(|step| step.step_type == StepType::Execution)
            .filter(|step| {
                let description = step.description.to_lowercase();
                WALLET_KEYWORDS.iter().any(|k| description.contains(k))
            })
            .collect()
    }

    pub async fn extract(&self, plan: &Plan) -> Result<Option<WalletAction>> {
        let candidates = Self::candidate_steps(plan);
        if candidates.is_empty() {
            debug!("No wallet-related execution steps; skipping extraction");
            return Ok(None);
        }

        let prompt = build_prompt(&plan.goal, &candidates);
        let response = self.model.complete(&prompt).await?;
        let action = parse_action_response(&response)?;

        debug!(
            candidate_steps = candidates.len(),
            action = ?action.as_ref().map(|a| a.kind),
            "Wallet action extracted"
        );

        Ok(action)
    }
}

fn build_prompt(goal: &str, steps: &[&Step]) -> String {
    let listed = steps
        .iter()
        .map(|s| format!("{}. {}: {}", s.step_number, s.title, s.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Extract the single wallet operation implied by these approved plan steps.

PLAN GOAL:
{}

EXECUTION STEPS:
{}

Supported actions and parameters:
- check_balance: {{ "address": "<optional 0x address>" }}
- send_transaction: {{ "to": "<0x address>", "value": "<amount in ETH>", "data": "<optional hex>" }}
- approve_token: {{ "token": "<token address>", "spender": "<0x address>", "amount": "<amount>" }}
- batch_transactions: {{ "transactions": [{{ "to": "...", "value": "...", "data": "..." }}] }}

If the steps do not require a wallet operation, use "action": null.
Only use values stated in the steps; never invent addresses or amounts.
Return ONLY valid JSON:

{{ "action": "send_transaction" | "check_balance" | "approve_token" | "batch_transactions" | null, "parameters": {{ ... }} }}
"#,
        goal, listed
    )
}

fn parse_action_response(text: &str) -> Result<Option<WalletAction>> {
    let json = parse_first_object(text)
        .map_err(|e| CoordinatorError::ActionParseFailed(e.to_string()))?;

    let kind = match json.get("action") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(name)) => WalletActionKind::parse(name).ok_or_else(|| {
            CoordinatorError::ActionParseFailed(format!("unknown action '{}'", name))
        })?,
        Some(other) => {
            return Err(CoordinatorError::ActionParseFailed(format!(
                "'action' must be a string or null, got {}",
                other
            )))
        }
    };

    let parameters = match json.get("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(CoordinatorError::ActionParseFailed(format!(
                "'parameters' must be an object, got {}",
                other
            )))
        }
    };

    Ok(Some(WalletAction::new(kind, parameters)))
}
