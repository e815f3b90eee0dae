//! Safety gate between plan approval and wallet execution
//!
//! Fail-closed: only an explicit, parseable `"safe": true` lets an action
//! through.

use crate::json::parse_first_object;
use crate::llm::LanguageModel;
use crate::models::WalletAction;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const RISK_CATEGORIES: &[&str] = &[
    "Transfers to unknown or unverified recipients",
    "Unlimited or excessive token approvals",
    "Interaction with unverified contracts",
    "Unexpected side effects beyond the stated intent",
];

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub safe: bool,
    pub reason: String,
}

impl SafetyVerdict {
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            safe: false,
            reason: reason.into(),
        }
    }
}

pub struct SafetyGate {
    model: Arc<dyn LanguageModel>,
}

impl SafetyGate {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    pub async fn assess(&self, action: &WalletAction) -> SafetyVerdict {
        if let Err(reason) = action.validate() {
            warn!(kind = action.kind.as_str(), %reason, "Wallet action blocked before review");
            return SafetyVerdict::blocked(reason);
        }

        let prompt = build_prompt(action);

        let verdict = match self.model.complete(&prompt).await {
            Ok(response) => parse_verdict(&response),
            Err(e) => SafetyVerdict::blocked(format!("safety check unavailable: {}", e)),
        };

        if verdict.safe {
            info!(kind = action.kind.as_str(), "Wallet action passed safety review");
        } else {
            warn!(kind = action.kind.as_str(), reason = %verdict.reason, "Wallet action blocked");
        }

        verdict
    }
}

fn build_prompt(action: &WalletAction) -> String {
    let parameters = serde_json::to_string_pretty(&action.parameters).unwrap_or_default();
    let categories = RISK_CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a transaction safety reviewer for a crypto wallet.

PROPOSED ACTION:
{}

PARAMETERS:
{}

Check the action against these risk categories:
{}

If any category applies and is not clearly justified, the action is unsafe.
Return ONLY valid JSON:

{{ "safe": true | false, "reason": "..." }}
"#,
        action.kind.as_str(),
        parameters,
        categories,
    )
}

fn parse_verdict(text: &str) -> SafetyVerdict {
    let json = match parse_first_object(text) {
        Ok(json) => json,
        Err(e) => return SafetyVerdict::blocked(format!("unreadable safety verdict: {}", e)),
    };

    let Some(safe) = json.get("safe").and_then(Value::as_bool) else {
        return SafetyVerdict::blocked("safety verdict is missing a boolean 'safe' field");
    };

    let reason = json
        .get("reason")
        .and_then(Value::as_str)
        .filter(|r| !r.trim().is_empty())
        .unwrap_or("no reason given")
        .to_string();

    SafetyVerdict { safe, reason }
}
