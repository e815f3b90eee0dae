//! HTTP-backed wallet executor
//!
//! Forwards actions to the wallet service (smart-account, batching and
//! signing live there) and maps its JSON back into a `WalletOutcome`.

use crate::error::CoordinatorError;
use crate::json::truncate;
use crate::models::{WalletAction, WalletOutcome};
use crate::wallet::{explorer_tx_url, WalletExecutor};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct HttpWalletExecutor {
    client: Client,
    base_url: String,
    explorer_base: String,
}

impl HttpWalletExecutor {
    pub fn new(
        base_url: &str,
        explorer_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            explorer_base: explorer_base.into(),
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<WalletOutcome> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                CoordinatorError::WalletError(format!(
                    "Wallet service request failed for {}: {}",
                    path, e
                ))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            CoordinatorError::WalletError(format!("Failed to read wallet service response: {}", e))
        })?;

        self.outcome_from_response(path, status, &text)
    }

    /// Non-2xx replies become a failed outcome whatever their body looks like
    fn outcome_from_response(
        &self,
        path: &str,
        status: StatusCode,
        text: &str,
    ) -> Result<WalletOutcome> {
        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| truncate(text.trim(), 300));
            warn!(path, %status, %detail, "Wallet service rejected request");
            return Ok(WalletOutcome::failure(
                format!("Wallet service returned {}", status),
                detail,
            ));
        }

        let body = serde_json::from_str::<Value>(text).map_err(|e| {
            CoordinatorError::WalletError(format!("Invalid JSON from wallet service: {}", e))
        })?;

        self.to_outcome(body)
    }

    fn to_outcome(&self, body: Value) -> Result<WalletOutcome> {
        let mut outcome: WalletOutcome = serde_json::from_value(body).map_err(|e| {
            CoordinatorError::WalletError(format!("Unexpected wallet service response: {}", e))
        })?;

        if outcome.explorer_url.is_none() {
            outcome.explorer_url = outcome
                .transaction_hash
                .as_deref()
                .map(|hash| explorer_tx_url(&self.explorer_base, hash));
        }

        Ok(outcome)
    }
}

#[async_trait]
impl WalletExecutor for HttpWalletExecutor {
    async fn execute(&self, action: &WalletAction) -> Result<WalletOutcome> {
        if let Err(reason) = action.validate() {
            return Ok(WalletOutcome::failure("Invalid wallet action", reason));
        }

        debug!(kind = action.kind.as_str(), "Submitting wallet action");

        let path = format!("/wallet/{}", action.kind.as_str());
        self.post_json(&path, &Value::Object(action.parameters.clone()))
            .await
    }

    async fn create_wallet(&self) -> Result<WalletOutcome> {
        self.post_json("/wallet/create", &json!({})).await
    }
}
