//! Wallet boundary
//!
//! The coordinator never talks to a chain directly. Approved plans are
//! reduced to a typed [`WalletAction`], checked by the [`SafetyGate`], and
//! handed to a [`WalletExecutor`].

use crate::models::{WalletAction, WalletActionKind, WalletOutcome};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub mod extractor;
pub mod http;
pub mod safety;

pub use extractor::WalletActionExtractor;
pub use http::HttpWalletExecutor;
pub use safety::{SafetyGate, SafetyVerdict};

/// Performs balance queries and on-chain operations
#[async_trait]
pub trait WalletExecutor: Send + Sync {
    async fn execute(&self, action: &WalletAction) -> Result<WalletOutcome>;

    /// Provision a new wallet for the user
    async fn create_wallet(&self) -> Result<WalletOutcome>;
}

/// Explorer link for a transaction hash
pub fn explorer_tx_url(explorer_base: &str, tx_hash: &str) -> String {
    format!("{}/tx/{}", explorer_base.trim_end_matches('/'), tx_hash)
}

/// One-line human summary of an outcome
pub fn describe_outcome(outcome: &WalletOutcome) -> String {
    let mut out = outcome.message.clone();

    if let Some(balances) = outcome.balances.as_ref().filter(|b| !b.is_empty()) {
        let listed = balances
            .iter()
            .map(|(token, amount)| format!("{} {}", amount, token))
            .collect::<Vec<_>>()
            .join(", ");
        match &outcome.address {
            Some(address) => out.push_str(&format!(" | {}: {}", address, listed)),
            None => out.push_str(&format!(" | {}", listed)),
        }
    } else if let Some(address) = &outcome.address {
        out.push_str(&format!(" | address {}", address));
    }

    if let Some(hash) = &outcome.transaction_hash {
        out.push_str(&format!(" | tx {}", hash));
    }
    if let Some(url) = &outcome.explorer_url {
        out.push_str(&format!(" ({})", url));
    }

    out
}

/// Deterministic executor for development and demos. Nothing leaves the
/// process; transaction hashes are derived from the action itself.
pub struct SimulatedWalletExecutor {
    address: String,
    explorer_base: String,
}

impl SimulatedWalletExecutor {
    pub fn new(explorer_base: impl Into<String>) -> Self {
        Self {
            address: "0x000000000000000000000000000000000000dEaD".to_string(),
            explorer_base: explorer_base.into(),
        }
    }

    fn pseudo_hash(seed: &str) -> String {
        format!("0x{}", hex::encode(Sha256::digest(seed.as_bytes())))
    }
}

#[async_trait]
impl WalletExecutor for SimulatedWalletExecutor {
    async fn execute(&self, action: &WalletAction) -> Result<WalletOutcome> {
        if let Err(reason) = action.validate() {
            return Ok(WalletOutcome::failure("Invalid wallet action", reason));
        }

        match action.kind {
            WalletActionKind::CheckBalance => {
                let address = action
                    .parameters
                    .get("address")
                    .and_then(Value::as_str)
                    .unwrap_or(self.address.as_str())
                    .to_string();

                let mut balances = BTreeMap::new();
                balances.insert("ETH".to_string(), "0.0000".to_string());
                balances.insert("USDC".to_string(), "0.00".to_string());

                Ok(WalletOutcome {
                    success: true,
                    message: "Simulated balance".to_string(),
                    address: Some(address),
                    balances: Some(balances),
                    ..Default::default()
                })
            }
            kind => {
                let tx_hash = Self::pseudo_hash(&action.to_string());
                Ok(WalletOutcome {
                    success: true,
                    message: format!("Simulated {}", kind.as_str()),
                    address: Some(self.address.clone()),
                    explorer_url: Some(explorer_tx_url(&self.explorer_base, &tx_hash)),
                    transaction_hash: Some(tx_hash),
                    ..Default::default()
                })
            }
        }
    }

    async fn create_wallet(&self) -> Result<WalletOutcome> {
        Ok(WalletOutcome {
            success: true,
            message: "Simulated wallet created".to_string(),
            address: Some(self.address.clone()),
            ..Default::default()
        })
    }
}
