//! Direct execution shortcuts
//!
//! Read-only or provisioning requests skip the revision loop entirely.
//! A shortcut applies only when the whole message is that request; anything
//! that also moves funds or asks for advice goes through the workflow.

use crate::mode::find_address;
use crate::models::{WalletAction, WalletActionKind, WalletOutcome};
use crate::wallet::WalletExecutor;
use crate::Result;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

lazy_static! {
    // message ends with the balance request, optionally qualified by an address
    static ref BALANCE_PATTERN: Regex = Regex::new(
        r"(?i)^[\w\s',.-]*\bbalances?(?:\s+(?:of|for|at)\s+0x[0-9a-f]{40})?(?:\s+please)?\W*$"
    )
    .expect("balance pattern compiles");

    static ref CREATE_WALLET_PATTERN: Regex = Regex::new(
        r"(?i)^\W*(?:please\s+)?(?:(?:can|could) you\s+)?(?:create|generate|set ?up)\s+(?:me\s+)?(?:(?:a|an|my)\s+)?(?:new\s+)?wallet(?:\s+for me)?(?:\s+please)?\W*$"
    )
    .expect("create wallet pattern compiles");

    static ref VALUE_MOVING: Regex = Regex::new(
        r"(?i)\b(send\w*|transfer\w*|approv\w*|swap\w*|mint\w*|bridg\w*|stak\w*|withdraw\w*|deposit\w*|pay|buy|sell)\b"
    )
    .expect("value-moving pattern compiles");

    static ref PLANNING_CUE: Regex = Regex::new(
        r"(?i)\b(best way|how|why|should|strateg\w*|roadmap|step by step)\b"
    )
    .expect("planning cue pattern compiles");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectOperation {
    /// `None` means the executor's own wallet
    CheckBalance { address: Option<String> },
    CreateWallet,
}

impl DirectOperation {
    /// Match `intent` against the shortcuts, if any applies
    pub fn detect(intent: &str) -> Option<Self> {
        if VALUE_MOVING.is_match(intent) || PLANNING_CUE.is_match(intent) {
            return None;
        }

        if CREATE_WALLET_PATTERN.is_match(intent) {
            return Some(Self::CreateWallet);
        }

        if BALANCE_PATTERN.is_match(intent) {
            return Some(Self::CheckBalance {
                address: find_address(intent).map(str::to_string),
            });
        }

        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CheckBalance { .. } => "check_balance",
            Self::CreateWallet => "create_wallet",
        }
    }

    pub async fn run(&self, wallet: &dyn WalletExecutor) -> Result<WalletOutcome> {
        match self {
            Self::CheckBalance { address } => {
                let mut parameters = Map::new();
                if let Some(address) = address {
                    parameters.insert("address".to_string(), Value::String(address.clone()));
                }
                wallet
                    .execute(&WalletAction::new(WalletActionKind::CheckBalance, parameters))
                    .await
            }
            Self::CreateWallet => wallet.create_wallet().await,
        }
    }
}
