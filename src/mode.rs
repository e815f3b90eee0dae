//! Execution mode selection
//!
//! Classifies a user message as:
//! - Execution: direct, low-latency wallet operations (e.g. "check my balance", "send 1 ETH to 0x...")
//! - Planning: deliberative multi-agent loop (e.g. "best way to accumulate ETH", "DeFi roadmap")
//! - Ambiguous: bare crypto keywords, the user is asked to choose

use crate::models::ExecutionMode;
use lazy_static::lazy_static;
use regex::{Regex, RegexSet};

lazy_static! {
    static ref EXECUTION_PATTERNS: RegexSet = RegexSet::new([
        // Balance checks, with or without an address
        r"(?i)\b(check|show|get|view|see|what(?:'s| is))\b.*\bbalances?\b",
        r"(?i)\bbalances?\s+(?:of|for|at)\s+0x[0-9a-f]{6,}",
        // Wallet provisioning
        r"(?i)\b(create|generate|set ?up)\s+(?:me\s+)?(?:(?:a|an|my)\s+)?(?:new\s+)?wallet\b",
        // Transfers to an explicit address
        r"(?i)\b(send|transfer)\s+\d+(?:\.\d+)?\s*[a-z]*\s+to\s+0x[0-9a-f]+",
        r"(?i)\bmint\b.*\bnfts?\b",
        r"(?i)\bapprove\b.*\btokens?\b",
    ])
    .expect("execution patterns compile");

    static ref PLANNING_PATTERNS: RegexSet = RegexSet::new([
        r"(?i)\b(strateg(?:y|ies)|accumulat\w*|dca|dollar[- ]cost)\b",
        r"(?i)\bbest way to\b",
        r"(?i)\broadmap\b",
        r"(?i)\bstep[- ]by[- ]step\b",
        r"(?i)\b(defi|yield|farming|liquidity|staking|stake)\b",
    ])
    .expect("planning patterns compile");

    static ref AMBIGUOUS_PATTERNS: RegexSet = RegexSet::new([
        r"(?i)\b(crypto|tokens?|eth|ethereum|usdc|btc|bitcoin|blockchain|chain|coins?|nfts?)\b",
    ])
    .expect("ambiguous patterns compile");

    static ref GREETING_PATTERN: Regex = Regex::new(
        r"(?i)^\s*(hi|hello|hey|gm|yo|good (?:morning|afternoon|evening)|help|what can you do|who are you)(?:\s+there)?\s*[!?.]*\s*$"
    )
    .expect("greeting pattern compiles");

    static ref ADDRESS_PATTERN: Regex =
        Regex::new(r"0x[0-9a-fA-F]{40}").expect("address pattern compiles");
}

/// Outcome of mode selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeDecision {
    pub mode: ExecutionMode,
    pub requires_user_choice: bool,
    pub suggested_mode: ExecutionMode,
    pub clarifying_message: Option<String>,
}

impl ModeDecision {
    fn resolved(mode: ExecutionMode) -> Self {
        Self {
            mode,
            requires_user_choice: false,
            suggested_mode: mode,
            clarifying_message: None,
        }
    }

    fn ask_user(intent: &str) -> Self {
        Self {
            mode: ExecutionMode::Auto,
            requires_user_choice: true,
            suggested_mode: ExecutionMode::Execution,
            clarifying_message: Some(format!(
                "I can handle \"{}\" in two ways:\n\
                 - execution: act on it directly (balances, transfers, approvals)\n\
                 - planning: research the options and build a reviewed plan first\n\
                 Reply with your choice, or resend the message with a mode.",
                intent.trim()
            )),
        }
    }
}

/// Mode selector
pub struct ModeSelector;

impl ModeSelector {
    /// Select a mode for `intent`. A non-auto `requested` mode wins outright.
    pub fn select(intent: &str, requested: ExecutionMode) -> ModeDecision {
        if !requested.is_auto() {
            return ModeDecision::resolved(requested);
        }

        if EXECUTION_PATTERNS.is_match(intent) {
            ModeDecision::resolved(ExecutionMode::Execution)
        } else if PLANNING_PATTERNS.is_match(intent) {
            ModeDecision::resolved(ExecutionMode::Planning)
        } else if AMBIGUOUS_PATTERNS.is_match(intent) {
            ModeDecision::ask_user(intent)
        } else {
            ModeDecision::resolved(ExecutionMode::Planning)
        }
    }

    /// Greeting or help request that needs no agent at all
    pub fn is_greeting(message: &str) -> bool {
        GREETING_PATTERN.is_match(message)
    }
}

/// First full-length EVM address in `text`
pub fn find_address(text: &str) -> Option<&str> {
    ADDRESS_PATTERN.find(text).map(|m| m.as_str())
}
