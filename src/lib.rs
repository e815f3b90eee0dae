//! Wallet Agent Coordinator
//!
//! Routes natural-language wallet requests either to a direct wallet call or
//! through a bounded multi-agent review loop:
//! - Mode selection: execution, planning, or ask the user
//! - Planner, researcher and judge backed by language models
//! - At most three revision cycles per message
//! - Approved plans reduced to a typed wallet action
//! - Fail-closed safety review before anything reaches the wallet
//!
//! REVISION LOOP:
//! PLAN → RESEARCH → JUDGE → REVISE? → EXTRACT → SAFETY → EXECUTE

pub mod agent;
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod jobs;
pub mod json;
pub mod judge;
pub mod llm;
pub mod mode;
pub mod models;
pub mod planner;
pub mod research;
pub mod session;
pub mod wallet;

#[cfg(test)]
mod test_support;

pub use error::Result;

// Re-export common types
pub use agent::{Coordinator, MAX_CYCLES};
pub use mode::{ModeDecision, ModeSelector};
pub use models::*;
