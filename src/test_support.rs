//! Scripted collaborators shared by unit tests

use crate::error::CoordinatorError;
use crate::llm::LanguageModel;
use crate::models::{
    Decision, Finding, Judgement, Plan, Research, RiskAssessment, Step, StepType, WalletAction,
    WalletOutcome,
};
use crate::wallet::WalletExecutor;
use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Model that replays a fixed list of responses and records every prompt.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<std::result::Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Model whose next call fails with a transport error.
    pub fn failing(message: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(message.to_string())])),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompt(&self, index: usize) -> String {
        self.prompts.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(CoordinatorError::LlmError(message)),
            None => Err(CoordinatorError::LlmError("script exhausted".to_string())),
        }
    }
}

/// Wallet executor that returns a fixed outcome and counts calls.
pub struct StubWallet {
    outcome: WalletOutcome,
    pub executed: Mutex<Vec<WalletAction>>,
    pub created: AtomicUsize,
}

impl StubWallet {
    pub fn new(outcome: WalletOutcome) -> Self {
        Self {
            outcome,
            executed: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        }
    }

    pub fn with_balances() -> Self {
        let mut balances = BTreeMap::new();
        balances.insert("ETH".to_string(), "1.25".to_string());
        balances.insert("USDC".to_string(), "420.00".to_string());
        Self::new(WalletOutcome {
            success: true,
            message: "Balance retrieved".to_string(),
            address: Some("0x1111111111111111111111111111111111111111".to_string()),
            balances: Some(balances),
            ..Default::default()
        })
    }

    pub fn execute_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

#[async_trait]
impl WalletExecutor for StubWallet {
    async fn execute(&self, action: &WalletAction) -> Result<WalletOutcome> {
        self.executed.lock().unwrap().push(action.clone());
        Ok(self.outcome.clone())
    }

    async fn create_wallet(&self) -> Result<WalletOutcome> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(WalletOutcome {
            success: true,
            message: "Wallet created".to_string(),
            address: Some("0x2222222222222222222222222222222222222222".to_string()),
            ..Default::default()
        })
    }
}

pub fn step(number: u32, step_type: StepType, description: &str) -> Step {
    Step {
        step_number: number,
        title: format!("Step {}", number),
        step_type,
        description: description.to_string(),
        expected_outcome: "Done".to_string(),
    }
}

pub fn sample_plan(steps: Vec<Step>) -> Plan {
    Plan {
        goal: "Move funds safely".to_string(),
        constraints: vec!["Keep gas under $5".to_string()],
        steps,
        estimated_timeline: "1 day".to_string(),
        success_metrics: vec!["Funds delivered".to_string()],
    }
}

pub fn sample_research() -> Research {
    Research {
        findings: vec![Finding {
            topic: "Gas".to_string(),
            summary: "Gas is low on weekends".to_string(),
            relevance_score: 0.8,
            sources: vec!["https://etherscan.io/gastracker".to_string()],
        }],
        overall_assessment: "Feasible".to_string(),
    }
}

pub fn judgement(decision: Decision) -> Judgement {
    Judgement {
        decision,
        reasoning: format!("{:?}", decision),
        risk_assessment: RiskAssessment::default(),
        improvement_suggestions: vec!["Add a stop condition".to_string()],
    }
}

pub fn plan_json() -> String {
    serde_json::json!({
        "goal": "Accumulate ETH",
        "constraints": ["Max $500 per week"],
        "steps": [
            {
                "stepNumber": 1,
                "title": "Check prices",
                "type": "research",
                "description": "Review ETH price history",
                "expectedOutcome": "Entry range"
            },
            {
                "stepNumber": 2,
                "title": "Buy",
                "type": "execution",
                "description": "Schedule weekly purchases",
                "expectedOutcome": "Position built"
            }
        ],
        "estimatedTimeline": "3 months",
        "successMetrics": ["Average entry below spot"]
    })
    .to_string()
}
