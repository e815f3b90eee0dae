//! Judge agent
//!
//! Reviews a plan against its research and decides whether it is approved,
//! rejected, or needs revision.

use crate::error::CoordinatorError;
use crate::json::parse_first_object;
use crate::llm::LanguageModel;
use crate::models::{Decision, Judgement, Plan, Preferences, Research, RiskAssessment};
use crate::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait Judge: Send + Sync {
    async fn judge(
        &self,
        intent: &str,
        preferences: &Preferences,
        plan: &Plan,
        research: &Research,
    ) -> Result<Judgement>;
}

pub struct LlmJudge {
    model: Arc<dyn LanguageModel>,
}

impl LlmJudge {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn build_prompt(
        intent: &str,
        preferences: &Preferences,
        plan: &Plan,
        research: &Research,
    ) -> String {
        let plan_json = serde_json::to_string_pretty(plan).unwrap_or_default();
        let findings = research
            .findings
            .iter()
            .map(|f| format!("- {} (relevance {:.2}): {}", f.topic, f.relevance_score, f.summary))
            .collect::<Vec<_>>()
            .join("\n");

        let preferences = if preferences.is_empty() {
            "none stated".to_string()
        } else {
            serde_json::to_string(preferences).unwrap_or_default()
        };

        format!(
            r#"You are the final reviewer for a crypto wallet assistant.

Decide whether the plan below safely and effectively serves the user's intent.

USER INTENT:
{}

USER PREFERENCES:
{}

PLAN:
{}

RESEARCH FINDINGS:
{}

OVERALL RESEARCH ASSESSMENT:
{}

Decision rules:
- "approved": the plan is sound and can be carried out as written
- "needs_revision": the plan is salvageable; list concrete improvements
- "rejected": the plan is fundamentally unsafe or does not serve the intent

Return ONLY valid JSON:

{{
  "decision": "approved" | "rejected" | "needs_revision",
  "reasoning": "...",
  "riskAssessment": {{
    "financial": "low" | "medium" | "high",
    "technical": "low" | "medium" | "high",
    "compliance": "low" | "medium" | "high"
  }},
  "improvementSuggestions": ["..."]
}}
"#,
            intent,
            preferences,
            plan_json,
            if findings.is_empty() { "(none)".to_string() } else { findings },
            research.overall_assessment,
        )
    }
}

#[async_trait]
impl Judge for LlmJudge {
    async fn judge(
        &self,
        intent: &str,
        preferences: &Preferences,
        plan: &Plan,
        research: &Research,
    ) -> Result<Judgement> {
        let prompt = Self::build_prompt(intent, preferences, plan, research);

        let response = self.model.complete(&prompt).await?;

        let json = parse_first_object(&response)
            .map_err(|e| CoordinatorError::JudgeParseFailed(e.to_string()))?;

        let judgement: Judgement = serde_json::from_value(json)
            .map_err(|e| CoordinatorError::JudgeParseFailed(e.to_string()))?;

        debug!(
            model = self.model.name(),
            decision = ?judgement.decision,
            financial_risk = %judgement.risk_assessment.financial,
            "Judgement received"
        );

        Ok(judgement)
    }
}

/// Offline judge for development runs: asks for one revision, then approves.
#[derive(Default)]
pub struct MockJudge {
    calls: AtomicUsize,
}

#[async_trait]
impl Judge for MockJudge {
    async fn judge(
        &self,
        _intent: &str,
        _preferences: &Preferences,
        plan: &Plan,
        _research: &Research,
    ) -> Result<Judgement> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        let (decision, reasoning, suggestions) = if call % 2 == 0 {
            (
                Decision::NeedsRevision,
                "Plan lacks an explicit exit condition".to_string(),
                vec!["Add a stop condition".to_string()],
            )
        } else {
            (
                Decision::Approved,
                format!("{} steps cover the goal", plan.steps.len()),
                vec![],
            )
        };

        Ok(Judgement {
            decision,
            reasoning,
            risk_assessment: RiskAssessment::default(),
            improvement_suggestions: suggestions,
        })
    }
}
