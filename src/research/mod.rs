//! Research agent
//!
//! Gathers findings about the current plan from the research model. Output
//! only has to parse; any failure aborts the cycle.

use crate::error::CoordinatorError;
use crate::json::parse_first_object;
use crate::llm::LanguageModel;
use crate::models::{Finding, Plan, Research};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, intent: &str, plan: &Plan) -> Result<Research>;
}

pub struct LlmResearcher {
    model: Arc<dyn LanguageModel>,
}

impl LlmResearcher {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn build_prompt(intent: &str, plan: &Plan) -> String {
        let steps = plan
            .steps
            .iter()
            .map(|s| format!("{}. [{:?}] {} - {}", s.step_number, s.step_type, s.title, s.description))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"Research the following plan for a crypto wallet user.

USER INTENT:
{}

PLAN GOAL:
{}

CONSTRAINTS:
{}

STEPS:
{}

Investigate market conditions, protocol risks, fees and anything that affects
whether this plan is sound. Return ONLY valid JSON:

{{
  "findings": [
    {{
      "topic": "...",
      "summary": "...",
      "relevanceScore": 0.0,
      "sources": ["..."]
    }}
  ],
  "overallAssessment": "..."
}}
"#,
            intent,
            plan.goal,
            plan.constraints.join("; "),
            steps,
        )
    }
}

#[async_trait]
impl Researcher for LlmResearcher {
    async fn research(&self, intent: &str, plan: &Plan) -> Result<Research> {
        let prompt = Self::build_prompt(intent, plan);

        let response = self.model.complete(&prompt).await?;

        let json = parse_first_object(&response)
            .map_err(|e| CoordinatorError::ResearchParseFailed(e.to_string()))?;

        let research: Research = serde_json::from_value(json)
            .map_err(|e| CoordinatorError::ResearchParseFailed(e.to_string()))?;

        debug!(
            model = self.model.name(),
            findings = research.findings.len(),
            "Research completed"
        );

        Ok(research)
    }
}

/// Offline researcher for development runs
pub struct MockResearcher;

#[async_trait]
impl Researcher for MockResearcher {
    async fn research(&self, _intent: &str, plan: &Plan) -> Result<Research> {
        Ok(Research {
            findings: plan
                .steps
                .iter()
                .map(|step| Finding {
                    topic: step.title.clone(),
                    summary: format!("No blocking issues found for: {}", step.description),
                    relevance_score: 0.5,
                    sources: vec![],
                })
                .collect(),
            overall_assessment: "Plan appears feasible (offline research)".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepType;
    use crate::test_support::{sample_plan, step, ScriptedModel};

    #[tokio::test]
    async fn test_research_parses_findings() {
        let model = Arc::new(ScriptedModel::new([r#"Findings below.
{"findings": [{"topic": "Fees", "summary": "L2 fees are low", "relevanceScore": 0.9, "sources": ["l2fees.info"]}],
 "overallAssessment": "Proceed on an L2"}"#]));
        let researcher = LlmResearcher::new(model.clone());
        let plan = sample_plan(vec![step(1, StepType::Research, "Compare L2 fees")]);

        let research = researcher.research("Bridge to L2", &plan).await.unwrap();
        assert_eq!(research.findings.len(), 1);
        assert_eq!(research.findings[0].relevance_score, 0.9);
        assert_eq!(research.overall_assessment, "Proceed on an L2");
        assert!(model.prompt(0).contains("Compare L2 fees"));
    }

    #[tokio::test]
    async fn test_missing_fields_default() {
        let model = Arc::new(ScriptedModel::new([r#"{"overallAssessment": "Nothing found"}"#]));
        let researcher = LlmResearcher::new(model);
        let plan = sample_plan(vec![step(1, StepType::Analysis, "Think")]);

        let research = researcher.research("x", &plan).await.unwrap();
        assert!(research.findings.is_empty());
    }

    #[tokio::test]
    async fn test_plain_text_is_research_parse_failure() {
        let model = Arc::new(ScriptedModel::new(["The market looks fine."]));
        let researcher = LlmResearcher::new(model);
        let plan = sample_plan(vec![step(1, StepType::Research, "Look")]);

        let err = researcher.research("x", &plan).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::ResearchParseFailed(_)));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let model = Arc::new(ScriptedModel::failing("503 from provider"));
        let researcher = LlmResearcher::new(model);
        let plan = sample_plan(vec![step(1, StepType::Research, "Look")]);

        let err = researcher.research("x", &plan).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::LlmError(_)));
    }
}
