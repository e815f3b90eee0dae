//! Planner trait and implementations
//!
//! The planner turns a user intent into a structured, validated plan.
//! On revision it receives the previous judgement as feedback.

use crate::models::{Judgement, Plan, Preferences, Step, StepType};
use crate::Result;
use async_trait::async_trait;

pub mod llm;
pub use llm::LlmPlanner;

/// Trait for plan generation (LLM controlled)
#[async_trait]
pub trait Planner: Send + Sync {
    /// Create a plan, optionally revising against the previous judgement
    async fn generate(
        &self,
        intent: &str,
        preferences: &Preferences,
        feedback: Option<&Judgement>,
    ) -> Result<Plan>;
}

/// Mock planner for development & testing
/// Keeps system functional without LLM dependency
pub struct MockPlanner;

#[async_trait]
impl Planner for MockPlanner {
    async fn generate(
        &self,
        intent: &str,
        _preferences: &Preferences,
        feedback: Option<&Judgement>,
    ) -> Result<Plan> {
        let mut constraints = vec!["Never move more than the stated amount".to_string()];
        if let Some(judgement) = feedback {
            constraints.extend(judgement.improvement_suggestions.iter().cloned());
        }

        Ok(Plan {
            goal: intent.to_string(),
            constraints,
            steps: vec![
                Step {
                    step_number: 1,
                    title: "Gather market context".to_string(),
                    step_type: StepType::Research,
                    description: format!("Research conditions relevant to: {}", intent),
                    expected_outcome: "Current prices, fees and risks".to_string(),
                },
                Step {
                    step_number: 2,
                    title: "Assess options".to_string(),
                    step_type: StepType::Analysis,
                    description: "Compare approaches by cost and risk".to_string(),
                    expected_outcome: "Recommended approach".to_string(),
                },
            ],
            estimated_timeline: "1 week".to_string(),
            success_metrics: vec!["User understands the recommended approach".to_string()],
        })
    }
}
