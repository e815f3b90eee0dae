//! LLM-backed planner
//!
//! Renders one planning prompt, calls the think model, and accepts the
//! response only if it is a structurally complete plan.

use crate::error::CoordinatorError;
use crate::json::parse_first_object;
use crate::llm::LanguageModel;
use crate::models::{Judgement, Plan, Preferences, Step, StepType};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct LlmPlanner {
    model: Arc<dyn LanguageModel>,
}

impl LlmPlanner {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Build structured planning prompt
    fn build_prompt(intent: &str, preferences: &Preferences, feedback: Option<&Judgement>) -> String {
        let mut prompt = format!(
            r#"You are a planning engine for a crypto wallet assistant.

Create a concrete, executable plan for the user's intent.

USER INTENT:
{}
"#,
            intent
        );

        if !preferences.is_empty() {
            let rendered = serde_json::to_string_pretty(preferences)
                .unwrap_or_else(|_| Value::Object(preferences.clone()).to_string());
            prompt.push_str(&format!("\nUSER PREFERENCES:\n{}\n", rendered));
        }

        if let Some(judgement) = feedback {
            prompt.push_str(&format!(
                "\nThe previous plan was sent back for revision.\nREVIEWER FEEDBACK:\n{}\n",
                judgement.reasoning
            ));
            if !judgement.improvement_suggestions.is_empty() {
                prompt.push_str("\nIMPROVEMENT SUGGESTIONS:\n");
                for suggestion in &judgement.improvement_suggestions {
                    prompt.push_str(&format!("- {}\n", suggestion));
                }
            }
            prompt.push_str("\nGenerate a DIFFERENT, improved plan that addresses the feedback.\n");
        }

        prompt.push_str(
            r#"
Rules:
- Steps are numbered from 1 in order
- Step type is one of: research, analysis, execution
- Wallet operations (send, transfer, approve) must be "execution" steps naming
  the exact amount, token and recipient address
- Return ONLY valid JSON, no explanation text
- JSON format:

{
  "goal": "...",
  "constraints": ["..."],
  "steps": [
    {
      "stepNumber": 1,
      "title": "...",
      "type": "research",
      "description": "...",
      "expectedOutcome": "..."
    }
  ],
  "estimatedTimeline": "...",
  "successMetrics": ["..."]
}
"#,
        );

        prompt
    }
}

#[async_trait]
impl crate::planner::Planner for LlmPlanner {
    async fn generate(
        &self,
        intent: &str,
        preferences: &Preferences,
        feedback: Option<&Judgement>,
    ) -> Result<Plan> {
        let prompt = Self::build_prompt(intent, preferences, feedback);

        let response = self.model.complete(&prompt).await?;

        let json = parse_first_object(&response)?;
        let plan = validate_plan(&json)?;

        debug!(
            model = self.model.name(),
            step_count = plan.steps.len(),
            revision = feedback.is_some(),
            "Plan accepted"
        );

        Ok(plan)
    }
}

fn invalid(reason: impl Into<String>) -> CoordinatorError {
    CoordinatorError::InvalidPlanStructure(reason.into())
}

fn required_text(obj: &Value, field: &str, context: &str) -> Result<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("{}: missing or empty '{}'", context, field)))
}

fn string_list(obj: &Value, field: &str) -> Result<Vec<String>> {
    let items = obj
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(format!("'{}' is not a list", field)))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(format!("'{}' must contain only strings", field)))
        })
        .collect()
}

fn parse_step(index: usize, step_json: &Value) -> Result<Step> {
    let context = format!("step {}", index + 1);

    let step_number = step_json
        .get("stepNumber")
        .and_then(Value::as_u64)
        .filter(|n| *n >= 1 && *n <= u32::MAX as u64)
        .ok_or_else(|| invalid(format!("{}: missing or invalid 'stepNumber'", context)))?
        as u32;

    let step_type = match step_json.get("type").and_then(Value::as_str) {
        Some("research") => StepType::Research,
        Some("analysis") => StepType::Analysis,
        Some("execution") => StepType::Execution,
        Some(other) => return Err(invalid(format!("{}: unknown type '{}'", context, other))),
        None => return Err(invalid(format!("{}: missing 'type'", context))),
    };

    Ok(Step {
        step_number,
        title: required_text(step_json, "title", &context)?,
        step_type,
        description: required_text(step_json, "description", &context)?,
        expected_outcome: required_text(step_json, "expectedOutcome", &context)?,
    })
}

/// Validate a parsed plan object. A plan missing any required field is
/// rejected whole; partial plans are never returned.
pub fn validate_plan(json: &Value) -> Result<Plan> {
    if !json.is_object() {
        return Err(invalid("plan is not a JSON object"));
    }

    let goal = required_text(json, "goal", "plan")?;
    let constraints = string_list(json, "constraints")?;

    let steps_json = json
        .get("steps")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("'steps' is not a list"))?;

    if steps_json.is_empty() {
        return Err(invalid("plan has no steps"));
    }

    let mut steps = steps_json
        .iter()
        .enumerate()
        .map(|(i, s)| parse_step(i, s))
        .collect::<Result<Vec<_>>>()?;

    steps.sort_by_key(|s| s.step_number);

    if let Some((position, step)) = steps
        .iter()
        .enumerate()
        .find(|(i, s)| s.step_number as usize != i + 1)
    {
        return Err(invalid(format!(
            "step numbers must run 1..{} without gaps; found {} at position {}",
            steps.len(),
            step.step_number,
            position + 1
        )));
    }

    let estimated_timeline = required_text(json, "estimatedTimeline", "plan")?;

    let success_metrics = string_list(json, "successMetrics")?;
    if success_metrics.is_empty() {
        return Err(invalid("'successMetrics' is empty"));
    }

    Ok(Plan {
        goal,
        constraints,
        steps,
        estimated_timeline,
        success_metrics,
    })
}
