//! Gemini API client
//!
//! Uses a long-lived reqwest::Client for connection pooling. The think and
//! research endpoints are two instances with different models and system
//! prompts.

use crate::error::CoordinatorError;
use crate::llm::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const THINK_SYSTEM_PROMPT: &str = r#"You are the reasoning engine of a crypto wallet assistant.

Guidelines:
- Follow the requested JSON response format exactly
- Be conservative with user funds
- Never invent addresses, balances or transaction hashes"#;

const RESEARCH_SYSTEM_PROMPT: &str = r#"You are a blockchain and DeFi research analyst.

Guidelines:
- Ground findings in verifiable sources
- Flag protocol, liquidity and counterparty risks
- Follow the requested JSON response format exactly"#;

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    system_prompt: &'static str,
    temperature: f32,
    label: String,
}

impl GeminiClient {
    fn build(
        api_key: String,
        model: String,
        system_prompt: &'static str,
        temperature: f32,
        role: &str,
    ) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        let label = format!("{}:{}", role, model);

        Ok(Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            model,
            system_prompt,
            temperature,
            label,
        })
    }

    /// Client for planning, judging, extraction and safety prompts
    pub fn think(api_key: String, model: String) -> crate::Result<Self> {
        Self::build(api_key, model, THINK_SYSTEM_PROMPT, 0.2, "think")
    }

    /// Client for research prompts
    pub fn research(api_key: String, model: String) -> crate::Result<Self> {
        Self::build(api_key, model, RESEARCH_SYSTEM_PROMPT, 0.4, "research")
    }

    /// The key travels in the `x-goog-api-key` header, never in the URL.
    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, prompt: &str) -> crate::Result<String> {
        if self.api_key.is_empty() {
            return Err(CoordinatorError::LlmError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: self.system_prompt.to_string(),
                }],
            },
        };

        debug!(model = %self.label, prompt_len = prompt.len(), "Calling Gemini API");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                error!(model = %self.label, "Gemini API request failed: {}", e);
                CoordinatorError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!(model = %self.label, %status, "Gemini API error response: {}", error_text);
            return Err(CoordinatorError::LlmError(format!(
                "Gemini API returned {}: {}",
                status, error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            let e = e.without_url();
            error!(model = %self.label, "Failed to parse Gemini response: {}", e);
            CoordinatorError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response.first_text().ok_or_else(|| {
            CoordinatorError::LlmError("Empty response from Gemini".to_string())
        })?;

        debug!(
            model = %self.label,
            finish_reason = ?gemini_response.candidates.first().and_then(|c| c.finish_reason.as_deref()),
            response_len = answer.len(),
            "Gemini response received"
        );

        Ok(answer)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    system_instruction: SystemInstruction,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

impl GeminiResponse {
    /// Concatenated text of the first candidate, if it has any.
    fn first_text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "Plan an ETH accumulation".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 2048,
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: THINK_SYSTEM_PROMPT.to_string(),
                }],
            },
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Plan an ETH accumulation"));
        assert!(json.contains("generationConfig"));
        assert!(json.contains("maxOutputTokens"));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": " 1}" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        assert_eq!(response.first_text().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_empty_candidates_have_no_text() {
        let response: GeminiResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        assert!(response.first_text().is_none());
    }

    #[tokio::test]
    async fn test_missing_key_is_llm_error() {
        let client = GeminiClient::think(String::new(), "gemini-2.0-flash".into()).unwrap();
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::LlmError(_)));
        assert_eq!(client.name(), "think:gemini-2.0-flash");
    }

    #[test]
    fn test_endpoint_carries_no_key() {
        let client = GeminiClient::think("SECRETKEY123".into(), "gemini-2.0-flash".into()).unwrap();
        let endpoint = client.endpoint();
        assert!(endpoint.ends_with("/gemini-2.0-flash:generateContent"));
        assert!(!endpoint.contains("SECRETKEY123"));
    }

    #[tokio::test]
    async fn test_transport_error_does_not_leak_key() {
        let mut client =
            GeminiClient::research("SECRETKEY123".into(), "gemini-2.0-flash".into()).unwrap();
        // nothing listens on port 1
        client.base_url = "http://127.0.0.1:1/v1beta/models".to_string();

        let err = client.complete("hi").await.unwrap_err();

        assert!(matches!(err, CoordinatorError::LlmError(_)));
        assert!(!err.to_string().contains("SECRETKEY123"));
        assert!(!err.to_string().contains("127.0.0.1"));
    }
}
