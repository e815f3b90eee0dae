//! Language model boundary
//!
//! The coordinator consumes two completion endpoints: `think` (planning,
//! judging, extraction, safety) and `research`. Both are plain
//! prompt-in, text-out calls behind [`LanguageModel`].

use crate::error::CoordinatorError;
use crate::Result;
use async_trait::async_trait;

pub mod gemini;
pub use gemini::GeminiClient;

/// Single free-form completion call
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short label used in logs
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Stand-in for a model that was never configured.
///
/// Every call fails, so anything gated on it fails closed.
pub struct UnconfiguredModel {
    role: &'static str,
}

impl UnconfiguredModel {
    pub fn new(role: &'static str) -> Self {
        Self { role }
    }
}

#[async_trait]
impl LanguageModel for UnconfiguredModel {
    fn name(&self) -> &str {
        self.role
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(CoordinatorError::LlmError(format!(
            "no {} model configured",
            self.role
        )))
    }
}
