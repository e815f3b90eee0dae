//! Error types for the wallet agent coordinator

use thiserror::Error;

/// Result type alias for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Error, Debug)]
pub enum CoordinatorError {

    // =============================
    // Malformed LLM Output
    // =============================

    #[error("No JSON object found in model response")]
    NoJsonFound,

    #[error("Malformed JSON in model response: {0}")]
    MalformedJson(String),

    #[error("Invalid plan structure: {0}")]
    InvalidPlanStructure(String),

    #[error("Research parse failed: {0}")]
    ResearchParseFailed(String),

    #[error("Judge parse failed: {0}")]
    JudgeParseFailed(String),

    #[error("Wallet action parse failed: {0}")]
    ActionParseFailed(String),

    // =============================
    // Collaborator Transport Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Wallet error: {0}")]
    WalletError(String),

    #[error("{0} timed out after {1}s")]
    Timeout(&'static str, u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CoordinatorError {
    /// True for errors raised while reading structured output from a model.
    pub fn is_malformed_output(&self) -> bool {
        matches!(
            self,
            Self::NoJsonFound
                | Self::MalformedJson(_)
                | Self::InvalidPlanStructure(_)
                | Self::ResearchParseFailed(_)
                | Self::JudgeParseFailed(_)
                | Self::ActionParseFailed(_)
        )
    }
}
