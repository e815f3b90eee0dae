//! Runtime configuration loaded from the environment (and `.env`)

use crate::error::CoordinatorError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;
const DEFAULT_EXPLORER: &str = "https://etherscan.io";

#[derive(Debug, Clone)]
pub struct Config {
    /// Empty when unset; the binaries fall back to offline agents
    pub gemini_api_key: String,
    pub think_model: String,
    pub research_model: String,
    pub port: u16,
    /// Bound on every collaborator call
    pub call_timeout: Duration,
    /// Idle sessions and finished jobs older than this are purged
    pub session_ttl: Duration,
    pub wallet_api_base_url: Option<String>,
    pub explorer_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            think_model: DEFAULT_MODEL.to_string(),
            research_model: DEFAULT_MODEL.to_string(),
            port: DEFAULT_PORT,
            call_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            wallet_api_base_url: None,
            explorer_base_url: DEFAULT_EXPLORER.to_string(),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read configuration from the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT").or_else(|| get("API_PORT")) {
            Some(raw) => parse_number("PORT", &raw)?,
            None => defaults.port,
        };

        let call_timeout = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("LLM_TIMEOUT_SECS", &raw)?),
            None => defaults.call_timeout,
        };

        let session_ttl = match get("SESSION_TTL_SECS") {
            Some(raw) => Duration::from_secs(parse_number("SESSION_TTL_SECS", &raw)?),
            None => defaults.session_ttl,
        };

        if call_timeout.is_zero() {
            return Err(CoordinatorError::ConfigError(
                "LLM_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            think_model: get("THINK_MODEL").unwrap_or(defaults.think_model),
            research_model: get("RESEARCH_MODEL").unwrap_or(defaults.research_model),
            port,
            call_timeout,
            session_ttl,
            wallet_api_base_url: get("WALLET_API_BASE_URL"),
            explorer_base_url: get("EXPLORER_BASE_URL").unwrap_or(defaults.explorer_base_url),
        })
    }

    pub fn has_llm(&self) -> bool {
        !self.gemini_api_key.is_empty()
    }
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| CoordinatorError::ConfigError(format!("{}={:?}: {}", key, raw, e)))
}
