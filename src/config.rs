//! Configuration management for stepwise.
//!
//! Configuration can be set via environment variables:
//! - `OLLAMA_URL` - Optional. Ollama endpoint or machine name. Defaults to `http://localhost:11434`.
//! - `STEPWISE_MODEL` - Optional. Preferred model name (substring match).
//! - `STEPWISE_LOCATION` - Optional. Location reported by the `get_location` tool.
//! - `STEPWISE_REQUEST_TIMEOUT_SECS` - Optional. Timeout per model request. Defaults to `300`.
//! - `STEPWISE_MAX_TOOL_ROUNDS` - Optional. Tool round trips per model call. Defaults to `8`.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::llm::{normalize_base_url, DEFAULT_OLLAMA_URL};

const DEFAULT_LOCATION: &str = "Vancouver, BC, Canada";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Normalized Ollama base URL
    pub ollama_url: String,

    /// Preferred model (substring of the model name)
    pub preferred_model: Option<String>,

    /// Value returned by the location tool
    pub location: String,

    /// Timeout for a single model request, including the streamed body
    pub request_timeout: Duration,

    /// Maximum tool round trips within one model call
    pub max_tool_rounds: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ollama_url = std::env::var("OLLAMA_URL")
            .map(|u| normalize_base_url(&u))
            .unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());

        let preferred_model = std::env::var("STEPWISE_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let location =
            std::env::var("STEPWISE_LOCATION").unwrap_or_else(|_| DEFAULT_LOCATION.to_string());

        let timeout_secs: u64 = env_parse("STEPWISE_REQUEST_TIMEOUT_SECS", 300)?;
        let max_tool_rounds = env_parse("STEPWISE_MAX_TOOL_ROUNDS", 8)?;

        Ok(Self {
            ollama_url,
            preferred_model,
            location,
            request_timeout: Duration::from_secs(timeout_secs),
            max_tool_rounds,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(ollama_url: &str) -> Self {
        Self {
            ollama_url: normalize_base_url(ollama_url),
            preferred_model: None,
            location: DEFAULT_LOCATION.to_string(),
            request_timeout: Duration::from_secs(300),
            max_tool_rounds: 8,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
