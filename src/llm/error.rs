//! Errors from the model-interaction layer.
//!
//! Failures are surfaced to the caller unmodified; nothing here retries.

use std::fmt;

/// Classification of model errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx, or an `error` field inside the response stream
    ServerError,
    /// HTTP 4xx other than 429, e.g. an unknown model name
    ClientError,
    /// Connection refused, timeout, broken body
    NetworkError,
    /// Model list or stream chunk was not valid JSON
    ParseError,
    /// Tool round trip failed (no tools offered, too many rounds)
    ToolError,
}

impl LlmErrorKind {
    fn label(self) -> &'static str {
        match self {
            Self::RateLimited => "Rate limited",
            Self::ServerError => "Server error",
            Self::ClientError => "Client error",
            Self::NetworkError => "Network error",
            Self::ParseError => "Parse error",
            Self::ToolError => "Tool error",
        }
    }
}

impl fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a non-success HTTP status to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

/// Error from a model backend call.
#[derive(Debug)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// HTTP status, when the failure came from a response
    pub status_code: Option<u16>,
    pub message: String,
}

impl LlmError {
    fn new(kind: LlmErrorKind, status_code: Option<u16>, message: String) -> Self {
        Self {
            kind,
            status_code,
            message,
        }
    }

    pub fn server_error(status_code: u16, message: String) -> Self {
        Self::new(LlmErrorKind::ServerError, Some(status_code), message)
    }

    pub fn network_error(message: String) -> Self {
        Self::new(LlmErrorKind::NetworkError, None, message)
    }

    pub fn parse_error(message: String) -> Self {
        Self::new(LlmErrorKind::ParseError, None, message)
    }

    pub fn tool_error(message: String) -> Self {
        Self::new(LlmErrorKind::ToolError, None, message)
    }

    /// Build an error from a non-success HTTP status and its response body.
    pub fn from_status(status_code: u16, body: String) -> Self {
        Self::new(classify_http_status(status_code), Some(status_code), body)
    }
}

impl fmt::Display for LlmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        let status = e.status().map(|s| s.as_u16());
        if e.is_timeout() {
            Self::network_error(format!("Ollama request timed out: {}", e))
        } else if e.is_connect() {
            Self::network_error(format!("Could not connect to Ollama: {}", e))
        } else if e.is_decode() {
            Self::parse_error(format!("Could not decode Ollama response: {}", e))
        } else if let Some(code) = status {
            Self::from_status(code, e.to_string())
        } else {
            Self::network_error(format!("Ollama request failed: {}", e))
        }
    }
}
