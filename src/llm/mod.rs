//! LLM client module for interacting with language models.
//!
//! This module provides a trait-based abstraction over model backends, with
//! Ollama as the primary implementation. Responses arrive as a lazy, finite
//! stream of text fragments; reasoning models wrap their intermediate
//! reasoning in the [`THINK_START`] / [`THINK_END`] sentinel fragments.

mod error;
mod ollama;
#[cfg(test)]
pub(crate) mod scripted;

pub use error::{classify_http_status, LlmError, LlmErrorKind};
pub use ollama::{normalize_base_url, OllamaClient, DEFAULT_OLLAMA_URL};

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::tools::ToolRegistry;

/// Fragment that opens a thinking span.
pub const THINK_START: &str = "<think>";

/// Fragment that closes a thinking span.
pub const THINK_END: &str = "</think>";

/// Ordered, non-restartable sequence of response fragments.
pub type FragmentStream = BoxStream<'static, Result<String, LlmError>>;

/// Role in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Name of the tool whose output this message carries (role `tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    /// Create a simple text message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    /// Assistant turn that requested tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_name: None,
        }
    }

    /// Result of running a tool, fed back to the model.
    pub fn tool_result(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Tool,
            content: output.into(),
            tool_calls: Vec::new(),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

/// Function call details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments object. Missing for no-argument functions.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool definition for the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

/// Function definition with schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A model offered by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }
}

/// One model round trip: system instruction, user prompt, optional tools and
/// an optional JSON schema the answer must conform to.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub prompt: String,
    pub tools: Option<Arc<ToolRegistry>>,
    pub format: Option<serde_json::Value>,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            tools: None,
            format: None,
        }
    }

    /// Offer tools the model may call mid-generation.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Constrain the answer to a JSON schema.
    pub fn with_format(mut self, schema: serde_json::Value) -> Self {
        self.format = Some(schema);
        self
    }
}

/// Pick a model from the backend's list.
///
/// Names are sorted; the first containing `preferred` wins, otherwise the
/// first name overall. Returns `None` for an empty list.
pub fn select_model(models: &[ModelInfo], preferred: Option<&str>) -> Option<String> {
    let mut names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    names.sort_unstable();

    preferred
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .and_then(|p| names.iter().find(|n| n.contains(p)))
        .or_else(|| names.first())
        .map(|n| n.to_string())
}

/// Trait for model backends.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// List models the backend can serve.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;

    /// Submit a request and stream back the response fragments.
    ///
    /// Tool calls requested by the model are resolved inside the backend;
    /// callers only ever see text fragments.
    async fn chat_stream(
        &self,
        model: &str,
        request: ChatRequest,
    ) -> Result<FragmentStream, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(names: &[&str]) -> Vec<ModelInfo> {
        names.iter().map(|n| ModelInfo::new(*n)).collect()
    }

    #[test]
    fn test_select_model_prefers_match() {
        let list = models(&["mistral:7b", "qwq:32b", "llama3.3:70b"]);
        assert_eq!(select_model(&list, Some("qwq")), Some("qwq:32b".to_string()));
    }

    #[test]
    fn test_select_model_falls_back_to_first_sorted() {
        let list = models(&["mistral:7b", "llama3.3:70b"]);
        assert_eq!(
            select_model(&list, Some("qwq")),
            Some("llama3.3:70b".to_string())
        );
        assert_eq!(select_model(&list, None), Some("llama3.3:70b".to_string()));
        assert_eq!(select_model(&list, Some("  ")), Some("llama3.3:70b".to_string()));
    }

    #[test]
    fn test_select_model_empty() {
        assert_eq!(select_model(&[], Some("qwq")), None);
    }

    #[test]
    fn test_tool_result_message_shape() {
        let msg = ChatMessage::tool_result("get_location", "Vancouver");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_name"], "get_location");
        assert!(value.get("tool_calls").is_none());
    }

    #[test]
    fn test_tool_call_without_arguments_deserializes() {
        let call: ToolCall =
            serde_json::from_str(r#"{"function": {"name": "get_location"}}"#).unwrap();
        assert_eq!(call.function.name, "get_location");
        assert!(call.function.arguments.is_null());
    }
}
