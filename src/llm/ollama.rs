//! Ollama API client: model discovery and streaming chat.
//!
//! `/api/chat` streams newline-delimited JSON chunks. Each chunk carries a
//! piece of the assistant message (`content`, optionally `thinking`) and, for
//! tool-capable models, complete `tool_calls`. Tool calls are executed here
//! against the request's [`ToolRegistry`] and the conversation is re-submitted
//! until the model answers without calling a tool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::LlmError;
use super::{
    ChatMessage, ChatRequest, FragmentStream, LlmClient, ModelInfo, Role, ToolCall,
    ToolDefinition, THINK_END, THINK_START,
};
use crate::config::Config;
use crate::tools::ToolRegistry;
use crate::util::truncate_for_log;

/// Endpoint used when nothing is configured.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const DEFAULT_PORT: u16 = 11434;
const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// Normalize a machine name or partial URL into an Ollama base URL.
///
/// - Empty input maps to [`DEFAULT_OLLAMA_URL`]
/// - `http://` is prepended when no scheme is given
/// - The default port is appended to plain `http` hosts that have none
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_OLLAMA_URL.to_string();
    }

    let url = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    let (scheme, rest) = url.split_once("://").unwrap_or(("http", url.as_str()));
    let (host, path) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };

    // An https endpoint is usually a TLS proxy on its own port.
    if host.contains(':') || scheme != "http" {
        format!("{}://{}{}", scheme, host, path)
    } else {
        format!("{}://{}:{}{}", scheme, host, DEFAULT_PORT, path)
    }
}

/// Ollama HTTP client.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
    max_tool_rounds: usize,
}

impl OllamaClient {
    /// Create a client with default HTTP settings.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            client: Client::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    /// Create a client from configuration (endpoint, timeout, tool rounds).
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LlmError::network_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: normalize_base_url(&config.ollama_url),
            client,
            max_tool_rounds: config.max_tool_rounds,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the server answers at all.
    pub async fn is_running(&self) -> bool {
        match self.client.get(&self.base_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %self.base_url, error = %e, "Ollama liveness check failed");
                false
            }
        }
    }

    /// POST `/api/chat` and return the streaming response on success.
    async fn post_chat(&self, body: &WireChatRequest) -> Result<reqwest::Response, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), text));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        let parsed: WireTags = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!(
                "Failed to parse model list: {}, body: {}",
                e,
                truncate_for_log(&body, 500)
            ))
        })?;
        Ok(parsed.models)
    }

    async fn chat_stream(
        &self,
        model: &str,
        request: ChatRequest,
    ) -> Result<FragmentStream, LlmError> {
        let messages = vec![
            ChatMessage::new(Role::System, request.system),
            ChatMessage::new(Role::User, request.prompt),
        ];
        let tool_defs = request
            .tools
            .as_ref()
            .map(|t| t.get_tool_schemas())
            .unwrap_or_default();
        let conversation = Conversation {
            client: self.clone(),
            model: model.to_string(),
            messages,
            tools: request.tools,
            tool_defs,
            format: request.format,
        };

        // The first request is issued eagerly so connection and HTTP errors
        // surface from this call rather than from the first poll.
        let first = conversation.client.post_chat(&conversation.wire_request()).await?;

        let stream: FragmentStream = Box::pin(conversation.into_fragments(first));
        Ok(stream)
    }
}

/// State of one chat request across tool round trips.
struct Conversation {
    client: OllamaClient,
    model: String,
    messages: Vec<ChatMessage>,
    tools: Option<Arc<ToolRegistry>>,
    tool_defs: Vec<ToolDefinition>,
    format: Option<Value>,
}

impl Conversation {
    fn wire_request(&self) -> WireChatRequest {
        WireChatRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            stream: true,
            tools: self.tool_defs.clone(),
            format: self.format.clone(),
        }
    }

    /// Stream fragments of `first`, then of every follow-up request needed to
    /// answer the model's tool calls.
    fn into_fragments(
        mut self,
        first: reqwest::Response,
    ) -> impl Stream<Item = Result<String, LlmError>> + Send + 'static {
        async_stream::try_stream! {
            let mut response = first;
            let mut rounds = 0usize;

            loop {
                let mut decoder = NdjsonDecoder::default();
                let mut turn = TurnState::new(self.tools.is_some());
                let mut body = response.bytes_stream();

                while let Some(bytes) = body.next().await {
                    let bytes = bytes?;
                    for chunk in decoder.push(&bytes)? {
                        for fragment in turn.absorb(chunk)? {
                            yield fragment;
                        }
                    }
                }
                if let Some(chunk) = decoder.finish()? {
                    for fragment in turn.absorb(chunk)? {
                        yield fragment;
                    }
                }
                if let Some(fragment) = turn.close_thinking() {
                    yield fragment;
                }

                if turn.tool_calls.is_empty() {
                    if let Some(answer) = turn.release_content() {
                        yield answer;
                    }
                    break;
                }

                rounds += 1;
                let registry = check_tool_round(self.tools.clone(), rounds, self.client.max_tool_rounds)?;

                self.messages.push(ChatMessage::assistant_tool_calls(
                    std::mem::take(&mut turn.content),
                    turn.tool_calls.clone(),
                ));
                for call in &turn.tool_calls {
                    let name = &call.function.name;
                    tracing::info!(tool = %name, args = %call.function.arguments, "model called tool");
                    let output = match registry.execute(name, call.function.arguments.clone()).await {
                        Ok(output) => output,
                        Err(e) => {
                            tracing::warn!(tool = %name, error = %e, "tool call failed");
                            format!("Error: {}", e)
                        }
                    };
                    tracing::debug!(tool = %name, output = %truncate_for_log(&output, 200), "tool result");
                    self.messages.push(ChatMessage::tool_result(name.clone(), output));
                }

                response = self.client.post_chat(&self.wire_request()).await?;
            }
        }
    }
}

/// Check that another tool round is allowed and tools were offered.
fn check_tool_round(
    tools: Option<Arc<ToolRegistry>>,
    rounds: usize,
    max_rounds: usize,
) -> Result<Arc<ToolRegistry>, LlmError> {
    if rounds > max_rounds {
        return Err(LlmError::tool_error(format!(
            "Model kept calling tools after {} rounds",
            max_rounds
        )));
    }
    tools.ok_or_else(|| {
        LlmError::tool_error("Model requested a tool call but no tools were offered".to_string())
    })
}

/// Per-turn accumulation of streamed chunks.
///
/// When tools are offered, answer text is held back until the turn ends: text
/// written alongside a tool call belongs to the conversation, not the answer.
#[derive(Debug, Default)]
struct TurnState {
    /// Inside a `thinking` field run, so the closing sentinel is still owed.
    in_thinking: bool,
    buffer_content: bool,
    content: String,
    tool_calls: Vec<ToolCall>,
}

impl TurnState {
    fn new(buffer_content: bool) -> Self {
        Self {
            buffer_content,
            ..Self::default()
        }
    }

    /// Held-back answer text of a turn that ended without tool calls.
    fn release_content(&mut self) -> Option<String> {
        if !self.buffer_content || !self.tool_calls.is_empty() || self.content.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.content))
    }

    /// Convert one chunk into fragments, recording tool calls and content.
    ///
    /// A separate `thinking` field is wrapped in the sentinel fragments so
    /// downstream collectors see one convention.
    fn absorb(&mut self, chunk: WireChunk) -> Result<Vec<String>, LlmError> {
        if let Some(error) = chunk.error {
            return Err(LlmError::server_error(500, error));
        }

        let mut fragments = Vec::new();
        let Some(message) = chunk.message else {
            return Ok(fragments);
        };

        if let Some(thinking) = message.thinking.filter(|t| !t.is_empty()) {
            if !self.in_thinking {
                self.in_thinking = true;
                fragments.push(THINK_START.to_string());
            }
            fragments.push(thinking);
        }

        if !message.content.is_empty() {
            fragments.extend(self.close_thinking());
            self.content.push_str(&message.content);
            if !self.buffer_content {
                fragments.push(message.content);
            }
        }

        self.tool_calls.extend(message.tool_calls);
        Ok(fragments)
    }

    fn close_thinking(&mut self) -> Option<String> {
        if self.in_thinking {
            self.in_thinking = false;
            Some(THINK_END.to_string())
        } else {
            None
        }
    }
}

/// Splits a byte stream into JSON lines.
#[derive(Debug, Default)]
struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feed bytes, returning every chunk completed by a newline.
    fn push(&mut self, bytes: &[u8]) -> Result<Vec<WireChunk>, LlmError> {
        self.buf.extend_from_slice(bytes);
        let mut chunks = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(chunk) = parse_line(&line)? {
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }

    /// Parse whatever remains after the body ends without a final newline.
    fn finish(&mut self) -> Result<Option<WireChunk>, LlmError> {
        let rest = std::mem::take(&mut self.buf);
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<WireChunk>, LlmError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text).map(Some).map_err(|e| {
        LlmError::parse_error(format!(
            "Invalid stream chunk: {}, line: {}",
            e,
            truncate_for_log(text, 200)
        ))
    })
}

#[derive(Debug, Serialize)]
struct WireChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct WireChunk {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireTags {
    #[serde(default)]
    models: Vec<ModelInfo>,
}
