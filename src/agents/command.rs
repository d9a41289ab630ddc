//! Command dispatch for conversational turns.
//!
//! The model answers each turn with `{"command": ..., "data": ...}`. The
//! command is one of a closed set of kinds, each routed through a table to a
//! handler whose return value becomes the next message to the model.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::collector::collect;
use super::context::AgentContext;
use crate::llm::{ChatRequest, LlmError};
use crate::util::truncate_for_log;

const COMMAND_SYSTEM_PROMPT: &str = r#"You are a chat agent that works in turns. Every turn you reply with exactly one command and receive that command's result as your next message.

Available commands:
task ()                    gets the current task
say (text: string)         shows text to the user
search (query: string)     looks up information you do not know

Reply with JSON: {"command": string, "data": string}"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Task,
    Say,
    Search,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Say => "say",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" => Ok(Self::Task),
            "say" => Ok(Self::Say),
            "search" => Ok(Self::Search),
            _ => Err(CommandError::UnknownCommand(s.to_string())),
        }
    }
}

/// Raw model reply before the command name is checked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandResponse {
    #[serde(alias = "Command")]
    pub command: String,

    #[serde(default, alias = "Data")]
    pub data: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("No handler registered for '{0}'")]
    Unhandled(CommandKind),

    #[error("Failed to parse command: {0}")]
    Parse(String),

    #[error("Model call failed: {0}")]
    Llm(#[from] LlmError),
}

type Handler = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Mapping from command kind to handler.
pub struct CommandTable {
    handlers: HashMap<CommandKind, Handler>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Table answering `task` with the given task and logging `say`.
    pub fn for_task(task: impl Into<String>) -> Self {
        let task = task.into();
        Self::new()
            .with(CommandKind::Task, move |_| task.clone())
            .with(CommandKind::Say, |text| {
                tracing::info!(text = %text, "agent says");
                String::new()
            })
    }

    /// Register `handler` for `kind`, replacing any previous handler.
    pub fn with<F>(mut self, kind: CommandKind, handler: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    pub fn dispatch(&self, kind: CommandKind, data: &str) -> Result<String, CommandError> {
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(CommandError::Unhandled(kind))?;
        Ok(handler(data))
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON schema for a command reply.
pub fn command_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "command": { "type": "string", "enum": ["task", "say", "search"] },
            "data": { "type": "string" }
        },
        "required": ["command", "data"]
    })
}

/// Outcome of one dispatched turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTurn {
    pub kind: CommandKind,
    pub data: String,
    /// Handler output, to be sent back as the next message.
    pub reply: String,
}

pub struct CommandAgent {
    table: CommandTable,
}

impl CommandAgent {
    pub fn new(table: CommandTable) -> Self {
        Self { table }
    }

    /// Parse a collected reply into a known command.
    pub fn parse(text: &str) -> Result<(CommandKind, String), CommandError> {
        let response: CommandResponse = serde_json::from_str(text.trim())
            .map_err(|e| CommandError::Parse(e.to_string()))?;
        let kind = response.command.parse()?;
        Ok((kind, response.data))
    }

    /// Send `message`, collect the reply and dispatch the command it names.
    pub async fn run_turn(
        &self,
        message: &str,
        ctx: &AgentContext,
    ) -> Result<CommandTurn, CommandError> {
        let request =
            ChatRequest::new(COMMAND_SYSTEM_PROMPT, message).with_format(command_schema());
        let stream = ctx.llm.chat_stream(&ctx.model, request).await?;
        let response = collect(stream).await?;

        let (kind, data) = Self::parse(&response.answer).map_err(|e| {
            tracing::warn!(raw = %truncate_for_log(&response.answer, 300), error = %e, "bad command reply");
            e
        })?;

        tracing::debug!(command = %kind, data = %truncate_for_log(&data, 200), "dispatching command");
        let reply = self.table.dispatch(kind, &data)?;
        Ok(CommandTurn { kind, data, reply })
    }
}
