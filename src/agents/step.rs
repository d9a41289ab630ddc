//! Step executor - runs one plan step against the variable store.

use std::fmt::Write as _;

use super::collector::collect;
use super::context::AgentContext;
use super::types::AgentError;
use crate::llm::ChatRequest;
use crate::task::{ExecutionState, Step};
use crate::util::truncate_for_log;

const STEP_SYSTEM_PROMPT: &str = "Solve the given task and give a minimal response. \
The response must be a single value that can be assigned to a variable for later use. \
Do not restate the question or explain the answer; reply with as small a value as possible.";

/// What one step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepAnswer {
    /// Trimmed answer, the value bound to the step's output.
    pub value: String,
    /// Reasoning collected from thinking spans; empty when there was none.
    pub thinking: String,
}

pub struct StepExecutor {
    system_prompt: String,
}

impl StepExecutor {
    pub fn new() -> Self {
        Self {
            system_prompt: STEP_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Build the user prompt: the description, then a binding block with the
    /// current value of every input.
    ///
    /// ```text
    /// Find out the birthday of $currentPope
    /// Variables:
    /// $currentPope = "Leo XIV"
    /// ```
    pub fn build_prompt(step: &Step, state: &ExecutionState) -> Result<String, AgentError> {
        let mut prompt = step.description().to_string();

        if !step.inputs().is_empty() {
            prompt.push_str("\nVariables:\n");
            for name in step.inputs() {
                let value = state.get(name)?;
                let _ = writeln!(prompt, "${} = \"{}\"", name, value);
            }
        }

        Ok(prompt)
    }

    /// Run the step and return its trimmed answer and reasoning.
    pub async fn execute(
        &self,
        step: &Step,
        state: &ExecutionState,
        ctx: &AgentContext,
    ) -> Result<StepAnswer, AgentError> {
        let prompt = Self::build_prompt(step, state)?;
        tracing::debug!(prompt = %truncate_for_log(&prompt, 500), "step prompt");

        let mut request = ChatRequest::new(&self.system_prompt, prompt);
        if let Some(tools) = &ctx.tools {
            request = request.with_tools(tools.clone());
        }

        let stream = ctx.llm.chat_stream(&ctx.model, request).await?;
        let response = collect(stream).await?;

        if !response.thinking.is_empty() {
            tracing::debug!(
                thinking = %truncate_for_log(&response.thinking, 200),
                "step reasoning"
            );
        }

        Ok(StepAnswer {
            value: response.answer.trim().to_string(),
            thinking: response.thinking,
        })
    }
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new()
    }
}
