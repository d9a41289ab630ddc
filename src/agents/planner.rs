//! Task planner - turns a free-text task into a linear plan.
//!
//! # Algorithm
//! 1. Send the task to the model with the decomposition instructions and a
//!    JSON schema for the plan shape
//! 2. Collect the streamed answer (thinking spans dropped)
//! 3. Parse the answer as a [`TaskPlan`]; a parse failure is fatal
//!
//! Validation is a separate call ([`TaskPlanner::validate`]) so callers can
//! inspect or print the plan before deciding to run it.

use serde_json::{json, Value};

use super::collector::collect;
use super::context::AgentContext;
use super::events::PlanEvent;
use super::types::AgentError;
use crate::llm::ChatRequest;
use crate::task::{TaskPlan, ValidatedPlan};
use crate::util::truncate_for_log;

const PLANNER_SYSTEM_PROMPT: &str = r#"You break a single task down into a sequence of steps that another agent will carry out one at a time.
Do not solve the task yourself. Describe only the general steps needed to solve it.
Do not number, decorate or bullet the steps.
Every step lists the variables it needs as "inputs" and the variable it produces as "outputs" (at most one).
A step may only use variables produced by an earlier step. Refer to a variable in a description as $name.

For example, for "what is the birthday of the current Pope?" you might answer:
{
  "steps": [
    { "description": "Find out who the current Pope is", "inputs": [], "outputs": ["currentPope"] },
    { "description": "Find out the birthday of $currentPope", "inputs": ["currentPope"], "outputs": ["birthday"] }
  ],
  "variables": [
    { "name": "currentPope", "description": "The current Pope" },
    { "name": "birthday", "description": "The birthday of the current Pope" }
  ]
}"#;

/// JSON schema the planner's answer must conform to.
pub fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "description": { "type": "string" },
                        "inputs": { "type": "array", "items": { "type": "string" } },
                        "outputs": {
                            "type": "array",
                            "items": { "type": "string" },
                            "maxItems": 1
                        }
                    },
                    "required": ["description", "inputs", "outputs"]
                }
            },
            "variables": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["name", "description"]
                }
            }
        },
        "required": ["steps"]
    })
}

/// Parse collected model text into a plan. No repair is attempted.
pub fn parse_plan(text: &str) -> Result<TaskPlan, AgentError> {
    serde_json::from_str(text.trim()).map_err(|e| AgentError::PlanParseFailure {
        message: e.to_string(),
        raw: text.to_string(),
    })
}

pub struct TaskPlanner {
    system_prompt: String,
}

impl TaskPlanner {
    pub fn new() -> Self {
        Self {
            system_prompt: PLANNER_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Ask the model for a plan. The result is not validated.
    pub async fn plan(&self, task: &str, ctx: &AgentContext) -> Result<TaskPlan, AgentError> {
        tracing::info!(model = %ctx.model, task = %truncate_for_log(task, 200), "planning task");

        let request = ChatRequest::new(&self.system_prompt, task).with_format(plan_schema());
        let stream = ctx.llm.chat_stream(&ctx.model, request).await?;
        let response = collect(stream).await?;

        if !response.thinking.is_empty() {
            ctx.emit(PlanEvent::PlanThinking {
                content: response.thinking.clone(),
            });
        }

        let plan = parse_plan(&response.answer).map_err(|e| {
            tracing::warn!(
                raw = %truncate_for_log(&response.answer, 500),
                "model returned an unparseable plan"
            );
            e
        })?;

        tracing::info!(steps = plan.steps().len(), "plan received");
        ctx.emit(PlanEvent::PlanReceived {
            steps: plan.steps().len(),
        });
        Ok(plan)
    }

    /// Check dependency soundness and freeze the plan.
    pub fn validate(&self, plan: TaskPlan, ctx: &AgentContext) -> Result<ValidatedPlan, AgentError> {
        match plan.validate() {
            Ok(validated) => {
                tracing::info!(steps = validated.steps().len(), "plan validated");
                ctx.emit(PlanEvent::ValidationPassed {
                    steps: validated.steps().len(),
                });
                Ok(validated)
            }
            Err(e) => {
                let err = AgentError::from(e);
                if let AgentError::DependencyViolation {
                    step_index,
                    variable,
                    ..
                } = &err
                {
                    tracing::warn!(step_index, variable = %variable, "plan validation failed");
                    ctx.emit(PlanEvent::ValidationFailed {
                        step_index: *step_index,
                        variable: variable.clone(),
                    });
                }
                Err(err)
            }
        }
    }
}

impl Default for TaskPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedLlm;
    use crate::llm::LlmError;
    use crate::task::Step;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    const POPE_PLAN: &str = r#"{
        "steps": [
            { "description": "Find out who the current Pope is", "inputs": [], "outputs": ["currentPope"] },
            { "description": "Find out the birthday of $currentPope", "inputs": ["currentPope"], "outputs": ["birthday"] }
        ]
    }"#;

    fn ctx(llm: Arc<ScriptedLlm>) -> AgentContext {
        AgentContext::new(llm, "test-model")
    }

    #[tokio::test]
    async fn test_plan_parses_collected_answer() {
        let llm = Arc::new(ScriptedLlm::new().reply(&["<think>", "two steps", "</think>", POPE_PLAN]));
        let plan = TaskPlanner::new()
            .plan("what is the birthday of the current Pope?", &ctx(llm.clone()))
            .await
            .unwrap();

        assert_eq!(plan.steps().len(), 2);
        assert_eq!(plan.steps()[1].inputs(), ["currentPope".to_string()]);
        assert_eq!(plan.steps()[1].output(), Some("birthday"));

        let requests = llm.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].1.format.is_some());
        assert!(requests[0].1.tools.is_none());
    }

    #[tokio::test]
    async fn test_plan_parse_failure_keeps_raw_text() {
        let llm = Arc::new(ScriptedLlm::new().reply(&["here are", " the steps"]));
        let err = TaskPlanner::new().plan("t", &ctx(llm)).await.unwrap_err();
        match err {
            AgentError::PlanParseFailure { raw, .. } => assert_eq!(raw, "here are the steps"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_plan_rejects_multi_output_step() {
        let llm = Arc::new(ScriptedLlm::new().reply(&[
            r#"{"steps": [{"description": "a", "inputs": [], "outputs": ["x", "y"]}]}"#,
        ]));
        let err = TaskPlanner::new().plan("t", &ctx(llm)).await.unwrap_err();
        assert!(matches!(err, AgentError::PlanParseFailure { .. }));
    }

    #[tokio::test]
    async fn test_plan_propagates_call_failure() {
        let llm = Arc::new(
            ScriptedLlm::new().failure(LlmError::network_error("connection refused".to_string())),
        );
        let err = TaskPlanner::new().plan("t", &ctx(llm)).await.unwrap_err();
        assert!(matches!(err, AgentError::ExternalCallFailure(_)));
    }

    #[test]
    fn test_parse_plan_accepts_capitalized_keys() {
        let plan = parse_plan(
            r#"{"Steps": [{"Description": "Find the Pope", "Inputs": [], "Outputs": ["$pope"]}],
                "Variables": [{"Name": "pope", "Description": "The Pope"}]}"#,
        )
        .unwrap();
        assert_eq!(plan.steps()[0].output(), Some("pope"));
        assert_eq!(plan.variable("pope").unwrap().description, "The Pope");
    }

    #[test]
    fn test_validate_reports_violation_and_emits() {
        let (tx, mut rx) = broadcast::channel(4);
        let ctx = ctx(Arc::new(ScriptedLlm::new())).with_events(tx);
        let plan = TaskPlan::new(vec![
            Step::new("a").with_output("x"),
            Step::new("b").with_input("z").with_output("y"),
        ]);

        let err = TaskPlanner::new().validate(plan, &ctx).unwrap_err();
        assert!(matches!(
            err,
            AgentError::DependencyViolation { step_index: 1, ref variable, .. } if variable == "z"
        ));
        assert_eq!(
            rx.try_recv().unwrap(),
            PlanEvent::ValidationFailed {
                step_index: 1,
                variable: "z".to_string()
            }
        );
    }

    #[test]
    fn test_schema_limits_outputs() {
        let schema = plan_schema();
        assert_eq!(
            schema["properties"]["steps"]["items"]["properties"]["outputs"]["maxItems"],
            1
        );
    }
}
