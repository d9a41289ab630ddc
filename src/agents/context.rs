//! Agent execution context - shared state across planning and execution.

use std::sync::Arc;

use tokio::sync::broadcast;

use super::events::PlanEvent;
use super::types::AgentError;
use crate::llm::{select_model, LlmClient};
use crate::tools::ToolRegistry;

/// Shared context passed to the planner and executors.
///
/// # Thread Safety
/// Context is cheap to share behind `Arc`; nothing in it is mutated after
/// construction.
pub struct AgentContext {
    /// LLM client for model calls
    pub llm: Arc<dyn LlmClient>,

    /// Model used for every call made through this context
    pub model: String,

    /// Tools offered to the model during step execution
    pub tools: Option<Arc<ToolRegistry>>,

    /// Optional event sink for observers (console reporter, telemetry)
    pub events: Option<broadcast::Sender<PlanEvent>>,
}

impl AgentContext {
    pub fn new(llm: Arc<dyn LlmClient>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            tools: None,
            events: None,
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<PlanEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Ask the backend for its models and pick one.
    ///
    /// Fails with `NoModelsAvailable` when the backend serves nothing.
    pub async fn connect(
        llm: Arc<dyn LlmClient>,
        preferred: Option<&str>,
        events: Option<broadcast::Sender<PlanEvent>>,
    ) -> Result<Self, AgentError> {
        let models = llm.list_models().await?;
        let model = select_model(&models, preferred).ok_or(AgentError::NoModelsAvailable)?;

        tracing::info!(model = %model, available = models.len(), "model selected");

        let mut ctx = Self::new(llm, model);
        ctx.events = events;
        ctx.emit(PlanEvent::ModelSelected {
            model: ctx.model.clone(),
        });
        Ok(ctx)
    }

    /// Send an event to observers, if any. Nobody listening is not an error.
    pub fn emit(&self, event: PlanEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedLlm;

    #[tokio::test]
    async fn test_connect_prefers_matching_model() {
        let llm = Arc::new(ScriptedLlm::new().with_models(&["mistral:7b", "qwq:32b"]));
        let (tx, mut rx) = broadcast::channel(8);

        let ctx = AgentContext::connect(llm, Some("qwq"), Some(tx))
            .await
            .unwrap();
        assert_eq!(ctx.model, "qwq:32b");
        assert_eq!(
            rx.recv().await.unwrap(),
            PlanEvent::ModelSelected {
                model: "qwq:32b".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_connect_without_models_fails() {
        let llm = Arc::new(ScriptedLlm::new().with_models(&[]));
        let err = AgentContext::connect(llm, None, None).await.err().unwrap();
        assert!(matches!(err, AgentError::NoModelsAvailable));
        assert_eq!(err.to_string(), "No models available");
    }

    #[test]
    fn test_emit_without_listeners_is_silent() {
        let (tx, rx) = broadcast::channel(1);
        drop(rx);
        let ctx = AgentContext::new(Arc::new(ScriptedLlm::new()), "m").with_events(tx);
        ctx.emit(PlanEvent::PlanReceived { steps: 1 });
    }
}
