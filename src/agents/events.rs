//! Observability events.
//!
//! Events are broadcast to any listener (console reporter, telemetry). They
//! are side effects only: a missing or lagging listener never changes what
//! the engine does.
//!
//! Events raised during a plan run carry its [`RunId`]; planning and model
//! selection happen before any run and carry none.

use serde::Serialize;

use super::types::RunId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    ModelSelected {
        model: String,
    },
    PlanReceived {
        steps: usize,
    },
    ValidationPassed {
        steps: usize,
    },
    ValidationFailed {
        step_index: usize,
        variable: String,
    },
    RunStarted {
        run: RunId,
        steps: usize,
    },
    StepStarted {
        run: RunId,
        index: usize,
        description: String,
    },
    /// Reasoning the model produced while planning, before any run exists.
    PlanThinking {
        content: String,
    },
    /// Reasoning the model produced while executing step `index`.
    StepThinking {
        run: RunId,
        index: usize,
        content: String,
    },
    StepCompleted {
        run: RunId,
        index: usize,
        output: Option<String>,
        value: String,
    },
    StepFailed {
        run: RunId,
        index: usize,
        error: String,
    },
    RunFinished {
        run: RunId,
        success: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_type_tag() {
        let value = serde_json::to_value(PlanEvent::PlanReceived { steps: 3 }).unwrap();
        assert_eq!(value["type"], "plan_received");
        assert_eq!(value["steps"], 3);
    }
}
