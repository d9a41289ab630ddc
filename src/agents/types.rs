//! Core types for the plan/execute engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::LlmError;
use crate::task::{ExecutionState, PlanError};

/// Unique identifier for one plan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new unique run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while planning or executing.
///
/// Every variant is surfaced to the immediate caller; nothing is retried.
/// Step indices are 0-based; messages number steps from 1.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("No models available")]
    NoModelsAvailable,

    #[error("Failed to parse plan: {message}")]
    PlanParseFailure { message: String, raw: String },

    #[error("Plan validation failed: step {} ('{step}') uses '{variable}' which no earlier step produces", .step_index + 1)]
    DependencyViolation {
        step_index: usize,
        step: String,
        variable: String,
    },

    #[error("Model call failed: {0}")]
    ExternalCallFailure(#[from] LlmError),

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Step {} ('{description}') failed: {source}", .index + 1)]
    StepFailed {
        index: usize,
        description: String,
        source: Box<AgentError>,
    },
}

impl From<PlanError> for AgentError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::DependencyViolation {
                step_index,
                step,
                variable,
            } => Self::DependencyViolation {
                step_index,
                step,
                variable,
            },
            PlanError::UndefinedVariable(name) => Self::UndefinedVariable(name),
            other @ PlanError::TooManyOutputs { .. } => Self::PlanParseFailure {
                message: other.to_string(),
                raw: String::new(),
            },
        }
    }
}

/// Outcome of running a plan.
///
/// # Invariants
/// - `error.is_none()` iff every step completed
/// - `state` holds exactly the bindings of the `completed_steps` first steps;
///   bindings are never rolled back on failure
#[derive(Debug)]
pub struct PlanRunResult {
    pub run_id: RunId,

    /// Variable store as it was when the run ended.
    pub state: ExecutionState,

    /// Number of steps that finished successfully.
    pub completed_steps: usize,

    /// The failure that stopped the run, if any.
    pub error: Option<AgentError>,
}

impl PlanRunResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Convert into the final store, or the failure that aborted the run.
    pub fn into_result(self) -> Result<ExecutionState, AgentError> {
        match self.error {
            None => Ok(self.state),
            Some(e) => Err(e),
        }
    }
}
