//! Plan executor - drives a validated plan step by step.
//!
//! # Algorithm
//! 1. Start from an empty variable store
//! 2. For each step, in order: execute it, then bind the answer to the
//!    step's output (if it declares one)
//! 3. Stop at the first failure; bindings made so far are kept

use super::context::AgentContext;
use super::events::PlanEvent;
use super::step::StepExecutor;
use super::types::{AgentError, PlanRunResult, RunId};
use crate::task::{ExecutionState, ValidatedPlan};
use crate::util::truncate_for_log;

pub struct PlanExecutor {
    step_executor: StepExecutor,
}

impl PlanExecutor {
    pub fn new() -> Self {
        Self {
            step_executor: StepExecutor::new(),
        }
    }

    pub fn with_step_executor(step_executor: StepExecutor) -> Self {
        Self { step_executor }
    }

    /// Run every step of `plan` sequentially.
    ///
    /// Only a validated plan is accepted, so an input lookup failing here
    /// points at a bug in the executor rather than a bad plan.
    pub async fn run(&self, plan: &ValidatedPlan, ctx: &AgentContext) -> PlanRunResult {
        let run = RunId::new();
        let steps = plan.steps();
        let mut state = ExecutionState::new();

        tracing::info!(run = %run, steps = steps.len(), "starting plan run");
        ctx.emit(PlanEvent::RunStarted {
            run,
            steps: steps.len(),
        });

        for (index, step) in steps.iter().enumerate() {
            tracing::info!(run = %run, index, step = %step.description(), "executing step");
            ctx.emit(PlanEvent::StepStarted {
                run,
                index,
                description: step.description().to_string(),
            });

            let answer = match self.step_executor.execute(step, &state, ctx).await {
                Ok(answer) => answer,
                Err(e) => {
                    tracing::warn!(run = %run, index, error = %e, "step failed");
                    ctx.emit(PlanEvent::StepFailed {
                        run,
                        index,
                        error: e.to_string(),
                    });
                    ctx.emit(PlanEvent::RunFinished {
                        run,
                        success: false,
                    });
                    return PlanRunResult {
                        run_id: run,
                        state,
                        completed_steps: index,
                        error: Some(AgentError::StepFailed {
                            index,
                            description: step.description().to_string(),
                            source: Box::new(e),
                        }),
                    };
                }
            };

            if !answer.thinking.is_empty() {
                ctx.emit(PlanEvent::StepThinking {
                    run,
                    index,
                    content: answer.thinking,
                });
            }

            let value = answer.value;
            tracing::info!(
                run = %run,
                index,
                output = ?step.output(),
                value = %truncate_for_log(&value, 200),
                "step completed"
            );
            ctx.emit(PlanEvent::StepCompleted {
                run,
                index,
                output: step.output().map(str::to_string),
                value: value.clone(),
            });

            if let Some(name) = step.output() {
                state.set(name, value);
            }
        }

        tracing::info!(run = %run, bindings = state.len(), "plan run finished");
        ctx.emit(PlanEvent::RunFinished { run, success: true });

        PlanRunResult {
            run_id: run,
            state,
            completed_steps: steps.len(),
            error: None,
        }
    }
}

impl Default for PlanExecutor {
    fn default() -> Self {
        Self::new()
    }
}
