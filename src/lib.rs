//! # Stepwise
//!
//! Plan-and-execute agent on top of a local Ollama server.
//!
//! This library provides:
//! - A planner that breaks a task into linear steps linked by named variables
//! - A validator that rejects plans consuming a variable before it exists
//! - A sequential executor that feeds earlier answers into later prompts
//!
//! ## Architecture
//!
//! ```text
//!   task ──▶ TaskPlanner ──▶ TaskPlan ──validate──▶ ValidatedPlan
//!                                                        │
//!                                                        ▼
//!                                                  PlanExecutor
//!                                                        │ per step
//!                                                        ▼
//!              ExecutionState ◀──bind── StepExecutor ──▶ LlmClient (+ tools)
//!                                             ▲               │
//!                                             └── collect ◀───┘ fragments
//! ```
//!
//! ## Modules
//! - `agents`: planner, executors, response collector, command dispatch
//! - `task`: plan data model, validation and the variable store
//! - `llm`: model backend abstraction and the Ollama client
//! - `tools`: tools the model may call while executing a step

pub mod agents;
pub mod config;
pub mod llm;
pub mod task;
pub mod tools;
pub mod util;

pub use agents::{AgentContext, AgentError, PlanExecutor, TaskPlanner};
pub use config::Config;
pub use task::{ExecutionState, Step, TaskPlan, ValidatedPlan};
