//! Agents module - the plan/execute engine.
//!
//! # Components
//! - **TaskPlanner**: turns a task into a [`TaskPlan`](crate::task::TaskPlan) and validates it
//! - **PlanExecutor**: runs a validated plan step by step against a variable store
//! - **StepExecutor**: grounds one step's prompt in bound values and extracts its answer
//! - **ResponseCollector**: splits a fragment stream into answer and thinking text
//! - **CommandAgent**: single-turn `task` / `say` / `search` dispatch
//!
//! # Design Principles
//! - Strictly sequential: one step at a time, in plan order
//! - Fail fast: no retries, no skipping; the first error ends the run
//! - Explicit state: the selected model and event sink travel in [`AgentContext`]

mod collector;
mod command;
mod context;
mod events;
mod executor;
mod planner;
mod step;
mod types;

pub use collector::{collect, CollectedResponse, CollectorState, ResponseCollector};
pub use command::{
    command_schema, CommandAgent, CommandError, CommandKind, CommandResponse, CommandTable,
    CommandTurn,
};
pub use context::AgentContext;
pub use events::PlanEvent;
pub use executor::PlanExecutor;
pub use planner::{parse_plan, plan_schema, TaskPlanner};
pub use step::{StepAnswer, StepExecutor};
pub use types::{AgentError, PlanRunResult, RunId};
