//! Task module - plans, steps, variables and the run-scoped variable store.
//!
//! This module is designed with formal verification in mind:
//! - All types use algebraic data types with exhaustive matching
//! - Invariants are documented and enforced in constructors
//! - Pure functions are separated from IO operations (no model calls here)

mod plan;
mod state;

pub use plan::{PlanError, Step, TaskPlan, ValidatedPlan, Variable};
pub use state::ExecutionState;
