//! Run-scoped variable store.

use std::collections::BTreeMap;

use serde::Serialize;

use super::PlanError;

/// Mapping from variable name to the value a step produced.
///
/// # Invariants
/// - Created empty at the start of a plan run and dropped with it
/// - Names are never removed; `set` overwrites (last writer wins)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionState {
    variables: BTreeMap<String, String>,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a bound value.
    ///
    /// # Errors
    /// `UndefinedVariable` if the name was never bound. Against a validated
    /// plan this indicates a defect in the caller, not bad user input.
    pub fn get(&self, name: &str) -> Result<&str, PlanError> {
        self.variables
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| PlanError::UndefinedVariable(name.to_string()))
    }

    /// Bind `name` to `value`, returning the previous value if any.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.variables.insert(name.into(), value.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterate bindings in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_variables(self) -> BTreeMap<String, String> {
        self.variables
    }
}
