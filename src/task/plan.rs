//! Plan definitions and dependency validation.
//!
//! A plan is a strictly linear list of steps. Steps exchange data through
//! named variables: each step lists the names it consumes and (at most) one
//! name it produces.
//!
//! # Name resolution
//! Dependencies resolve purely by usage: a name is known once an earlier step
//! declares it as its output. The optional variable catalogue only documents
//! names for display and is never consulted by validation.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::sanitize_name_list;

/// A named slot produced by one step and consumable by later steps.
///
/// Identity is `name`; `description` is documentation only and never takes
/// part in equality or lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(default, alias = "Description")]
    pub description: String,
}

impl Variable {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.description)
        }
    }
}

/// One unit of work in a plan.
///
/// # Invariants
/// - At most one output name (enforced at construction and deserialization)
/// - Input and output names are trimmed, `$`-free and non-empty
///
/// A step without an output contributes no binding to the variable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStep", into = "RawStep")]
pub struct Step {
    description: String,
    inputs: Vec<String>,
    output: Option<String>,
}

impl Step {
    /// Create a source step (no inputs, no output).
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            inputs: Vec::new(),
            output: None,
        }
    }

    /// Add an input name.
    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self.inputs = sanitize_name_list(std::mem::take(&mut self.inputs));
        self
    }

    /// Set the output name, replacing any previous one.
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.output = sanitize_name_list(vec![name.into()]).into_iter().next();
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Output names as a slice (empty or one element).
    pub fn outputs(&self) -> &[String] {
        self.output.as_slice()
    }

    /// Whether this step consumes nothing from earlier steps.
    pub fn is_source(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.description)?;
        writeln!(f, "  Inputs: {}", self.inputs.join(", "))?;
        write!(f, "  Output: {}", self.output.as_deref().unwrap_or("-"))
    }
}

/// Wire shape of a step as produced by the model.
///
/// Accepts either `outputs: [..]` or a single `output`, with the capitalized
/// key spellings some models emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStep {
    #[serde(alias = "Description")]
    description: String,

    #[serde(default, alias = "Inputs")]
    inputs: Vec<String>,

    #[serde(default, alias = "Outputs")]
    outputs: Vec<String>,

    #[serde(default, alias = "Output", skip_serializing)]
    output: Option<String>,
}

impl TryFrom<RawStep> for Step {
    type Error = PlanError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let mut outputs = raw.outputs;
        outputs.extend(raw.output);
        let outputs = sanitize_name_list(outputs);
        if outputs.len() > 1 {
            return Err(PlanError::TooManyOutputs {
                step: raw.description,
                count: outputs.len(),
            });
        }

        Ok(Self {
            description: raw.description,
            inputs: sanitize_name_list(raw.inputs),
            output: outputs.into_iter().next(),
        })
    }
}

impl From<Step> for RawStep {
    fn from(step: Step) -> Self {
        Self {
            description: step.description,
            inputs: step.inputs,
            outputs: step.output.into_iter().collect(),
            output: None,
        }
    }
}

/// An ordered sequence of steps produced for one task.
///
/// Order is significant: it is the only allowed execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlan {
    #[serde(alias = "Steps")]
    steps: Vec<Step>,

    /// Optional catalogue documenting variable names.
    #[serde(default, alias = "Variables", skip_serializing_if = "Vec::is_empty")]
    variables: Vec<Variable>,
}

impl TaskPlan {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps,
            variables: Vec::new(),
        }
    }

    /// Attach a variable catalogue.
    pub fn with_variables(mut self, variables: Vec<Variable>) -> Self {
        self.variables = variables;
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Look up a catalogue entry by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Check dependency soundness with a single forward scan.
    ///
    /// # Algorithm
    /// Known names start empty. For each step in order, every input must
    /// already be known (inputs are checked before the step's own output is
    /// added, so a step cannot consume itself). The step's output is then
    /// added to the known set.
    ///
    /// # Errors
    /// Returns the first `DependencyViolation` in plan order.
    pub fn check_dependencies(&self) -> Result<(), PlanError> {
        let mut known: HashSet<&str> = HashSet::new();

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(missing) = step.inputs.iter().find(|i| !known.contains(i.as_str())) {
                return Err(PlanError::DependencyViolation {
                    step_index: index,
                    step: step.description.clone(),
                    variable: missing.clone(),
                });
            }
            known.extend(step.outputs().iter().map(String::as_str));
        }

        Ok(())
    }

    /// Validate the plan, freezing it on success.
    pub fn validate(self) -> Result<ValidatedPlan, PlanError> {
        self.check_dependencies()?;
        Ok(ValidatedPlan { plan: self })
    }
}

impl fmt::Display for TaskPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "steps:")?;
        for (i, step) in self.steps.iter().enumerate() {
            write!(f, "\n {}. {}", i + 1, step)?;
        }
        if !self.variables.is_empty() {
            write!(f, "\nvariables:")?;
            for variable in &self.variables {
                write!(f, "\n {}", variable)?;
            }
        }
        Ok(())
    }
}

/// A plan that passed dependency validation.
///
/// Only obtainable through [`TaskPlan::validate`], and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPlan {
    plan: TaskPlan,
}

impl ValidatedPlan {
    pub fn plan(&self) -> &TaskPlan {
        &self.plan
    }

    pub fn steps(&self) -> &[Step] {
        self.plan.steps()
    }

    pub fn into_inner(self) -> TaskPlan {
        self.plan
    }
}

/// Errors in plan construction, validation or variable lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// `step_index` is 0-based; messages number steps from 1.
    #[error("Step {} ('{step}') consumes '{variable}' which no earlier step produces", .step_index + 1)]
    DependencyViolation {
        step_index: usize,
        step: String,
        variable: String,
    },

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Step '{step}' declares {count} outputs; at most one is allowed")]
    TooManyOutputs { step: String, count: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step_plan() -> TaskPlan {
        TaskPlan::new(vec![
            Step::new("Find the user's location").with_output("location"),
            Step::new("Get the weather at $location")
                .with_input("location")
                .with_output("weather"),
        ])
    }

    #[test]
    fn test_violation_message_numbers_steps_from_one() {
        let plan = TaskPlan::new(vec![Step::new("b").with_input("z")]);
        let err = plan.check_dependencies().unwrap_err();
        assert!(matches!(err, PlanError::DependencyViolation { step_index: 0, .. }));
        assert_eq!(
            err.to_string(),
            "Step 1 ('b') consumes 'z' which no earlier step produces"
        );
    }

    #[test]
    fn test_sound_plan_validates() {
        assert!(two_step_plan().validate().is_ok());
    }

    #[test]
    fn test_empty_plan_validates() {
        assert!(TaskPlan::default().validate().is_ok());
    }

    #[test]
    fn test_input_from_any_earlier_step_is_accepted() {
        let plan = TaskPlan::new(vec![
            Step::new("a").with_output("x"),
            Step::new("b").with_output("y"),
            Step::new("c").with_input("x").with_input("y").with_output("z"),
        ]);
        assert!(plan.check_dependencies().is_ok());
    }

    #[test]
    fn test_missing_input_reports_step_and_name() {
        let plan = TaskPlan::new(vec![
            Step::new("a").with_output("x"),
            Step::new("b").with_input("x").with_input("ghost").with_output("y"),
        ]);
        let err = plan.validate().unwrap_err();
        assert_eq!(
            err,
            PlanError::DependencyViolation {
                step_index: 1,
                step: "b".to_string(),
                variable: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_first_violation_wins() {
        let plan = TaskPlan::new(vec![
            Step::new("a").with_input("first").with_output("x"),
            Step::new("b").with_input("second"),
        ]);
        match plan.check_dependencies() {
            Err(PlanError::DependencyViolation {
                step_index,
                variable,
                ..
            }) => {
                assert_eq!(step_index, 0);
                assert_eq!(variable, "first");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_step_cannot_consume_its_own_output() {
        let plan = TaskPlan::new(vec![Step::new("loop").with_input("x").with_output("x")]);
        assert!(matches!(
            plan.check_dependencies(),
            Err(PlanError::DependencyViolation { step_index: 0, .. })
        ));
    }

    #[test]
    fn test_later_output_does_not_satisfy_earlier_input() {
        let plan = TaskPlan::new(vec![
            Step::new("uses x").with_input("x"),
            Step::new("makes x").with_output("x"),
        ]);
        assert!(plan.check_dependencies().is_err());
    }

    #[test]
    fn test_catalogue_does_not_satisfy_dependencies() {
        let plan = TaskPlan::new(vec![Step::new("uses x").with_input("x")])
            .with_variables(vec![Variable::new("x", "declared but never produced")]);
        assert!(plan.check_dependencies().is_err());
        assert_eq!(
            plan.variable("x").map(|v| v.description.as_str()),
            Some("declared but never produced")
        );
    }

    #[test]
    fn test_variable_identity_is_name() {
        assert_eq!(Variable::new("x", "one"), Variable::new("x", "two"));
        assert_ne!(Variable::new("x", "one"), Variable::new("y", "one"));
    }

    #[test]
    fn test_deserialize_outputs_array() {
        let json = r#"{
            "steps": [
                {"description": "Find out who the current Pope is", "inputs": [], "outputs": ["currentPope"]},
                {"description": "Find out the birthday of $currentPope", "inputs": ["$currentPope"], "outputs": ["birthday"]}
            ],
            "variables": [{"name": "currentPope", "description": "The current Pope"}]
        }"#;
        let plan: TaskPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.steps().len(), 2);
        assert_eq!(plan.steps()[0].output(), Some("currentPope"));
        assert_eq!(plan.steps()[1].inputs(), &["currentPope".to_string()]);
        assert_eq!(plan.variables().len(), 1);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_deserialize_capitalized_keys_and_single_output() {
        let json = r#"{"Steps": [{"Description": "Get location", "Inputs": [], "Output": "location"}]}"#;
        let plan: TaskPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.steps()[0].output(), Some("location"));
    }

    #[test]
    fn test_deserialize_rejects_multiple_outputs() {
        let json = r#"{"steps": [{"description": "a", "outputs": ["x", "y"]}]}"#;
        let err = serde_json::from_str::<TaskPlan>(json).unwrap_err();
        assert!(err.to_string().contains("at most one"));
    }

    #[test]
    fn test_step_without_output_has_no_outputs() {
        let json = r#"{"steps": [{"description": "say hello"}]}"#;
        let plan: TaskPlan = serde_json::from_str(json).unwrap();
        assert!(plan.steps()[0].outputs().is_empty());
        assert!(plan.steps()[0].is_source());
    }

    #[test]
    fn test_serialize_uses_outputs_array() {
        let value = serde_json::to_value(Step::new("a").with_output("x")).unwrap();
        assert_eq!(value["outputs"], serde_json::json!(["x"]));
        assert!(value.get("output").is_none());
    }

    #[test]
    fn test_display_lists_steps() {
        let text = two_step_plan().to_string();
        assert!(text.starts_with("steps:"));
        assert!(text.contains("1. Find the user's location"));
        assert!(text.contains("Inputs: location"));
        assert!(text.contains("Output: weather"));
    }
}
