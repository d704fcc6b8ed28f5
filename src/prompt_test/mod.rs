pub mod engine;
pub mod registry;
pub mod report;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{ScorableError, ScorableResult};

pub use engine::{await_completion, submit, NoopObserver, PollObserver, PollOptions};
pub use registry::JobRegistry;

// ============================================================================
// Configuration (prompt-tests.yaml)
// ============================================================================

/// Evaluator used by a prompt test, referenced by id or by unique name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

impl EvaluatorConfig {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ScorableResult<()> {
        match (&self.id, &self.name) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            (None, None) => Err(ScorableError::config(
                "either \"id\" or \"name\" must be provided for an evaluator",
            )),
            (Some(_), Some(_)) => Err(ScorableError::config(
                "provide either \"id\" or \"name\" for an evaluator, not both",
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptTestInput {
    pub vars: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptTestSpec {
    pub prompts: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<PromptTestInput>,
    pub models: Vec<String>,
    #[serde(default)]
    pub evaluators: Vec<EvaluatorConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
}

impl PromptTestSpec {
    pub fn from_yaml(content: &str) -> ScorableResult<Self> {
        let spec: Self = serde_yaml::from_str(content)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn load(path: &Path) -> ScorableResult<Self> {
        if !path.exists() {
            return Err(ScorableError::config(format!(
                "'{}' not found; run `scorable prompt-test init` first or pass another file with -c",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> ScorableResult<()> {
        if self.prompts.is_empty() {
            return Err(ScorableError::config("at least one prompt is required"));
        }
        if self.models.is_empty() {
            return Err(ScorableError::config("at least one model is required"));
        }
        if self.dataset_id.is_some() && !self.inputs.is_empty() {
            return Err(ScorableError::config(
                "use either inputs or dataset_id, not both",
            ));
        }
        for evaluator in &self.evaluators {
            evaluator.validate()?;
        }
        Ok(())
    }

    /// Every (prompt, model) pair, prompt-major.
    pub fn combinations(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.prompts.iter().flat_map(move |prompt| {
            self.models
                .iter()
                .map(move |model| (prompt.as_str(), model.as_str()))
        })
    }
}

// ============================================================================
// Remote job model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTestEvaluator {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub justification: Option<String>,
}

/// One input row's execution within a prompt test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub llm_output: Option<String>,
    /// Seconds spent in the model call.
    #[serde(default)]
    pub model_call_duration: Option<f64>,
    #[serde(default)]
    pub evaluation_results: Vec<EvaluationResult>,
    #[serde(default)]
    pub variables: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptTestJob {
    pub id: String,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub avg_cost: Option<String>,
    #[serde(default)]
    pub avg_model_call_duration: Option<f64>,
    #[serde(default)]
    pub evaluators: Vec<PromptTestEvaluator>,
}

impl PromptTestJob {
    /// Complete iff there is at least one task and every task is terminal.
    pub fn is_complete(&self) -> bool {
        !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status.is_terminal())
    }

    pub fn finished_tasks(&self) -> usize {
        self.tasks.iter().filter(|t| t.status.is_terminal()).count()
    }
}

// ============================================================================
// Starter configuration
// ============================================================================

pub const CONFIG_TEMPLATE: &str = r##"# Prompt Testing Configuration
# This file defines a test suite of prompt and model combinations, with optional evaluators.

# List of prompt templates to test (use {{variable}} for input substitution)
prompts:
  - "Extract user information from the following text: {{text}}"
  - "Identify and extract the name, username, and email from: {{text}}"

# Input data for the prompt tests (each input will be tested with each prompt and model)
inputs:
  - vars:
      text: "John Doe, @johndoe, john@example.com"
  - vars:
      text: "Contact: Jane Smith (email: jane.smith@company.org, handle: @janesmith)"

# Alternative to inputs: use a dataset by ID
# dataset_id: "<uuid>"

# Models to test (each will be run with all prompt/input combinations)
models:
  - "gemini-2.5-flash-lite"
  - "gpt-4o-mini"

# Evaluators to assess the quality of responses
evaluators:
  - name: "Precision"
  - name: "Confidentiality"

# Optional: response schema for structured output (JSON Schema format)
# response_schema:
#   type: "object"
#   required: ["name", "username", "email"]
#   properties:
#     name:
#       type: "string"
#     email:
#       type: "string"
#       format: "email"
#     username:
#       type: "string"
#       pattern: "^@[a-zA-Z0-9_]+$"
#   additionalProperties: false
"##;

/// Write the starter configuration. Returns `false` when the file exists and
/// `overwrite` is not set.
pub fn init_config(path: &Path, overwrite: bool) -> ScorableResult<bool> {
    if path.exists() && !overwrite {
        return Ok(false);
    }
    std::fs::write(path, CONFIG_TEMPLATE)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(status: TaskStatus) -> Task {
        Task {
            id: "t".into(),
            status,
            cost: None,
            llm_output: None,
            model_call_duration: None,
            evaluation_results: Vec::new(),
            variables: Map::new(),
        }
    }

    fn job(tasks: Vec<Task>) -> PromptTestJob {
        PromptTestJob {
            id: "j".into(),
            model: "m".into(),
            prompt: "p".into(),
            tasks,
            avg_cost: None,
            avg_model_call_duration: None,
            evaluators: Vec::new(),
        }
    }

    #[test]
    fn test_job_without_tasks_is_never_complete() {
        assert!(!job(Vec::new()).is_complete());
    }

    #[test]
    fn test_complete_iff_all_tasks_terminal() {
        assert!(job(vec![task(TaskStatus::Completed), task(TaskStatus::Failed)]).is_complete());
        assert!(!job(vec![task(TaskStatus::Completed), task(TaskStatus::Running)]).is_complete());
        assert!(!job(vec![task(TaskStatus::Pending)]).is_complete());
        assert!(!job(vec![task(TaskStatus::Unknown)]).is_complete());
    }

    #[test]
    fn test_unrecognised_status_decodes_as_unknown() {
        let t: Task = serde_json::from_str(r#"{"id": "t1", "status": "queued"}"#).unwrap();
        assert_eq!(t.status, TaskStatus::Unknown);
        assert!(t.evaluation_results.is_empty());
    }

    #[test]
    fn test_evaluator_reference_needs_exactly_one_key() {
        assert!(EvaluatorConfig::by_id("e1").validate().is_ok());
        assert!(EvaluatorConfig::by_name("Clarity").validate().is_ok());
        assert!(EvaluatorConfig::default().validate().is_err());
        let both = EvaluatorConfig {
            id: Some("e1".into()),
            name: Some("Clarity".into()),
            version_id: None,
        };
        assert!(both.validate().is_err());
    }

    #[test]
    fn test_template_parses_and_validates() {
        let spec = PromptTestSpec::from_yaml(CONFIG_TEMPLATE).unwrap();
        assert_eq!(spec.prompts.len(), 2);
        assert_eq!(spec.models.len(), 2);
        assert_eq!(spec.inputs.len(), 2);
        assert_eq!(spec.combinations().count(), 4);
        assert_eq!(spec.evaluators[0], EvaluatorConfig::by_name("Precision"));
    }

    #[test]
    fn test_dataset_and_inputs_conflict() {
        let yaml = r#"
prompts: ["P"]
models: ["m"]
dataset_id: "ds"
inputs:
  - vars: {x: 1}
"#;
        assert!(matches!(
            PromptTestSpec::from_yaml(yaml),
            Err(ScorableError::Config { .. })
        ));
    }

    #[test]
    fn test_init_config_respects_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt-tests.yaml");
        std::fs::write(&path, "custom").unwrap();

        assert!(!init_config(&path, false).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "custom");
        assert!(init_config(&path, true).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("prompts:"));
    }
}
