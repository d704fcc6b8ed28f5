pub mod datasets;
pub mod evaluators;
pub mod execution_logs;
pub mod judges;
pub mod messages;
pub mod objectives;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ScorableError, ScorableResult};
use messages::Messages;

// ============================================================================
// Shared request models
// ============================================================================

/// Interaction details sent when executing a judge or an evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    /// Extra prompt variables, e.g. `{"subject": "clarity"}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Pin a specific evaluator version; latest when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator_version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Messages>,
}

impl ExecutionPayload {
    pub fn response(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            ..Self::default()
        }
    }

    pub fn conversation(messages: Messages) -> Self {
        Self {
            messages: Some(messages),
            ..Self::default()
        }
    }

    pub fn with_request(mut self, request: impl Into<String>) -> Self {
        self.request = Some(request.into());
        self
    }

    pub fn with_contexts(mut self, contexts: Vec<String>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    /// A request, a response or a conversation must be present.
    pub fn validate(&self) -> ScorableResult<()> {
        let has_text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        if has_text(&self.request) || has_text(&self.response) || self.messages.is_some() {
            Ok(())
        } else {
            Err(ScorableError::config(
                "either response or request must be provided",
            ))
        }
    }
}

/// Variable filled from a dataset when the evaluator prompt is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceVariable {
    pub name: String,
    pub dataset_id: String,
}

/// Variable supplied by the caller at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVariable {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}
