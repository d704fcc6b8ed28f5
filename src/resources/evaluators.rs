//! Evaluators: single scoring units producing a score in [0, 1].

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Deref;
use tracing::{debug, info};

use crate::calibration::{CalibrationDefinition, CalibrationOutput, DatasetSpec};
use crate::client::{Query, ScorableClient};
use crate::error::{ScorableError, ScorableResult};
use crate::pagination::{paginate, Page};
use crate::presets::PresetEvaluator;
use crate::resources::objectives::ObjectiveRequest;
use crate::resources::{ExecutionPayload, InputVariable, ModelParams, ReferenceVariable};

const EVALUATORS_PATH: &str = "v1/evaluators/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluator {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub objective_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorExecutionResult {
    #[serde(default)]
    pub evaluator_name: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(default)]
    pub execution_log_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A scored example used to steer an evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorDemonstration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    pub response: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateEvaluator {
    pub predicate: String,
    /// Defaults to `<unnamed>`.
    pub name: Option<String>,
    /// Objective intent, defaulting to the name. Not allowed with `objective_id`.
    pub intent: Option<String>,
    pub objective_id: Option<String>,
    pub model: Option<String>,
    pub fallback_models: Vec<String>,
    pub reference_variables: Vec<ReferenceVariable>,
    pub input_variables: Vec<InputVariable>,
    pub model_params: Option<ModelParams>,
    pub demonstrations: Vec<EvaluatorDemonstration>,
    pub overwrite: bool,
}

impl CreateEvaluator {
    pub fn new(predicate: impl Into<String>) -> Self {
        Self {
            predicate: predicate.into(),
            ..Self::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct EvaluatorRequest<'a> {
    name: &'a str,
    objective_id: &'a str,
    prompt: &'a str,
    models: Vec<String>,
    reference_variables: &'a [ReferenceVariable],
    input_variables: &'a [InputVariable],
    #[serde(skip_serializing_if = "Option::is_none")]
    model_params: Option<&'a ModelParams>,
    evaluator_demonstrations: &'a [EvaluatorDemonstration],
    overwrite: bool,
}

/// PATCH body; unset fields are left untouched on the service.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateEvaluator {
    pub change_note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "prompt", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_variables: Option<Vec<ReferenceVariable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_variables: Option<Vec<InputVariable>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_params: Option<ModelParams>,
    #[serde(rename = "evaluator_demonstrations", skip_serializing_if = "Option::is_none")]
    pub demonstrations: Option<Vec<EvaluatorDemonstration>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EvaluatorListParams {
    pub search: Option<String>,
    pub name: Option<String>,
    pub only_root_evaluators: bool,
}

impl EvaluatorListParams {
    fn query(&self) -> Query {
        Query::new()
            .opt("search", self.search.as_deref())
            .opt("name", self.name.as_deref())
            .opt("is_root_evaluator", self.only_root_evaluators.then_some(true))
    }
}

/// Calibration of an evaluator definition that does not exist yet.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationRequest {
    pub name: String,
    #[serde(flatten)]
    pub dataset: DatasetSpec,
    pub prompt: String,
    pub models: Vec<String>,
    pub is_evaluator: bool,
    pub pii_filter: bool,
    pub objective: ObjectiveRequest,
    pub reference_variables: Vec<ReferenceVariable>,
    pub input_variables: Vec<InputVariable>,
}

impl CalibrationRequest {
    pub fn for_definition(definition: &CalibrationDefinition, dataset: &DatasetSpec) -> Self {
        Self {
            name: definition.name.clone(),
            dataset: dataset.clone(),
            prompt: definition.prompt.clone(),
            models: vec![definition.model.clone()],
            is_evaluator: true,
            pii_filter: definition.pii_filter,
            objective: ObjectiveRequest::intent("Calibration"),
            reference_variables: definition.reference_variables.clone(),
            input_variables: definition.input_variables.clone(),
        }
    }
}

/// An evaluator snapshot together with the client that fetched it.
#[derive(Debug, Clone)]
pub struct BoundEvaluator {
    evaluator: Evaluator,
    client: ScorableClient,
}

impl BoundEvaluator {
    fn new(evaluator: Evaluator, client: &ScorableClient) -> Self {
        Self {
            evaluator,
            client: client.clone(),
        }
    }

    /// Run this exact version of the evaluator.
    pub async fn run(&self, payload: &ExecutionPayload) -> ScorableResult<EvaluatorExecutionResult> {
        let mut payload = payload.clone();
        if payload.evaluator_version_id.is_none() {
            payload.evaluator_version_id = self.evaluator.version_id.clone();
        }
        self.client
            .evaluators()
            .run(&self.evaluator.id, &payload)
            .await
    }

    pub fn into_inner(self) -> Evaluator {
        self.evaluator
    }
}

impl Deref for BoundEvaluator {
    type Target = Evaluator;

    fn deref(&self) -> &Evaluator {
        &self.evaluator
    }
}

/// Runs one preset evaluator, optionally pinned to a version.
#[derive(Debug, Clone)]
pub struct PresetRunner<'a> {
    client: &'a ScorableClient,
    preset: PresetEvaluator,
    version_id: Option<String>,
}

impl PresetRunner<'_> {
    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    pub fn preset(&self) -> PresetEvaluator {
        self.preset
    }

    pub async fn run(&self, payload: &ExecutionPayload) -> ScorableResult<EvaluatorExecutionResult> {
        let mut payload = payload.clone();
        if self.version_id.is_some() {
            payload.evaluator_version_id = self.version_id.clone();
        }
        self.client
            .evaluators()
            .run(self.preset.id(), &payload)
            .await
    }
}

pub struct Evaluators<'a> {
    client: &'a ScorableClient,
}

impl<'a> Evaluators<'a> {
    pub fn new(client: &'a ScorableClient) -> Self {
        Self { client }
    }

    pub fn preset(&self, preset: PresetEvaluator) -> PresetRunner<'a> {
        PresetRunner {
            client: self.client,
            preset,
            version_id: None,
        }
    }

    /// Stream up to `limit` evaluators, following cursors.
    pub fn list(
        &self,
        params: EvaluatorListParams,
        limit: usize,
    ) -> impl Stream<Item = ScorableResult<Evaluator>> + 'a {
        let client = self.client;
        paginate(
            move |cursor, page_size| {
                let query = params
                    .query()
                    .opt("cursor", cursor)
                    .set("page_size", page_size);
                async move {
                    client
                        .get::<Page<Evaluator>>(EVALUATORS_PATH, &query)
                        .await
                }
            },
            limit,
        )
    }

    pub async fn get(&self, evaluator_id: &str) -> ScorableResult<BoundEvaluator> {
        let evaluator: Evaluator = self
            .client
            .get(&format!("v1/evaluators/{}/", evaluator_id), &Query::new())
            .await?;
        Ok(BoundEvaluator::new(evaluator, self.client))
    }

    /// Only meaningful for uniquely named evaluators.
    pub async fn get_by_name(&self, name: &str) -> ScorableResult<BoundEvaluator> {
        let params = EvaluatorListParams {
            name: Some(name.to_string()),
            ..Default::default()
        };
        let first = Box::pin(self.list(params, 1)).next().await.transpose()?;
        match first {
            Some(found) => self.get(&found.id).await,
            None => Err(ScorableError::NotFound {
                resource: format!("evaluator named '{}'", name),
            }),
        }
    }

    pub async fn create(&self, request: &CreateEvaluator) -> ScorableResult<BoundEvaluator> {
        if request.objective_id.is_some() && request.intent.as_deref().is_some_and(|i| !i.is_empty())
        {
            return Err(ScorableError::config(
                "supplying both objective_id and intent is not supported",
            ));
        }
        let name = request.name.as_deref().unwrap_or("<unnamed>");

        let objective_id = match &request.objective_id {
            Some(id) => id.clone(),
            None => {
                let intent = request.intent.as_deref().unwrap_or(name);
                let objective = self
                    .client
                    .objectives()
                    .create(&ObjectiveRequest::intent(intent))
                    .await?;
                debug!(objective_id = %objective.id, "Created objective for evaluator");
                objective.id
            }
        };

        let models = request
            .model
            .iter()
            .chain(request.fallback_models.iter())
            .cloned()
            .collect();

        let body = EvaluatorRequest {
            name,
            objective_id: &objective_id,
            prompt: &request.predicate,
            models,
            reference_variables: &request.reference_variables,
            input_variables: &request.input_variables,
            model_params: request.model_params.as_ref(),
            evaluator_demonstrations: &request.demonstrations,
            overwrite: request.overwrite,
        };
        let evaluator: Evaluator = self
            .client
            .post(EVALUATORS_PATH, &Query::new(), &body)
            .await?;
        info!(evaluator_id = %evaluator.id, name = %evaluator.name, "Created evaluator");
        Ok(BoundEvaluator::new(evaluator, self.client))
    }

    /// Every stored version of an evaluator, newest first as the service
    /// orders them.
    pub async fn versions(&self, evaluator_id: &str) -> ScorableResult<Page<Evaluator>> {
        self.client
            .get(&format!("v1/evaluators/versions/{}/", evaluator_id), &Query::new())
            .await
    }

    pub async fn update(
        &self,
        evaluator_id: &str,
        request: &UpdateEvaluator,
    ) -> ScorableResult<BoundEvaluator> {
        let evaluator: Evaluator = self
            .client
            .patch(&format!("v1/evaluators/{}/", evaluator_id), request)
            .await?;
        Ok(BoundEvaluator::new(evaluator, self.client))
    }

    pub async fn delete(&self, evaluator_id: &str) -> ScorableResult<()> {
        self.client
            .delete(&format!("v1/evaluators/{}/", evaluator_id))
            .await?;
        info!(evaluator_id = %evaluator_id, "Deleted evaluator");
        Ok(())
    }

    pub async fn run(
        &self,
        evaluator_id: &str,
        payload: &ExecutionPayload,
    ) -> ScorableResult<EvaluatorExecutionResult> {
        payload.validate()?;
        self.client
            .post(
                &format!("v1/evaluators/execute/{}/", evaluator_id),
                &Query::new(),
                payload,
            )
            .await
    }

    pub async fn run_by_name(
        &self,
        name: &str,
        payload: &ExecutionPayload,
    ) -> ScorableResult<EvaluatorExecutionResult> {
        payload.validate()?;
        let query = Query::new().set("name", name);
        self.client
            .post("v1/evaluators/execute/by-name/", &query, payload)
            .await
    }

    pub async fn calibrate(
        &self,
        request: &CalibrationRequest,
    ) -> ScorableResult<Vec<CalibrationOutput>> {
        self.client
            .post("v1/evaluators/calibrate/", &Query::new(), request)
            .await
    }

    /// Run a calibration set against an evaluator that already exists.
    pub async fn calibrate_existing(
        &self,
        evaluator_id: &str,
        dataset: &DatasetSpec,
    ) -> ScorableResult<Vec<CalibrationOutput>> {
        self.client
            .post(
                &format!("v1/evaluators/calibrate/{}/", evaluator_id),
                &Query::new(),
                dataset,
            )
            .await
    }
}
