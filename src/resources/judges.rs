//! Judges: named bundles of evaluators scoped to an intent.

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::Deref;
use tracing::info;

use crate::client::{Query, ScorableClient};
use crate::error::{ScorableError, ScorableResult};
use crate::pagination::{paginate, Page};
use crate::resources::ExecutionPayload;

const JUDGES_PATH: &str = "v1/judges/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorReference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judge {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub evaluator_references: Vec<EvaluatorReference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateJudge {
    pub name: String,
    pub intent: String,
    pub evaluator_references: Vec<EvaluatorReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub status: String,
}

impl CreateJudge {
    pub fn new(name: impl Into<String>, intent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intent: intent.into(),
            evaluator_references: Vec::new(),
            stage: None,
            status: "unlisted".to_string(),
        }
    }
}

/// PATCH body; only the fields that are set are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UpdateJudge {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    /// `Some(vec![])` clears the references.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator_references: Option<Vec<EvaluatorReference>>,
}

impl UpdateJudge {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.stage.is_none() && self.evaluator_references.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct JudgeListParams {
    pub search: Option<String>,
    pub name: Option<String>,
    pub ordering: Option<String>,
    pub is_preset: Option<bool>,
    pub is_public: Option<bool>,
    pub show_global: Option<bool>,
}

impl JudgeListParams {
    fn query(&self) -> Query {
        Query::new()
            .opt("search", self.search.as_deref())
            .opt("name", self.name.as_deref())
            .opt("ordering", self.ordering.as_deref())
            .opt("is_preset", self.is_preset)
            .opt("is_public", self.is_public)
            .opt("show_global", self.show_global)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[serde(rename = "global")]
    Public,
    #[default]
    Unlisted,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateJudge {
    pub intent: String,
    pub visibility: Visibility,
    /// Edit this judge instead of creating a new one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_contexts: Option<BTreeMap<String, Option<String>>>,
    pub strict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateJudgeResponse {
    #[serde(default)]
    pub judge_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeEvaluatorResult {
    #[serde(default)]
    pub evaluator_id: Option<String>,
    #[serde(default)]
    pub evaluator_name: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub justification: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeExecutionResult {
    #[serde(default)]
    pub evaluator_results: Vec<JudgeEvaluatorResult>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Chat-completions request for the OpenAI compatible endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct OpenAiChatRequest {
    pub model: String,
    pub messages: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_body: Option<Value>,
}

/// A judge snapshot together with the client that fetched it.
#[derive(Debug, Clone)]
pub struct BoundJudge {
    judge: Judge,
    client: ScorableClient,
}

impl BoundJudge {
    fn new(judge: Judge, client: &ScorableClient) -> Self {
        Self {
            judge,
            client: client.clone(),
        }
    }

    pub async fn run(&self, payload: &ExecutionPayload) -> ScorableResult<JudgeExecutionResult> {
        self.client.judges().execute(&self.judge.id, payload).await
    }

    pub fn into_inner(self) -> Judge {
        self.judge
    }
}

impl Deref for BoundJudge {
    type Target = Judge;

    fn deref(&self) -> &Judge {
        &self.judge
    }
}

pub struct Judges<'a> {
    client: &'a ScorableClient,
}

impl<'a> Judges<'a> {
    pub fn new(client: &'a ScorableClient) -> Self {
        Self { client }
    }

    /// Stream up to `limit` judges, following cursors.
    pub fn list(
        &self,
        params: JudgeListParams,
        limit: usize,
    ) -> impl Stream<Item = ScorableResult<Judge>> + 'a {
        let client = self.client;
        paginate(
            move |cursor, page_size| {
                let query = params
                    .query()
                    .opt("cursor", cursor)
                    .set("page_size", page_size);
                async move { client.get::<Page<Judge>>(JUDGES_PATH, &query).await }
            },
            limit,
        )
    }

    /// A single page, for callers that manage the cursor themselves.
    pub async fn list_page(
        &self,
        params: &JudgeListParams,
        cursor: Option<&str>,
        page_size: Option<u32>,
    ) -> ScorableResult<Page<Judge>> {
        let query = params
            .query()
            .opt("cursor", cursor)
            .opt("page_size", page_size);
        self.client.get(JUDGES_PATH, &query).await
    }

    pub async fn get(&self, judge_id: &str) -> ScorableResult<BoundJudge> {
        let judge: Judge = self
            .client
            .get(&format!("v1/judges/{}/", judge_id), &Query::new())
            .await?;
        Ok(BoundJudge::new(judge, self.client))
    }

    pub async fn create(&self, request: &CreateJudge) -> ScorableResult<BoundJudge> {
        let judge: Judge = self.client.post(JUDGES_PATH, &Query::new(), request).await?;
        info!(judge_id = %judge.id, name = %judge.name, "Created judge");
        Ok(BoundJudge::new(judge, self.client))
    }

    pub async fn update(&self, judge_id: &str, request: &UpdateJudge) -> ScorableResult<BoundJudge> {
        if request.is_empty() {
            return Err(ScorableError::config(
                "no update parameters provided; use --name, --stage or --evaluator-references",
            ));
        }
        let judge: Judge = self
            .client
            .patch(&format!("v1/judges/{}/", judge_id), request)
            .await?;
        Ok(BoundJudge::new(judge, self.client))
    }

    pub async fn delete(&self, judge_id: &str) -> ScorableResult<()> {
        self.client.delete(&format!("v1/judges/{}/", judge_id)).await?;
        info!(judge_id = %judge_id, "Deleted judge");
        Ok(())
    }

    pub async fn execute(
        &self,
        judge_id: &str,
        payload: &ExecutionPayload,
    ) -> ScorableResult<JudgeExecutionResult> {
        payload.validate()?;
        self.client
            .post(&format!("v1/judges/{}/execute/", judge_id), &Query::new(), payload)
            .await
    }

    pub async fn execute_by_name(
        &self,
        judge_name: &str,
        payload: &ExecutionPayload,
    ) -> ScorableResult<JudgeExecutionResult> {
        payload.validate()?;
        let query = Query::new().set("name", judge_name);
        self.client
            .post("v1/judges/execute/by-name/", &query, payload)
            .await
    }

    pub async fn duplicate(&self, judge_id: &str) -> ScorableResult<BoundJudge> {
        let judge: Judge = self
            .client
            .post_empty(&format!("v1/judges/{}/duplicate/", judge_id))
            .await?;
        info!(source_id = %judge_id, judge_id = %judge.id, "Duplicated judge");
        Ok(BoundJudge::new(judge, self.client))
    }

    pub async fn generate(&self, request: &GenerateJudge) -> ScorableResult<GenerateJudgeResponse> {
        self.client
            .post("v1/judges/generate/", &Query::new(), request)
            .await
    }

    /// With `judge_id` the judge is addressed by path; without it the
    /// generic endpoint resolves the judge from the `model` field.
    pub async fn execute_openai(
        &self,
        judge_id: Option<&str>,
        request: &OpenAiChatRequest,
    ) -> ScorableResult<Value> {
        let path = match judge_id {
            Some(id) => format!("v1/judges/{}/openai/chat/completions/", id),
            None => "v1/judges/openai/chat/completions/".to_string(),
        };
        self.client.post(&path, &Query::new(), request).await
    }
}
