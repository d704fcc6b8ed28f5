//! Logs the service keeps for every judge and evaluator execution.

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{Query, ScorableClient};
use crate::error::{ScorableError, ScorableResult};
use crate::pagination::{paginate, Page};

use super::evaluators::EvaluatorExecutionResult;

const EXECUTION_LOGS_PATH: &str = "v1/execution-logs/";

#[derive(Debug, Clone, Default)]
pub struct ExecutionLogListParams {
    /// Free-text filter, e.g. an evaluator id or name.
    pub search: Option<String>,
    pub tags: Vec<String>,
    /// Extra fields to include in each entry.
    pub include: Vec<String>,
}

impl ExecutionLogListParams {
    fn query(&self) -> Query {
        let joined = |v: &[String]| (!v.is_empty()).then(|| v.join(","));
        Query::new()
            .opt("search", self.search.as_deref())
            .opt("tags", joined(&self.tags))
            .opt("include", joined(&self.include))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct ExecutionLogs<'a> {
    client: &'a ScorableClient,
}

impl<'a> ExecutionLogs<'a> {
    pub fn new(client: &'a ScorableClient) -> Self {
        Self { client }
    }

    pub fn list(
        &self,
        params: ExecutionLogListParams,
        limit: usize,
    ) -> impl Stream<Item = ScorableResult<ExecutionLog>> + 'a {
        let client = self.client;
        paginate(
            move |cursor, page_size| {
                let query = params
                    .query()
                    .opt("cursor", cursor)
                    .set("page_size", page_size);
                async move {
                    client
                        .get::<Page<ExecutionLog>>(EXECUTION_LOGS_PATH, &query)
                        .await
                }
            },
            limit,
        )
    }

    pub async fn get(&self, log_id: &str) -> ScorableResult<ExecutionLog> {
        self.client
            .get(&format!("v1/execution-logs/{}/", log_id), &Query::new())
            .await
    }

    /// Follow up on an evaluator run through the log id it returned.
    pub async fn for_result(&self, result: &EvaluatorExecutionResult) -> ScorableResult<ExecutionLog> {
        match result.execution_log_id.as_deref() {
            Some(id) => self.get(id).await,
            None => Err(ScorableError::config(
                "execution result carries no execution_log_id",
            )),
        }
    }
}
