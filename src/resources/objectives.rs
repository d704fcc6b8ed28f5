use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{Query, ScorableClient};
use crate::error::ScorableResult;
use crate::pagination::{paginate, Page};

const OBJECTIVES_PATH: &str = "v1/objectives/";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl ObjectiveRequest {
    pub fn intent(intent: impl Into<String>) -> Self {
        Self {
            intent: Some(intent.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    pub id: String,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub struct Objectives<'a> {
    client: &'a ScorableClient,
}

impl<'a> Objectives<'a> {
    pub fn new(client: &'a ScorableClient) -> Self {
        Self { client }
    }

    pub async fn create(&self, request: &ObjectiveRequest) -> ScorableResult<Objective> {
        self.client
            .post(OBJECTIVES_PATH, &Query::new(), request)
            .await
    }

    pub async fn get(&self, objective_id: &str) -> ScorableResult<Objective> {
        self.client
            .get(&format!("v1/objectives/{}/", objective_id), &Query::new())
            .await
    }

    pub fn list(&self, limit: usize) -> impl Stream<Item = ScorableResult<Objective>> + 'a {
        let client = self.client;
        paginate(
            move |cursor, page_size| {
                let query = Query::new()
                    .opt("cursor", cursor)
                    .set("page_size", page_size);
                async move { client.get::<Page<Objective>>(OBJECTIVES_PATH, &query).await }
            },
            limit,
        )
    }

    pub async fn delete(&self, objective_id: &str) -> ScorableResult<()> {
        self.client
            .delete(&format!("v1/objectives/{}/", objective_id))
            .await
    }
}
