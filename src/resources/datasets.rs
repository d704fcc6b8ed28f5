use futures::Stream;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::client::{Query, ScorableClient};
use crate::config::DATASET_UPLOAD_TIMEOUT_SECS;
use crate::error::{ScorableError, ScorableResult};
use crate::pagination::{paginate, Page};

const DATASETS_PATH: &str = "v1/datasets/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    #[default]
    Reference,
    Test,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<DatasetType>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A dataset registration, optionally uploading a local file.
#[derive(Debug, Clone, Default)]
pub struct CreateDataset {
    pub name: Option<String>,
    pub kind: DatasetType,
    pub file: Option<PathBuf>,
}

impl CreateDataset {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_kind(mut self, kind: DatasetType) -> Self {
        self.kind = kind;
        self
    }

    async fn into_form(self) -> ScorableResult<Form> {
        let mut form = Form::new().text("type", self.kind.as_str());
        if let Some(name) = self.name {
            form = form.text("name", name);
        }
        if let Some(path) = self.file {
            form = form.part("file", file_part(&path).await?);
        }
        Ok(form)
    }
}

async fn file_part(path: &Path) -> ScorableResult<Part> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ScorableError::config(format!("cannot read dataset file '{}': {}", path.display(), e))
    })?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset".to_string());
    Ok(Part::bytes(bytes).file_name(file_name))
}

pub struct Datasets<'a> {
    client: &'a ScorableClient,
}

impl<'a> Datasets<'a> {
    pub fn new(client: &'a ScorableClient) -> Self {
        Self { client }
    }

    /// Register a dataset, uploading its file when one is given.
    pub async fn create(&self, request: CreateDataset) -> ScorableResult<Dataset> {
        let form = request.into_form().await?;
        let dataset: Dataset = self
            .client
            .post_multipart(
                DATASETS_PATH,
                form,
                Duration::from_secs(DATASET_UPLOAD_TIMEOUT_SECS),
            )
            .await?;
        info!(dataset_id = %dataset.id, "Created dataset");
        Ok(dataset)
    }

    pub async fn get(&self, dataset_id: &str) -> ScorableResult<Dataset> {
        self.client
            .get(&format!("v1/datasets/{}/", dataset_id), &Query::new())
            .await
    }

    pub fn list(
        &self,
        search: Option<String>,
        limit: usize,
    ) -> impl Stream<Item = ScorableResult<Dataset>> + 'a {
        let client = self.client;
        paginate(
            move |cursor, page_size| {
                let query = Query::new()
                    .opt("search", search.as_deref())
                    .opt("cursor", cursor)
                    .set("page_size", page_size);
                async move { client.get::<Page<Dataset>>(DATASETS_PATH, &query).await }
            },
            limit,
        )
    }

    pub async fn delete(&self, dataset_id: &str) -> ScorableResult<()> {
        self.client
            .delete(&format!("v1/datasets/{}/", dataset_id))
            .await
    }
}
