//! HTTP transport for the Scorable API.
//!
//! Every request carries the `Api-Key` authorization header, goes to a path
//! relative to the configured base URL, and has its status classified into a
//! [`ScorableError`] before the body is decoded.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::multipart::Form;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{ClientConfig, DEMO_USER_TIMEOUT_SECS};
use crate::error::{ScorableError, ScorableResult};
use crate::resources::datasets::Datasets;
use crate::resources::evaluators::Evaluators;
use crate::resources::execution_logs::ExecutionLogs;
use crate::resources::judges::Judges;
use crate::resources::objectives::Objectives;
use crate::resources::prompt_tests::PromptTests;

pub const USER_AGENT_VALUE: &str = concat!("scorable-cli/", env!("CARGO_PKG_VERSION"));

/// Query string builder that silently drops unset parameters.
#[derive(Debug, Clone, Default)]
pub struct Query(Vec<(&'static str, String)>);

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &'static str, value: impl ToString) -> Self {
        self.0.push((key, value.to_string()));
        self
    }

    pub fn opt<V: ToString>(self, key: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn pairs(&self) -> &[(&'static str, String)] {
        &self.0
    }
}

/// Authenticated client; cheap to clone.
#[derive(Debug, Clone)]
pub struct ScorableClient {
    http: reqwest::Client,
    base_url: String,
}

impl ScorableClient {
    pub fn new(config: ClientConfig) -> ScorableResult<Self> {
        let mut auth = HeaderValue::from_str(&format!("Api-Key {}", config.api_key))
            .map_err(|_| ScorableError::config("API key contains invalid header characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| ScorableError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: config.normalized_base_url().to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn judges(&self) -> Judges<'_> {
        Judges::new(self)
    }

    pub fn evaluators(&self) -> Evaluators<'_> {
        Evaluators::new(self)
    }

    pub fn datasets(&self) -> Datasets<'_> {
        Datasets::new(self)
    }

    pub fn execution_logs(&self) -> ExecutionLogs<'_> {
        ExecutionLogs::new(self)
    }

    pub fn objectives(&self) -> Objectives<'_> {
        Objectives::new(self)
    }

    pub fn prompt_tests(&self) -> PromptTests<'_> {
        PromptTests::new(self)
    }

    /// The service routes every endpoint with a trailing slash.
    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.ends_with('/') {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/{}/", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str, query: &Query) -> RequestBuilder {
        let url = self.url(path);
        debug!(method = %method, url = %url, "scorable request");
        let builder = self.http.request(method, url);
        if query.pairs().is_empty() {
            builder
        } else {
            builder.query(query.pairs())
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &Query) -> ScorableResult<T> {
        let response = send(self.request(Method::GET, path, query)).await?;
        decode(response).await
    }

    pub async fn post<B, T>(&self, path: &str, query: &Query, body: &B) -> ScorableResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = send(self.request(Method::POST, path, query).json(body)).await?;
        decode(response).await
    }

    /// POST without a request body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ScorableResult<T> {
        let response = send(self.request(Method::POST, path, &Query::new())).await?;
        decode(response).await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> ScorableResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = send(self.request(Method::PATCH, path, &Query::new()).json(body)).await?;
        decode(response).await
    }

    /// POST a multipart form with its own timeout (file uploads outlast the
    /// client default).
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
        timeout: Duration,
    ) -> ScorableResult<T> {
        let builder = self
            .request(Method::POST, path, &Query::new())
            .multipart(form)
            .timeout(timeout);
        let response = send(builder).await?;
        decode(response).await
    }

    pub async fn delete(&self, path: &str) -> ScorableResult<()> {
        send(self.request(Method::DELETE, path, &Query::new())).await?;
        Ok(())
    }
}

/// Send and classify: non-2xx becomes `RequestFailed` carrying the raw body.
async fn send(builder: RequestBuilder) -> ScorableResult<reqwest::Response> {
    let response = builder.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ScorableError::RequestFailed {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ScorableResult<T> {
    let status = response.status();
    let url = response.url().to_string();
    let text = response.text().await?;

    // 204 and empty bodies decode as JSON null so `()` / `Option<_>` targets work.
    let text = if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
        "null".to_string()
    } else {
        text
    };

    serde_json::from_str(&text).map_err(|e| ScorableError::InvalidResponse {
        message: format!("failed to decode response from {}: {}", url, e),
    })
}

#[derive(Debug, Deserialize)]
struct DemoUser {
    api_key: Option<String>,
}

/// Ask the service for a temporary demo key. Unauthenticated.
pub async fn create_demo_user(base_url: &str) -> ScorableResult<String> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(DEMO_USER_TIMEOUT_SECS))
        .build()
        .map_err(|e| ScorableError::Network {
            message: format!("failed to create HTTP client: {}", e),
        })?;

    let url = format!("{}/create-demo-user/", base_url.trim_end_matches('/'));
    let response = send(http.post(url).header(USER_AGENT, USER_AGENT_VALUE)).await?;
    let user: DemoUser = decode(response).await?;
    user.api_key.ok_or_else(|| ScorableError::InvalidResponse {
        message: "temporary key response did not include 'api_key'".to_string(),
    })
}
