//! HTTP client for the review API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

use super::types::{queue_params, runs_params, CreatedQueue, NewAnnotation, NewQueue, QueuePage, RunsPage};
use super::ApiError;
use crate::config::Settings;
use crate::listing::ListQuery;
use crate::models::{FilterData, QueueId, QueuesListing};

/// Persists annotation edits. Implemented by [`ApiClient`]; tests swap in fakes.
#[async_trait]
pub trait AnnotationWriter: Send + Sync {
    async fn write_annotation(&self, annotation: &NewAnnotation) -> Result<(), ApiError>;
}

/// Client for `/api/runs`, `/api/queues`, `/api/annotations` and `/api/filter_data`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, ApiError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        // Joined paths must land under the base path, not replace its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        Ok(Self { base_url, client })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(
            &settings.api_url,
            Duration::from_secs(settings.request_timeout),
            &settings.user_agent,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    /// List one page of runs.
    pub async fn list_runs(&self, query: &ListQuery) -> Result<RunsPage, ApiError> {
        let url = self.endpoint("api/runs")?;
        debug!("GET {} page={} size={}", url, query.page, query.page_size);
        self.send(self.client.get(url).query(&runs_params(query)))
            .await
    }

    /// One page of a queue's runs.
    pub async fn get_queue(&self, id: &QueueId, query: &ListQuery) -> Result<QueuePage, ApiError> {
        let path = format!("api/queues/{}", urlencoding::encode(&id.as_key()));
        let url = self.endpoint(&path)?;
        debug!("GET {} page={} size={}", url, query.page, query.page_size);
        self.send(self.client.get(url).query(&queue_params(query)))
            .await
    }

    pub async fn list_queues(&self) -> Result<QueuesListing, ApiError> {
        let url = self.endpoint("api/queues")?;
        debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    /// Create a queue and return its id.
    pub async fn create_queue(&self, queue: &NewQueue) -> Result<QueueId, ApiError> {
        let url = self.endpoint("api/queues")?;
        info!("Creating queue '{}'", queue.name);
        let created: CreatedQueue = self.post(url, queue).await?;
        info!("Created queue {}", created.queue_id);
        Ok(created.queue_id)
    }

    /// Write the viewer's annotation. Returns the server's response body.
    pub async fn create_annotation(&self, annotation: &NewAnnotation) -> Result<Value, ApiError> {
        let url = self.endpoint("api/annotations")?;
        info!(
            "Saving annotation for run {}: {}",
            annotation.run_id, annotation.judgement
        );
        self.post(url, annotation).await
    }

    /// Organizations and courses for the filter pickers.
    pub async fn filter_data(&self) -> Result<FilterData, ApiError> {
        let url = self.endpoint("api/filter_data")?;
        debug!("GET {}", url);
        self.send(self.client.get(url)).await
    }

    async fn post<B, T>(&self, url: Url, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {}", url);
        self.send(self.client.post(url).json(body)).await
    }

    /// Send a request and decode the body. Non-2xx responses and
    /// `{"error": ...}` payloads both become errors.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ApiError::Connection(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Connection(e.to_string()))?;
        let value: Option<Value> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = value
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| body.trim().to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let value = value.ok_or_else(|| ApiError::Parse(format!("Response is not JSON: {}", truncate(&body))))?;
        if let Some(message) = error_message(&value) {
            return Err(ApiError::Server(message));
        }
        serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl AnnotationWriter for ApiClient {
    async fn write_annotation(&self, annotation: &NewAnnotation) -> Result<(), ApiError> {
        self.create_annotation(annotation).await.map(|_| ())
    }
}

fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn truncate(body: &str) -> &str {
    let mut end = body.len().min(200);
    while end > 0 && !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
