//! Pipeline API trait and GitLab-backed client.
//!
//! All parsing happens here, at the boundary, into the typed models in
//! [`crate::model`]; nothing downstream ever pattern-matches raw text.

use crate::model::{JobRecord, PipelineSummary};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use vigil_core::TargetContext;

/// Jobs fetched per page.
const JOBS_PER_PAGE: usize = 100;

/// Upper bound on the pagination walk; anything past this is logged and
/// dropped rather than fetched forever.
const MAX_JOB_PAGES: usize = 10;

/// Errors from the remote pipeline API.
///
/// `Transport` and `Decode` carry Indeterminate semantics for the
/// inspector: the same "system still initializing" condition that trips
/// readiness probes also produces refused connections and half-formed
/// responses here.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Connection failure, timeout, or any other transport problem
    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The response body did not match the expected shape
    #[error("malformed API response: {0}")]
    Decode(String),

    /// The configured token cannot be sent as a header value
    #[error("API token contains characters that cannot be sent in a header")]
    InvalidToken,
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Convenience result alias for API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// The two operations the inspector needs from a pipeline-tracking
/// system.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Most recent pipelines for the project, newest first requested.
    async fn list_pipelines(&self, limit: usize) -> ApiResult<Vec<PipelineSummary>>;

    /// Every job of one pipeline.
    async fn list_jobs(&self, pipeline_id: i64) -> ApiResult<Vec<JobRecord>>;
}

// Shared handles count as implementations so an inspector and its
// caller can hold the same API instance.
#[async_trait]
impl<T: PipelineApi + ?Sized> PipelineApi for std::sync::Arc<T> {
    async fn list_pipelines(&self, limit: usize) -> ApiResult<Vec<PipelineSummary>> {
        (**self).list_pipelines(limit).await
    }

    async fn list_jobs(&self, pipeline_id: i64) -> ApiResult<Vec<JobRecord>> {
        (**self).list_jobs(pipeline_id).await
    }
}

/// GitLab REST client scoped to one project.
pub struct GitLabClient {
    base_url: String,
    project_id: u64,
    client: reqwest::Client,
}

impl GitLabClient {
    /// Build a client for the project on the context's host, sending the
    /// context's token as `PRIVATE-TOKEN` when present.
    pub fn new(ctx: &TargetContext, project_id: u64) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &ctx.api_token {
            let value = HeaderValue::from_str(token).map_err(|_| ApiError::InvalidToken)?;
            headers.insert("PRIVATE-TOKEN", value);
        }

        let client = reqwest::Client::builder()
            .user_agent("vigil/0.2")
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(ctx.connect_timeout_secs))
            .timeout(Duration::from_secs(ctx.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Ok(Self {
            base_url: ctx.base_url(),
            project_id,
            client,
        })
    }

    /// Client for an explicit base URL (tests, non-default ports).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn project_url(&self, tail: &str) -> String {
        format!(
            "{}/api/v4/projects/{}/{}",
            self.base_url, self.project_id, tail
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> ApiResult<T> {
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

#[async_trait]
impl PipelineApi for GitLabClient {
    async fn list_pipelines(&self, limit: usize) -> ApiResult<Vec<PipelineSummary>> {
        // Descending id is requested explicitly; the inspector still
        // sorts by created_at on its side.
        let url = self.project_url(&format!(
            "pipelines?per_page={}&order_by=id&sort=desc",
            limit
        ));
        self.get_json(&url).await
    }

    async fn list_jobs(&self, pipeline_id: i64) -> ApiResult<Vec<JobRecord>> {
        let mut jobs: Vec<JobRecord> = Vec::new();

        for page in 1..=MAX_JOB_PAGES {
            let url = self.project_url(&format!(
                "pipelines/{}/jobs?per_page={}&page={}",
                pipeline_id, JOBS_PER_PAGE, page
            ));
            let batch: Vec<JobRecord> = self.get_json(&url).await?;
            let batch_len = batch.len();
            jobs.extend(batch);

            if batch_len < JOBS_PER_PAGE {
                return Ok(jobs);
            }
        }

        warn!(
            pipeline_id,
            fetched = jobs.len(),
            "job listing truncated after {} pages",
            MAX_JOB_PAGES
        );
        Ok(jobs)
    }
}
