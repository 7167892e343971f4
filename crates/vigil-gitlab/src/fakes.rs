//! In-memory fake of the pipeline API (testing only)
//!
//! `FakePipelineApi` satisfies [`crate::PipelineApi`] without any network
//! access, with switchable error injection for either endpoint.

use crate::client::{ApiError, ApiResult, PipelineApi};
use crate::model::{JobRecord, PipelineSummary};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory pipeline store with per-endpoint fault injection.
#[derive(Default)]
pub struct FakePipelineApi {
    pipelines: Mutex<Vec<PipelineSummary>>,
    jobs: Mutex<HashMap<i64, Vec<JobRecord>>>,
    pipelines_error: Mutex<Option<String>>,
    jobs_error: Mutex<Option<String>>,
    list_calls: AtomicUsize,
}

impl FakePipelineApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline together with its jobs.
    pub fn add_pipeline(&self, summary: PipelineSummary, jobs: Vec<JobRecord>) {
        self.jobs.lock().unwrap().insert(summary.id, jobs);
        self.pipelines.lock().unwrap().push(summary);
    }

    /// Make `list_pipelines` fail with a transport error.
    pub fn fail_pipelines(&self, reason: &str) {
        *self.pipelines_error.lock().unwrap() = Some(reason.to_string());
    }

    /// Make `list_jobs` fail with a transport error.
    pub fn fail_jobs(&self, reason: &str) {
        *self.jobs_error.lock().unwrap() = Some(reason.to_string());
    }

    /// Clear injected faults.
    pub fn heal(&self) {
        *self.pipelines_error.lock().unwrap() = None;
        *self.jobs_error.lock().unwrap() = None;
    }

    /// How many times `list_pipelines` has been called.
    pub fn list_call_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PipelineApi for FakePipelineApi {
    async fn list_pipelines(&self, limit: usize) -> ApiResult<Vec<PipelineSummary>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.pipelines_error.lock().unwrap().clone() {
            return Err(ApiError::Transport(reason));
        }
        let pipelines = self.pipelines.lock().unwrap();
        Ok(pipelines.iter().take(limit).cloned().collect())
    }

    async fn list_jobs(&self, pipeline_id: i64) -> ApiResult<Vec<JobRecord>> {
        if let Some(reason) = self.jobs_error.lock().unwrap().clone() {
            return Err(ApiError::Transport(reason));
        }
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs.get(&pipeline_id).cloned().unwrap_or_default())
    }
}
