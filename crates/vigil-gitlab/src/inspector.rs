//! Latest-pipeline inspection and job classification.
//!
//! Turns the raw job list of the most recent pipeline into actionable
//! diagnostic hints, most actionable first. A missing runner is the
//! single most common root cause after fresh provisioning, so it ranks
//! above everything else.

use crate::client::PipelineApi;
use crate::model::{JobRecord, JobStatus, PipelineRecord};
use serde::{Deserialize, Serialize};
use tracing::info;
use vigil_core::HealthStatus;

/// Whether the inspector could see the remote data at all.
///
/// "The API said there are no pipelines" and "the API could not be
/// asked" are different answers; conflating them hides a booting or
/// misconfigured server behind an innocent-looking empty result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum DataAvailability {
    /// Pipeline and job data were retrieved.
    Complete,

    /// The listing succeeded and the project has no pipelines.
    NoPipelines,

    /// Could not retrieve pipeline data; retryable.
    Unavailable(String),
}

/// What kind of problem a hint points at; lower rank sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKind {
    /// A job is pending with no runner picked up.
    MissingRunner,

    /// A job failed with a reported reason.
    JobFailed,

    /// The remote system flagged the job as stuck.
    StuckJob,
}

impl HintKind {
    fn rank(&self) -> u8 {
        match self {
            HintKind::MissingRunner => 0,
            HintKind::JobFailed => 1,
            HintKind::StuckJob => 2,
        }
    }
}

/// One actionable diagnostic derived from a job's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticHint {
    /// Problem category.
    pub kind: HintKind,

    /// Job the hint refers to.
    pub job_id: i64,

    /// Name of that job.
    pub job_name: String,

    /// Operator-facing message.
    pub message: String,
}

/// Result of inspecting the latest pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionReport {
    /// Whether remote data could be retrieved.
    pub availability: DataAvailability,

    /// The inspected pipeline, when one was found.
    pub pipeline: Option<PipelineRecord>,

    /// Ranked diagnostic hints, most actionable first.
    pub hints: Vec<DiagnosticHint>,
}

impl InspectionReport {
    fn unavailable(reason: String) -> Self {
        Self {
            availability: DataAvailability::Unavailable(reason),
            pipeline: None,
            hints: Vec::new(),
        }
    }

    /// Whether polling can stop: data was retrieved and the pipeline has
    /// reached a terminal state (or the project has none to wait for).
    pub fn is_conclusive(&self) -> bool {
        match &self.availability {
            DataAvailability::NoPipelines => true,
            DataAvailability::Unavailable(_) => false,
            DataAvailability::Complete => self
                .pipeline
                .as_ref()
                .map(|p| p.status.is_terminal())
                .unwrap_or(false),
        }
    }

    /// Overall verdict for exit-code mapping.
    ///
    /// Unavailable data is Unhealthy: by the time this is read the retry
    /// budget is spent and "could not tell" is a critical answer.
    pub fn status(&self) -> HealthStatus {
        match &self.availability {
            DataAvailability::Unavailable(_) => HealthStatus::Unhealthy,
            DataAvailability::NoPipelines => HealthStatus::Warning,
            DataAvailability::Complete => {
                let Some(pipeline) = &self.pipeline else {
                    return HealthStatus::Unhealthy;
                };
                let failed = pipeline.count_with_status(JobStatus::Failed)
                    + pipeline.count_with_status(JobStatus::Stuck);
                if failed > 0 {
                    HealthStatus::Unhealthy
                } else if pipeline.jobs.iter().all(|j| j.status == JobStatus::Success) {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Warning
                }
            }
        }
    }
}

/// Classify each job into its diagnostic bucket.
///
/// Running, successful and canceled jobs are informational only and
/// produce no hint.
pub fn classify_jobs(jobs: &[JobRecord]) -> Vec<DiagnosticHint> {
    let mut hints: Vec<DiagnosticHint> = Vec::new();

    for job in jobs {
        match job.status {
            JobStatus::Pending if job.runner_id().is_none() => hints.push(DiagnosticHint {
                kind: HintKind::MissingRunner,
                job_id: job.id,
                job_name: job.name.clone(),
                message: format!(
                    "job '{}' is pending with no runner assigned; check runner registration, tags and locked flag",
                    job.name
                ),
            }),
            JobStatus::Failed => {
                let reason = job
                    .failure_reason
                    .as_deref()
                    .unwrap_or("no failure reason reported");
                hints.push(DiagnosticHint {
                    kind: HintKind::JobFailed,
                    job_id: job.id,
                    job_name: job.name.clone(),
                    message: format!("job '{}' failed: {}", job.name, reason),
                });
            }
            JobStatus::Stuck => hints.push(DiagnosticHint {
                kind: HintKind::StuckJob,
                job_id: job.id,
                job_name: job.name.clone(),
                message: format!(
                    "job '{}' is stuck; check runner availability or configuration",
                    job.name
                ),
            }),
            _ => {}
        }
    }

    hints.sort_by_key(|h| h.kind.rank());
    hints
}

/// Fetches the latest pipeline of a project and derives an
/// [`InspectionReport`].
pub struct PipelineInspector<A: PipelineApi> {
    api: A,
    fetch_limit: usize,
}

impl<A: PipelineApi> PipelineInspector<A> {
    /// Inspector fetching up to 20 recent pipelines per look.
    pub fn new(api: A) -> Self {
        Self {
            api,
            fetch_limit: 20,
        }
    }

    /// Override how many recent pipelines are fetched for the
    /// client-side recency sort.
    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit.max(1);
        self
    }

    /// Inspect the most recent pipeline.
    ///
    /// API failures produce an Unavailable report instead of an error:
    /// the caller's retry loop treats them exactly like a not-ready
    /// probe.
    pub async fn inspect_latest(&self) -> InspectionReport {
        let mut pipelines = match self.api.list_pipelines(self.fetch_limit).await {
            Ok(pipelines) => pipelines,
            Err(err) => {
                return InspectionReport::unavailable(format!(
                    "could not retrieve pipeline data: {}",
                    err
                ));
            }
        };

        if pipelines.is_empty() {
            return InspectionReport {
                availability: DataAvailability::NoPipelines,
                pipeline: None,
                hints: Vec::new(),
            };
        }

        // Recency is decided here, not by the server's listing order.
        pipelines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let latest = pipelines.remove(0);

        let jobs = match self.api.list_jobs(latest.id).await {
            Ok(jobs) => jobs,
            Err(err) => {
                return InspectionReport {
                    availability: DataAvailability::Unavailable(format!(
                        "could not retrieve jobs for pipeline {}: {}",
                        latest.id, err
                    )),
                    pipeline: Some(PipelineRecord::assemble(latest, Vec::new())),
                    hints: Vec::new(),
                };
            }
        };

        let record = PipelineRecord::assemble(latest, jobs);
        let hints = classify_jobs(&record.jobs);

        info!(
            pipeline = record.id,
            status = %record.status,
            jobs = record.jobs.len(),
            hints = hints.len(),
            "pipeline inspected"
        );

        InspectionReport {
            availability: DataAvailability::Complete,
            pipeline: Some(record),
            hints,
        }
    }
}
