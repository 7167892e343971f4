//! Pipeline and job domain types.
//!
//! These mirror the fields the poller actually reads from the remote
//! API; everything else in the wire payload is ignored at
//! deserialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a whole pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Created,
    WaitingForResource,
    Preparing,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Scheduled,
    /// Any status this version does not know about.
    #[serde(other)]
    Unknown,
}

impl PipelineStatus {
    /// Whether the remote system will not change this status anymore.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Success
                | PipelineStatus::Failed
                | PipelineStatus::Canceled
                | PipelineStatus::Skipped
        )
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            PipelineStatus::Created => "created",
            PipelineStatus::WaitingForResource => "waiting_for_resource",
            PipelineStatus::Preparing => "preparing",
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Success => "success",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Canceled => "canceled",
            PipelineStatus::Skipped => "skipped",
            PipelineStatus::Manual => "manual",
            PipelineStatus::Scheduled => "scheduled",
            PipelineStatus::Unknown => "unknown",
        };
        f.pad(word)
    }
}

/// Status of a single job within a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    Manual,
    Stuck,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether the job will not change state anymore.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Failed | JobStatus::Canceled | JobStatus::Skipped
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            JobStatus::Created => "created",
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
            JobStatus::Skipped => "skipped",
            JobStatus::Manual => "manual",
            JobStatus::Stuck => "stuck",
            JobStatus::Unknown => "unknown",
        };
        f.pad(word)
    }
}

/// The runner a job was assigned to, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerInfo {
    /// Runner identifier.
    pub id: i64,

    /// Human-readable description, when the API provides one.
    #[serde(default)]
    pub description: Option<String>,
}

/// One job as reported by the pipeline API. Read-only from the poller's
/// perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub id: i64,

    /// Job name.
    pub name: String,

    /// Pipeline stage the job belongs to.
    pub stage: String,

    /// Current job status.
    pub status: JobStatus,

    /// Assigned runner; `None` for a job nothing has picked up.
    #[serde(default)]
    pub runner: Option<RunnerInfo>,

    /// Failure reason reported by the remote system, if any.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl JobRecord {
    /// Construct a job record (mostly useful in tests and fakes).
    pub fn new(id: i64, name: &str, stage: &str, status: JobStatus) -> Self {
        Self {
            id,
            name: name.to_string(),
            stage: stage.to_string(),
            status,
            runner: None,
            failure_reason: None,
        }
    }

    /// Attach an assigned runner.
    pub fn with_runner(mut self, runner_id: i64) -> Self {
        self.runner = Some(RunnerInfo {
            id: runner_id,
            description: None,
        });
        self
    }

    /// Attach a failure reason.
    pub fn with_failure_reason(mut self, reason: &str) -> Self {
        self.failure_reason = Some(reason.to_string());
        self
    }

    /// Identifier of the assigned runner, if any.
    pub fn runner_id(&self) -> Option<i64> {
        self.runner.as_ref().map(|r| r.id)
    }
}

/// One pipeline as returned by the listing endpoint (jobs not included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Pipeline identifier.
    pub id: i64,

    /// Current pipeline status.
    pub status: PipelineStatus,

    /// Git ref the pipeline ran for.
    #[serde(rename = "ref")]
    pub ref_name: String,

    /// Commit SHA the pipeline ran against.
    pub sha: String,

    /// Creation time; the inspector sorts by this instead of trusting
    /// the server's listing order.
    pub created_at: DateTime<Utc>,
}

/// Aggregate of one pipeline run with its jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// Pipeline identifier.
    pub id: i64,

    /// Current pipeline status.
    pub status: PipelineStatus,

    /// Git ref the pipeline ran for.
    pub ref_name: String,

    /// Commit SHA the pipeline ran against.
    pub sha: String,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Jobs in the order the API reported them.
    pub jobs: Vec<JobRecord>,
}

impl PipelineRecord {
    /// Combine a listing entry with its fetched jobs.
    pub fn assemble(summary: PipelineSummary, jobs: Vec<JobRecord>) -> Self {
        Self {
            id: summary.id,
            status: summary.status,
            ref_name: summary.ref_name,
            sha: summary.sha,
            created_at: summary.created_at,
            jobs,
        }
    }

    /// Number of jobs with a given status.
    pub fn count_with_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|j| j.status == status).count()
    }
}
