//! Integration tests for the pipeline inspector with FakePipelineApi.

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{HealthStatus, PollOutcome, Poller, RetryPolicy};
use vigil_gitlab::fakes::FakePipelineApi;
use vigil_gitlab::{
    DataAvailability, HintKind, JobRecord, JobStatus, PipelineInspector, PipelineStatus,
    PipelineSummary,
};

fn summary(id: i64, status: PipelineStatus, created_minute: u32) -> PipelineSummary {
    PipelineSummary {
        id,
        status,
        ref_name: "main".to_string(),
        sha: format!("sha-{}", id),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, created_minute, 0).unwrap(),
    }
}

/// Test: the canonical mixed pipeline — one success, one failure with a
/// reason, one pending job nothing picked up
#[tokio::test]
async fn test_mixed_pipeline_classification() {
    let api = FakePipelineApi::new();
    api.add_pipeline(
        summary(10, PipelineStatus::Running, 0),
        vec![
            JobRecord::new(1, "build", "build", JobStatus::Success),
            JobRecord::new(2, "test", "test", JobStatus::Failed)
                .with_failure_reason("script error"),
            JobRecord::new(3, "deploy", "deploy", JobStatus::Pending),
        ],
    );

    let report = PipelineInspector::new(api).inspect_latest().await;

    assert_eq!(report.availability, DataAvailability::Complete);
    let pipeline = report.pipeline.as_ref().unwrap();
    assert_eq!(pipeline.count_with_status(JobStatus::Success), 1);

    assert_eq!(report.hints.len(), 2);
    assert_eq!(report.hints[0].kind, HintKind::MissingRunner);
    assert_eq!(report.hints[1].kind, HintKind::JobFailed);
    assert!(report.hints[1].message.contains("script error"));
}

/// Test: the newest pipeline by created_at wins even when the API lists
/// it last
#[tokio::test]
async fn test_latest_pipeline_selected_by_created_at() {
    let api = FakePipelineApi::new();
    api.add_pipeline(summary(30, PipelineStatus::Success, 45), vec![]);
    api.add_pipeline(
        summary(31, PipelineStatus::Failed, 50),
        vec![JobRecord::new(9, "test", "test", JobStatus::Failed).with_failure_reason("oom")],
    );
    api.add_pipeline(summary(29, PipelineStatus::Success, 10), vec![]);

    let report = PipelineInspector::new(api).inspect_latest().await;
    assert_eq!(report.pipeline.as_ref().unwrap().id, 31);
    assert_eq!(report.status(), HealthStatus::Unhealthy);
}

/// Test: empty listing is NoPipelines, not an error and not unavailable
#[tokio::test]
async fn test_empty_listing_is_no_pipelines() {
    let report = PipelineInspector::new(FakePipelineApi::new())
        .inspect_latest()
        .await;
    assert_eq!(report.availability, DataAvailability::NoPipelines);
    assert!(report.pipeline.is_none());
    assert_eq!(report.status(), HealthStatus::Warning);
    assert!(report.is_conclusive());
}

/// Test: a dead API is Unavailable — never mistaken for "no pipelines"
#[tokio::test]
async fn test_unreachable_api_is_unavailable() {
    let api = FakePipelineApi::new();
    api.fail_pipelines("connection refused");

    let report = PipelineInspector::new(api).inspect_latest().await;
    match &report.availability {
        DataAvailability::Unavailable(reason) => {
            assert!(reason.contains("could not retrieve pipeline data"));
        }
        other => panic!("unexpected availability: {:?}", other),
    }
    assert!(!report.is_conclusive());
    assert_eq!(report.status(), HealthStatus::Unhealthy);
}

/// Test: job fetch failure keeps the pipeline summary but marks the
/// report unavailable
#[tokio::test]
async fn test_job_fetch_failure_marks_unavailable() {
    let api = FakePipelineApi::new();
    api.add_pipeline(summary(12, PipelineStatus::Running, 5), vec![]);
    api.fail_jobs("502 bad gateway");

    let report = PipelineInspector::new(api).inspect_latest().await;
    assert!(matches!(
        report.availability,
        DataAvailability::Unavailable(_)
    ));
    assert_eq!(report.pipeline.as_ref().unwrap().id, 12);
    assert!(report.pipeline.as_ref().unwrap().jobs.is_empty());
}

/// Test: all-green terminal pipeline is conclusive and healthy
#[tokio::test]
async fn test_successful_pipeline_is_conclusive_and_healthy() {
    let api = FakePipelineApi::new();
    api.add_pipeline(
        summary(40, PipelineStatus::Success, 30),
        vec![
            JobRecord::new(1, "build", "build", JobStatus::Success).with_runner(3),
            JobRecord::new(2, "test", "test", JobStatus::Success).with_runner(3),
        ],
    );

    let report = PipelineInspector::new(api).inspect_latest().await;
    assert!(report.is_conclusive());
    assert_eq!(report.status(), HealthStatus::Healthy);
    assert!(report.hints.is_empty());
}

/// Test: polling the inspector settles once the API heals
#[tokio::test]
async fn test_poll_inspector_until_api_recovers() {
    let api = Arc::new(FakePipelineApi::new());
    api.add_pipeline(
        summary(50, PipelineStatus::Success, 0),
        vec![JobRecord::new(1, "build", "build", JobStatus::Success)],
    );
    api.fail_pipelines("still booting");

    let inspector = Arc::new(PipelineInspector::new(api.clone()));
    let poller = Poller::new(RetryPolicy::new(5, Duration::ZERO));

    let healing = api.clone();
    let outcome = poller
        .run(
            move |attempt| {
                let inspector = inspector.clone();
                let healing = healing.clone();
                async move {
                    // API comes back on the third round
                    if attempt == 3 {
                        healing.heal();
                    }
                    inspector.inspect_latest().await
                }
            },
            |report| report.is_conclusive(),
        )
        .await;

    match outcome {
        PollOutcome::Settled { report, attempts } => {
            assert_eq!(attempts, 3);
            assert_eq!(report.status(), HealthStatus::Healthy);
        }
        other => panic!("expected settled poll, got {:?}", other),
    }
    assert_eq!(api.list_call_count(), 3);
}
