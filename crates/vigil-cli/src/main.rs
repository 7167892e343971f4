//! Vigil — readiness and CI pipeline health CLI
//!
//! The `vigil` command polls a freshly provisioned server until it is
//! ready and inspects its latest CI pipeline.
//!
//! ## Commands
//!
//! - `health`: run the readiness probe chain under a retry budget
//! - `pipeline`: inspect the latest pipeline and classify its jobs
//!
//! Exit codes: 0 healthy, 1 warning/degraded, 2 unhealthy/critical,
//! 130 interrupted.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn, Level};

use vigil_core::{
    AuditLog, HealthAggregator, HealthReport, HealthStatus, HttpReachabilityProbe, PollOutcome,
    Poller, RemoteCommandProbe, ReportDocument, RetryPolicy, TargetContext,
};
use vigil_gitlab::{DataAvailability, GitLabClient, InspectionReport, PipelineInspector};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Readiness and CI pipeline health poller", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the target server's readiness probes until healthy
    Health {
        /// Host name or IP of the target server
        #[arg(short, long)]
        target: String,

        /// SSH username
        #[arg(long, default_value = "ubuntu")]
        ssh_user: String,

        /// SSH private key path
        #[arg(long)]
        ssh_key: Option<PathBuf>,

        /// Maximum poll rounds
        #[arg(short, long, default_value = "12")]
        retries: u32,

        /// Seconds between rounds
        #[arg(short, long, default_value = "50")]
        interval: u64,

        /// Connectivity probes only (HTTP + SSH)
        #[arg(short, long)]
        quick: bool,

        /// Run every probe each round instead of gating on earlier ones
        #[arg(long)]
        all: bool,

        /// Where to write the JSON report
        #[arg(long)]
        output_file: Option<PathBuf>,

        /// Do not write the JSON report
        #[arg(long)]
        no_save: bool,

        /// Status-transition log path
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Inspect the latest CI pipeline and classify its jobs
    Pipeline {
        /// Host name or IP of the GitLab server
        #[arg(short, long)]
        target: String,

        /// Project id whose pipelines are inspected
        #[arg(short, long)]
        project: u64,

        /// API token (PRIVATE-TOKEN header)
        #[arg(long, env = "VIGIL_GITLAB_TOKEN")]
        token: Option<String>,

        /// Maximum poll rounds
        #[arg(short, long, default_value = "10")]
        retries: u32,

        /// Seconds between rounds
        #[arg(short, long, default_value = "30")]
        interval: u64,

        /// How many recent pipelines to fetch for recency sorting
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Emit the inspection report as JSON instead of text
        #[arg(long)]
        report_json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    vigil_core::init_tracing(cli.json, level);

    // Ctrl-C flips the cancel signal; the poller aborts both in-flight
    // rounds and inter-round sleeps.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            let _ = cancel_tx.send(true);
        }
    });

    let code = match run(cli.command, cancel_rx).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            1
        }
    };
    std::process::exit(code);
}

async fn run(command: Commands, cancel: watch::Receiver<bool>) -> Result<i32> {
    match command {
        Commands::Health {
            target,
            ssh_user,
            ssh_key,
            retries,
            interval,
            quick,
            all,
            output_file,
            no_save,
            log_file,
        } => {
            cmd_health(
                &target,
                &ssh_user,
                ssh_key,
                retries,
                interval,
                quick,
                all,
                output_file,
                no_save,
                log_file,
                cancel,
            )
            .await
        }
        Commands::Pipeline {
            target,
            project,
            token,
            retries,
            interval,
            limit,
            report_json,
        } => {
            cmd_pipeline(
                &target,
                project,
                token,
                retries,
                interval,
                limit,
                report_json,
                cancel,
            )
            .await
        }
    }
}

/// Assemble the readiness probe chain for a target.
///
/// The full chain mirrors post-provisioning checks: HTTP reachability,
/// SSH, service status, web interface, external-URL configuration, and
/// a system-resources snapshot. `--quick` keeps the first two.
fn build_health_chain(ctx: &TargetContext, quick: bool, all: bool) -> HealthAggregator {
    let mut aggregator = if all {
        HealthAggregator::independent()
    } else {
        HealthAggregator::gating()
    };

    aggregator = aggregator
        .with_probe(Arc::new(
            HttpReachabilityProbe::new("network_connectivity", &ctx.base_url(), ctx)
                .with_fail_pattern(
                    "422",
                    "request rejected (422 in body): CSRF or validation misconfiguration",
                ),
        ))
        .with_probe(Arc::new(
            RemoteCommandProbe::new("ssh_connectivity", ctx, "echo 'SSH connection successful'")
                .with_success_pattern("SSH connection successful"),
        ));

    if quick {
        return aggregator;
    }

    aggregator
        .with_probe(Arc::new(
            RemoteCommandProbe::new("gitlab_services", ctx, "sudo gitlab-ctl status")
                .with_success_pattern("run:")
                .with_failure_pattern("down:")
                .with_failure_pattern("fail:"),
        ))
        .with_probe(Arc::new(
            HttpReachabilityProbe::new("web_interface", &ctx.url("/users/sign_in"), ctx)
                .with_accepted_statuses(vec![200])
                .with_body_requirement("GitLab"),
        ))
        .with_probe(Arc::new(
            RemoteCommandProbe::new(
                "external_url_config",
                ctx,
                "sudo grep '^external_url' /etc/gitlab/gitlab.rb",
            )
            .with_success_pattern(&ctx.host),
        ))
        .with_probe(Arc::new(RemoteCommandProbe::new(
            "system_resources",
            ctx,
            "df -h / && free -h",
        )))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_health(
    target: &str,
    ssh_user: &str,
    ssh_key: Option<PathBuf>,
    retries: u32,
    interval: u64,
    quick: bool,
    all: bool,
    output_file: Option<PathBuf>,
    no_save: bool,
    log_file: Option<PathBuf>,
    cancel: watch::Receiver<bool>,
) -> Result<i32> {
    let mut ctx = TargetContext::new(target)
        .context("invalid --target")?
        .with_ssh_user(ssh_user);
    if let Some(key) = ssh_key {
        ctx = ctx.with_ssh_key(key);
    }

    let audit = Arc::new(match log_file {
        Some(path) => AuditLog::open(path),
        None => AuditLog::open_default(),
    }?);

    let aggregator = Arc::new(build_health_chain(&ctx, quick, all));
    let policy = RetryPolicy::new(retries, Duration::from_secs(interval));
    let poller = Poller::new(policy);

    info!(
        target = %ctx.host,
        probes = aggregator.len(),
        retries = policy.max_attempts(),
        interval_secs = interval,
        "starting health poll"
    );

    let last_status: Arc<Mutex<Option<HealthStatus>>> = Arc::new(Mutex::new(None));
    let outcome = poller
        .run_until_cancelled(
            |attempt| {
                let aggregator = aggregator.clone();
                let audit = audit.clone();
                let last_status = last_status.clone();
                async move {
                    let report = aggregator.run_round().await;
                    let mut last = last_status.lock().unwrap();
                    if *last != Some(report.overall) {
                        let detail = format!(
                            "{}/{} checks passed (attempt {})",
                            report.pass_count, report.total_count, attempt
                        );
                        if let Err(err) = audit.record(report.overall, &detail) {
                            warn!(%err, "failed to append audit log");
                        }
                        *last = Some(report.overall);
                    }
                    report
                }
            },
            |report| report.is_healthy(),
            cancel,
        )
        .await;

    let (report, attempts) = match outcome {
        PollOutcome::Settled { report, attempts } | PollOutcome::Exhausted { report, attempts } => {
            (report, attempts)
        }
        PollOutcome::Cancelled => {
            println!("Health check interrupted.");
            return Ok(130);
        }
    };

    render_health_report(&ctx.host, &report, attempts);

    if !no_save {
        let path = output_file
            .unwrap_or_else(|| PathBuf::from(vigil_core::DEFAULT_OUT_DIR).join("health_report.json"));
        ReportDocument::from_report(&ctx.host, &report, attempts)
            .save(&path)
            .context("failed to save report")?;
    }

    Ok(exit_code(report.overall))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_pipeline(
    target: &str,
    project: u64,
    token: Option<String>,
    retries: u32,
    interval: u64,
    limit: usize,
    report_json: bool,
    cancel: watch::Receiver<bool>,
) -> Result<i32> {
    let mut ctx = TargetContext::new(target).context("invalid --target")?;
    if let Some(token) = token {
        ctx = ctx.with_api_token(&token);
    }

    let client = GitLabClient::new(&ctx, project).context("failed to build API client")?;
    let inspector = Arc::new(PipelineInspector::new(client).with_fetch_limit(limit));
    let poller = Poller::new(RetryPolicy::new(retries, Duration::from_secs(interval)));

    info!(target = %ctx.host, project, retries, "starting pipeline inspection");

    let outcome = poller
        .run_until_cancelled(
            |attempt| {
                let inspector = inspector.clone();
                async move {
                    info!(attempt, "inspecting latest pipeline");
                    inspector.inspect_latest().await
                }
            },
            |report| report.is_conclusive(),
            cancel,
        )
        .await;

    let report = match outcome {
        PollOutcome::Settled { report, .. } | PollOutcome::Exhausted { report, .. } => report,
        PollOutcome::Cancelled => {
            println!("Pipeline inspection interrupted.");
            return Ok(130);
        }
    };

    if report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_inspection_report(&report);
    }
    Ok(exit_code(report.status()))
}

fn render_health_report(target: &str, report: &HealthReport, attempts: u32) {
    println!();
    println!("Health check for {}", target);
    for outcome in &report.outcomes {
        println!(
            "  {:<22} {:>6}ms  {}",
            outcome.name, outcome.duration_ms, outcome.result
        );
    }
    for name in &report.skipped {
        println!("  {:<22}          skipped", name);
    }
    println!();
    println!(
        "Overall: {} ({}/{} checks passed, {:.1}%) after {} attempt(s)",
        report.overall,
        report.pass_count,
        report.total_count,
        report.pass_rate(),
        attempts
    );
}

fn render_inspection_report(report: &InspectionReport) {
    println!();
    match &report.availability {
        DataAvailability::Unavailable(reason) => {
            println!("Could not retrieve pipeline data: {}", reason);
        }
        DataAvailability::NoPipelines => {
            println!("No pipelines found for the project.");
        }
        DataAvailability::Complete => {
            let Some(pipeline) = &report.pipeline else {
                return;
            };
            println!(
                "Pipeline #{} [{}] ref {} sha {}",
                pipeline.id, pipeline.status, pipeline.ref_name, pipeline.sha
            );
            println!(
                "Created: {}",
                pipeline.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!();
            for job in &pipeline.jobs {
                let runner = match job.runner_id() {
                    Some(id) => format!("runner {}", id),
                    None => "no runner".to_string(),
                };
                println!(
                    "  {:<8} {:<20} {:<10} {:<10} {}",
                    job.id, job.name, job.stage, job.status, runner
                );
            }
            if !report.hints.is_empty() {
                println!();
                println!("Diagnostic hints:");
                for hint in &report.hints {
                    println!("  - {}", hint.message);
                }
            }
        }
    }
    println!();
    println!("Overall: {}", report.status());
}

fn exit_code(status: HealthStatus) -> i32 {
    match status {
        HealthStatus::Healthy => 0,
        HealthStatus::Warning => 1,
        HealthStatus::Unhealthy => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(HealthStatus::Healthy), 0);
        assert_eq!(exit_code(HealthStatus::Warning), 1);
        assert_eq!(exit_code(HealthStatus::Unhealthy), 2);
    }

    #[test]
    fn test_quick_chain_has_two_probes() {
        let ctx = TargetContext::new("203.0.113.10").unwrap();
        let aggregator = build_health_chain(&ctx, true, false);
        assert_eq!(aggregator.len(), 2);
    }

    #[test]
    fn test_full_chain_has_six_probes() {
        let ctx = TargetContext::new("203.0.113.10").unwrap();
        let aggregator = build_health_chain(&ctx, false, false);
        assert_eq!(aggregator.len(), 6);
    }

    #[test]
    fn test_cli_parses_health_flags() {
        let cli = Cli::try_parse_from([
            "vigil", "health", "--target", "10.0.0.5", "--retries", "3", "--interval", "5",
            "--quick",
        ])
        .unwrap();
        match cli.command {
            Commands::Health {
                target,
                retries,
                interval,
                quick,
                ..
            } => {
                assert_eq!(target, "10.0.0.5");
                assert_eq!(retries, 3);
                assert_eq!(interval, 5);
                assert!(quick);
            }
            _ => panic!("expected health subcommand"),
        }
    }

    #[test]
    fn test_cli_requires_target() {
        assert!(Cli::try_parse_from(["vigil", "health"]).is_err());
    }

    #[test]
    fn test_cli_parses_pipeline_flags() {
        let cli = Cli::try_parse_from([
            "vigil", "pipeline", "--target", "10.0.0.5", "--project", "42",
        ])
        .unwrap();
        match cli.command {
            Commands::Pipeline { project, .. } => assert_eq!(project, 42),
            _ => panic!("expected pipeline subcommand"),
        }
    }
}
