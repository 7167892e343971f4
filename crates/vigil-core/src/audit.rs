//! Audit log and report documents.
//!
//! The audit log is an append-only, line-oriented file recording overall
//! status transitions; nothing in this repository parses it back. The
//! report document is the JSON summary written at the end of a run.

use crate::aggregator::{HealthReport, HealthStatus};
use crate::error::Result;
use crate::probe::ProbeOutcome;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default output directory for logs and reports.
pub const DEFAULT_OUT_DIR: &str = ".out";

/// Append-only status-transition log.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Open a log at `path`, creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self { path })
    }

    /// Open the default log file under [`DEFAULT_OUT_DIR`].
    pub fn open_default() -> Result<Self> {
        Self::open(Path::new(DEFAULT_OUT_DIR).join("vigil.log"))
    }

    /// Append one timestamped transition line.
    pub fn record(&self, status: HealthStatus, detail: &str) -> Result<()> {
        let line = format!(
            "{} {} {}\n",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            status,
            detail
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// JSON document capturing a finished health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    /// When the document was produced.
    pub timestamp: DateTime<Utc>,

    /// Target host the checks ran against.
    pub target: String,

    /// Final overall status.
    pub overall_status: HealthStatus,

    /// Number of checks that passed.
    pub passed_checks: usize,

    /// Number of checks that executed.
    pub total_checks: usize,

    /// Pass ratio as a percentage.
    pub pass_rate: f64,

    /// Per-check results in declaration order.
    pub checks: Vec<ProbeOutcome>,

    /// Checks skipped by a gating short-circuit.
    pub skipped: Vec<String>,

    /// Rounds executed before the poll ended.
    pub attempts: u32,
}

impl ReportDocument {
    /// Capture a report for `target` after `attempts` rounds.
    pub fn from_report(target: &str, report: &HealthReport, attempts: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            target: target.to_string(),
            overall_status: report.overall,
            passed_checks: report.pass_count,
            total_checks: report.total_count,
            pass_rate: (report.pass_rate() * 100.0).round() / 100.0,
            checks: report.outcomes.clone(),
            skipped: report.skipped.clone(),
            attempts,
        }
    }

    /// Write the document as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), "report saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeResult;
    use std::time::Duration;

    fn sample_report() -> HealthReport {
        HealthReport::new(
            vec![
                ProbeOutcome::new("http", ProbeResult::Pass, Duration::from_millis(10)),
                ProbeOutcome::new(
                    "ssh",
                    ProbeResult::Fail("unreachable".to_string()),
                    Duration::from_millis(20),
                ),
            ],
            vec!["services".to_string()],
        )
    }

    #[test]
    fn test_audit_log_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.log");
        let log = AuditLog::open(&path).unwrap();

        log.record(HealthStatus::Unhealthy, "1/2 checks passed").unwrap();
        log.record(HealthStatus::Healthy, "2/2 checks passed").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("UNHEALTHY"));
        assert!(lines[1].contains("HEALTHY"));
    }

    #[test]
    fn test_audit_log_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("vigil.log");
        let log = AuditLog::open(&path).unwrap();
        log.record(HealthStatus::Warning, "3/4 checks passed").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_report_document_round_trip() {
        let doc = ReportDocument::from_report("203.0.113.10", &sample_report(), 3);
        assert_eq!(doc.total_checks, 2);
        assert_eq!(doc.passed_checks, 1);
        assert_eq!(doc.skipped, vec!["services"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        doc.save(&path).unwrap();

        let back: ReportDocument =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.target, "203.0.113.10");
        assert_eq!(back.overall_status, HealthStatus::Unhealthy);
        assert_eq!(back.attempts, 3);
    }
}
