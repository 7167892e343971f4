//! Health aggregation: run a list of named probes once and derive an
//! overall status.

use crate::probe::{Probe, ProbeOutcome};
use futures::future;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Overall verdict of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Every executed probe passed.
    Healthy,

    /// Some probes failed but at least 75% passed.
    Warning,

    /// Less than 75% of probes passed.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let word = match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Warning => "WARNING",
            HealthStatus::Unhealthy => "UNHEALTHY",
        };
        f.pad(word)
    }
}

/// How probe failures relate within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// Each probe only runs if every prior probe passed; the first
    /// non-pass short-circuits the round and the rest are skipped.
    Gating,

    /// Every probe runs exactly once regardless of other results.
    /// Probes execute concurrently; outcomes keep declaration order.
    Independent,
}

/// Report for one full pass through the probe list. Write-once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Per-probe outcomes in declaration order.
    pub outcomes: Vec<ProbeOutcome>,

    /// Names of probes skipped by a gating short-circuit.
    pub skipped: Vec<String>,

    /// Number of probes that passed.
    pub pass_count: usize,

    /// Number of probes that executed.
    pub total_count: usize,

    /// Derived overall status.
    pub overall: HealthStatus,
}

impl HealthReport {
    /// Build a report and derive its status.
    ///
    /// Healthy iff everything executed passed and nothing was skipped.
    /// Unhealthy iff the pass ratio dropped below 0.75; a ratio of
    /// exactly 0.75 is still Warning.
    pub fn new(outcomes: Vec<ProbeOutcome>, skipped: Vec<String>) -> Self {
        let total_count = outcomes.len();
        let pass_count = outcomes.iter().filter(|o| o.passed()).count();

        let overall = if pass_count == total_count && skipped.is_empty() {
            HealthStatus::Healthy
        } else if (pass_count as f64) < (total_count as f64) * 0.75 {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Warning
        };

        Self {
            outcomes,
            skipped,
            pass_count,
            total_count,
            overall,
        }
    }

    /// Whether this round settled the poll.
    pub fn is_healthy(&self) -> bool {
        self.overall == HealthStatus::Healthy
    }

    /// Pass ratio as a percentage, 100.0 for an empty report.
    pub fn pass_rate(&self) -> f64 {
        if self.total_count == 0 {
            100.0
        } else {
            (self.pass_count as f64 / self.total_count as f64) * 100.0
        }
    }
}

/// Runs an ordered list of probes exactly once per round.
///
/// Retries live in [`crate::Poller`], not here; the aggregator only knows
/// how to produce a single [`HealthReport`].
pub struct HealthAggregator {
    probes: Vec<Arc<dyn Probe>>,
    mode: ChainMode,
}

impl HealthAggregator {
    /// Aggregator whose probes form a gating chain.
    pub fn gating() -> Self {
        Self {
            probes: Vec::new(),
            mode: ChainMode::Gating,
        }
    }

    /// Aggregator whose probes are independent.
    pub fn independent() -> Self {
        Self {
            probes: Vec::new(),
            mode: ChainMode::Independent,
        }
    }

    /// Append a probe; declaration order is reporting order.
    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// Number of registered probes.
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    /// Whether no probes are registered.
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Execute one round.
    pub async fn run_round(&self) -> HealthReport {
        let report = match self.mode {
            ChainMode::Gating => self.run_gated().await,
            ChainMode::Independent => self.run_independent().await,
        };
        info!(
            status = %report.overall,
            passed = report.pass_count,
            total = report.total_count,
            "round complete"
        );
        report
    }

    async fn run_gated(&self) -> HealthReport {
        let mut outcomes = Vec::with_capacity(self.probes.len());
        let mut skipped = Vec::new();

        for (idx, probe) in self.probes.iter().enumerate() {
            let start = Instant::now();
            let result = probe.check().await;
            let passed = result.is_pass();
            outcomes.push(ProbeOutcome::new(probe.name(), result, start.elapsed()));

            if !passed {
                skipped.extend(
                    self.probes[idx + 1..]
                        .iter()
                        .map(|p| p.name().to_string()),
                );
                break;
            }
        }

        HealthReport::new(outcomes, skipped)
    }

    async fn run_independent(&self) -> HealthReport {
        // join_all keeps declaration order in its output, so outcomes
        // line up with the probe list no matter which check finishes
        // first.
        let checks = self.probes.iter().map(|probe| async move {
            let start = Instant::now();
            let result = probe.check().await;
            ProbeOutcome::new(probe.name(), result, start.elapsed())
        });

        let outcomes = future::join_all(checks).await;
        HealthReport::new(outcomes, Vec::new())
    }
}
