//! Probe trait and result classification.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of a single external-system check.
///
/// `Indeterminate` means the check could not get an answer (connection
/// refused, timeout, system still booting) and is worth retrying.
/// `Fail` means the check got an answer and the answer is bad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ProbeResult {
    /// The check succeeded.
    Pass,

    /// Definitive failure with a human-readable reason.
    Fail(String),

    /// Could not determine; the target may not be ready yet.
    Indeterminate(String),
}

impl ProbeResult {
    /// Whether this result counts as a pass.
    pub fn is_pass(&self) -> bool {
        matches!(self, ProbeResult::Pass)
    }

    /// Whether this result is a definitive failure.
    pub fn is_fail(&self) -> bool {
        matches!(self, ProbeResult::Fail(_))
    }

    /// Whether this result is retryable.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, ProbeResult::Indeterminate(_))
    }

    /// The attached reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ProbeResult::Pass => None,
            ProbeResult::Fail(r) | ProbeResult::Indeterminate(r) => Some(r),
        }
    }
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeResult::Pass => write!(f, "pass"),
            ProbeResult::Fail(r) => write!(f, "fail ({})", r),
            ProbeResult::Indeterminate(r) => write!(f, "indeterminate ({})", r),
        }
    }
}

/// One named yes/no check against an external system.
///
/// Probes are stateless and invoked fresh on every retry round. A probe
/// must never panic for expected failure modes; network problems map to
/// [`ProbeResult::Indeterminate`] and bad answers to [`ProbeResult::Fail`].
/// Each probe enforces its own timeout so one stuck call cannot stall a
/// round indefinitely.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Name used in reports and log lines.
    fn name(&self) -> &str;

    /// Run the check once.
    async fn check(&self) -> ProbeResult;
}

/// Recorded outcome of one probe execution within a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Probe name.
    pub name: String,

    /// Classified result.
    pub result: ProbeResult,

    /// Wall-clock duration of the check in milliseconds.
    pub duration_ms: u64,
}

impl ProbeOutcome {
    /// Record an outcome with its measured duration.
    pub fn new(name: &str, result: ProbeResult, elapsed: Duration) -> Self {
        Self {
            name: name.to_string(),
            result,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Whether the underlying check passed.
    pub fn passed(&self) -> bool {
        self.result.is_pass()
    }
}
