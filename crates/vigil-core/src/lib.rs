//! Vigil core — readiness probes, bounded-retry polling and health
//! aggregation.
//!
//! A [`Probe`] is one yes/no check against an external system. A
//! [`HealthAggregator`] runs an ordered list of probes once and derives a
//! [`HealthReport`]. A [`Poller`] repeats rounds under a [`RetryPolicy`]
//! until the target is healthy, the budget runs out, or the caller
//! cancels.

pub mod aggregator;
pub mod audit;
pub mod error;
pub mod probe;
pub mod probes;
pub mod retry;
pub mod target;
pub mod telemetry;

pub use aggregator::{ChainMode, HealthAggregator, HealthReport, HealthStatus};
pub use audit::{AuditLog, ReportDocument, DEFAULT_OUT_DIR};
pub use error::{CoreError, Result};
pub use probe::{Probe, ProbeOutcome, ProbeResult};
pub use probes::{HttpReachabilityProbe, RemoteCommandProbe};
pub use retry::{PollOutcome, Poller, RetryPolicy};
pub use target::TargetContext;
pub use telemetry::init_tracing;
