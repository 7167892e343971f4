//! Integration tests for the poller + aggregator with counting probes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{
    HealthAggregator, HealthStatus, PollOutcome, Poller, Probe, ProbeResult, RetryPolicy,
};

/// Probe that counts invocations and passes from a given call onward.
struct CountingProbe {
    name: String,
    calls: Arc<AtomicUsize>,
    pass_from_call: usize,
}

impl CountingProbe {
    fn new(name: &str, pass_from_call: usize) -> (Arc<dyn Probe>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Arc::new(Self {
            name: name.to_string(),
            calls: calls.clone(),
            pass_from_call,
        });
        (probe, calls)
    }

    fn always_passing(name: &str) -> (Arc<dyn Probe>, Arc<AtomicUsize>) {
        Self::new(name, 1)
    }

    fn never_passing(name: &str) -> (Arc<dyn Probe>, Arc<AtomicUsize>) {
        Self::new(name, usize::MAX)
    }
}

#[async_trait]
impl Probe for CountingProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ProbeResult {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.pass_from_call {
            ProbeResult::Pass
        } else {
            ProbeResult::Indeterminate("not ready".to_string())
        }
    }
}

/// Test: a failing gate stops the chain; later probes are never invoked
#[tokio::test]
async fn test_gating_chain_skips_downstream_probes() {
    let (gate, gate_calls) = CountingProbe::never_passing("http");
    let (downstream, downstream_calls) = CountingProbe::always_passing("ssh");
    let (last, last_calls) = CountingProbe::always_passing("services");

    let aggregator = HealthAggregator::gating()
        .with_probe(gate)
        .with_probe(downstream)
        .with_probe(last);

    let report = aggregator.run_round().await;

    assert_eq!(gate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(downstream_calls.load(Ordering::SeqCst), 0);
    assert_eq!(last_calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.skipped, vec!["ssh", "services"]);
    assert_eq!(report.overall, HealthStatus::Unhealthy);
}

/// Test: independent mode invokes every probe exactly once per round
#[tokio::test]
async fn test_independent_mode_invokes_all_probes() {
    let (a, a_calls) = CountingProbe::always_passing("a");
    let (b, b_calls) = CountingProbe::never_passing("b");
    let (c, c_calls) = CountingProbe::always_passing("c");

    let aggregator = HealthAggregator::independent()
        .with_probe(a)
        .with_probe(b)
        .with_probe(c);

    let report = aggregator.run_round().await;

    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.pass_count, 2);
    assert_eq!(report.total_count, 3);
    assert!(report.skipped.is_empty());
}

/// Test: poller + aggregator settle the instant a round goes healthy
#[tokio::test]
async fn test_poll_settles_when_target_becomes_ready() {
    // passes on its third invocation, i.e. the third round
    let (flaky, flaky_calls) = CountingProbe::new("boot", 3);
    let (steady, steady_calls) = CountingProbe::always_passing("steady");

    let aggregator = Arc::new(
        HealthAggregator::gating()
            .with_probe(flaky)
            .with_probe(steady),
    );

    let poller = Poller::new(RetryPolicy::new(5, Duration::ZERO));
    let outcome = poller
        .run(
            |_| {
                let aggregator = aggregator.clone();
                async move { aggregator.run_round().await }
            },
            |report| report.is_healthy(),
        )
        .await;

    match outcome {
        PollOutcome::Settled { report, attempts } => {
            assert_eq!(attempts, 3);
            assert_eq!(report.overall, HealthStatus::Healthy);
        }
        other => panic!("expected settled poll, got {:?}", other),
    }

    assert_eq!(flaky_calls.load(Ordering::SeqCst), 3);
    // gated behind the flaky probe, so only runs on the healthy round
    assert_eq!(steady_calls.load(Ordering::SeqCst), 1);
}

/// Test: exhaustion returns the last round's report, all probes reported
#[tokio::test]
async fn test_exhausted_poll_reports_every_probe() {
    let (a, _) = CountingProbe::always_passing("reachable");
    let (b, b_calls) = CountingProbe::never_passing("stuck");
    let (c, _) = CountingProbe::always_passing("extra");
    let (d, _) = CountingProbe::always_passing("resources");

    let aggregator = Arc::new(
        HealthAggregator::independent()
            .with_probe(a)
            .with_probe(b)
            .with_probe(c)
            .with_probe(d),
    );

    let poller = Poller::new(RetryPolicy::new(3, Duration::ZERO));
    let outcome = poller
        .run(
            |_| {
                let aggregator = aggregator.clone();
                async move { aggregator.run_round().await }
            },
            |report| report.is_healthy(),
        )
        .await;

    match outcome {
        PollOutcome::Exhausted { report, attempts } => {
            assert_eq!(attempts, 3);
            // operator gets the full per-probe picture, not just the
            // first failure
            assert_eq!(report.outcomes.len(), 4);
            assert_eq!(report.pass_count, 3);
            assert_eq!(report.overall, HealthStatus::Warning);
        }
        other => panic!("expected exhausted poll, got {:?}", other),
    }

    assert_eq!(b_calls.load(Ordering::SeqCst), 3);
}
