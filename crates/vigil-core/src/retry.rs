//! Bounded-retry polling.
//!
//! A [`Poller`] runs a round function until a success predicate holds,
//! the attempt budget is exhausted, or the caller cancels. Retries live
//! here and nowhere else; aggregators and inspectors produce one report
//! per call.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Bounded attempts with a fixed interval between rounds.
///
/// Worst-case sleeping time is `(max_attempts - 1) * interval`; there is
/// no sleep after the final round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    /// A policy with at least one attempt.
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    /// Run once, no sleeping.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Attempt budget.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleep between rounds.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Total worst-case time spent sleeping.
    pub fn sleep_budget(&self) -> Duration {
        self.interval * (self.max_attempts - 1)
    }
}

/// Terminal state of a poll.
#[derive(Debug)]
pub enum PollOutcome<R> {
    /// The success predicate held; returned on the round it first held.
    Settled {
        /// Report of the successful round.
        report: R,
        /// 1-based round on which the poll settled.
        attempts: u32,
    },

    /// Every attempt was used without the predicate holding.
    Exhausted {
        /// Report of the final round.
        report: R,
        /// Number of rounds executed (equals the policy budget).
        attempts: u32,
    },

    /// Cancelled from outside. Operationally distinct from exhaustion:
    /// nothing is known about the target's state.
    Cancelled,
}

impl<R> PollOutcome<R> {
    /// The final report, unless the poll was cancelled.
    pub fn report(&self) -> Option<&R> {
        match self {
            PollOutcome::Settled { report, .. } | PollOutcome::Exhausted { report, .. } => {
                Some(report)
            }
            PollOutcome::Cancelled => None,
        }
    }

    /// Whether the poll ended in success.
    pub fn settled(&self) -> bool {
        matches!(self, PollOutcome::Settled { .. })
    }
}

/// Executes rounds under a [`RetryPolicy`].
pub struct Poller {
    policy: RetryPolicy,
}

impl Poller {
    /// A poller for the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Poll until `is_success` holds or attempts are exhausted.
    ///
    /// `round` receives the 1-based attempt number. The poll returns the
    /// instant a round succeeds; remaining budget is not consumed.
    pub async fn run<R, F, Fut, P>(&self, round: F, is_success: P) -> PollOutcome<R>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = R>,
        P: Fn(&R) -> bool,
    {
        // Receiver with no live sender never fires.
        let (_tx, rx) = watch::channel(false);
        self.run_until_cancelled(round, is_success, rx).await
    }

    /// Like [`Poller::run`], aborting promptly when `cancel` flips to
    /// `true` — both mid-round and mid-sleep.
    pub async fn run_until_cancelled<R, F, Fut, P>(
        &self,
        mut round: F,
        is_success: P,
        mut cancel: watch::Receiver<bool>,
    ) -> PollOutcome<R>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = R>,
        P: Fn(&R) -> bool,
    {
        if *cancel.borrow() {
            return PollOutcome::Cancelled;
        }

        let mut attempt = 1u32;
        loop {
            let report = tokio::select! {
                report = round(attempt) => report,
                _ = cancelled(&mut cancel) => return PollOutcome::Cancelled,
            };

            if is_success(&report) {
                return PollOutcome::Settled {
                    report,
                    attempts: attempt,
                };
            }

            if attempt >= self.policy.max_attempts() {
                return PollOutcome::Exhausted {
                    report,
                    attempts: attempt,
                };
            }

            debug!(
                attempt,
                remaining = self.policy.max_attempts() - attempt,
                interval_secs = self.policy.interval().as_secs(),
                "round not settled, waiting before retry"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.policy.interval()) => {}
                _ = cancelled(&mut cancel) => return PollOutcome::Cancelled,
            }

            attempt += 1;
        }
    }
}

/// Resolves once the watch value becomes `true`; never resolves if the
/// sender goes away without cancelling.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
