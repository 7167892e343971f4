//! HTTP reachability probe.

use crate::probe::{Probe, ProbeResult};
use crate::target::TargetContext;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// A body substring that marks a response as definitively broken even
/// when the status code looks acceptable.
#[derive(Debug, Clone)]
pub struct FailPattern {
    /// Substring searched for in the response body.
    pub pattern: String,

    /// Reason reported when the pattern matches.
    pub reason: String,
}

/// Checks that an HTTP endpoint answers with an accepted status code.
///
/// Classification:
/// - connection failure or timeout is [`ProbeResult::Indeterminate`]
///   (the server may still be booting);
/// - a body matching a known fail pattern is [`ProbeResult::Fail`]
///   regardless of status;
/// - an accepted status missing a required body substring is
///   [`ProbeResult::Fail`];
/// - any other status is [`ProbeResult::Indeterminate`].
pub struct HttpReachabilityProbe {
    name: String,
    url: String,
    accepted: Vec<u16>,
    body_must_contain: Option<String>,
    fail_patterns: Vec<FailPattern>,
    client: reqwest::Client,
}

impl HttpReachabilityProbe {
    /// Build a probe for `url` with timeouts from the target context.
    ///
    /// Accepts 200 and 302 by default; a fresh GitLab install redirects
    /// the root page to the sign-in form.
    pub fn new(name: &str, url: &str, ctx: &TargetContext) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("vigil/0.2")
            .connect_timeout(Duration::from_secs(ctx.connect_timeout_secs))
            .timeout(Duration::from_secs(ctx.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            name: name.to_string(),
            url: url.to_string(),
            accepted: vec![200, 302],
            body_must_contain: None,
            fail_patterns: Vec::new(),
            client,
        }
    }

    /// Replace the accepted status codes.
    pub fn with_accepted_statuses(mut self, accepted: Vec<u16>) -> Self {
        self.accepted = accepted;
        self
    }

    /// Require the response body to contain `needle`.
    pub fn with_body_requirement(mut self, needle: &str) -> Self {
        self.body_must_contain = Some(needle.to_string());
        self
    }

    /// Treat a body containing `pattern` as a definitive failure.
    pub fn with_fail_pattern(mut self, pattern: &str, reason: &str) -> Self {
        self.fail_patterns.push(FailPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        });
        self
    }

    fn classify(&self, status: u16, body: &str) -> ProbeResult {
        for fp in &self.fail_patterns {
            if body.contains(&fp.pattern) {
                return ProbeResult::Fail(fp.reason.clone());
            }
        }

        if !self.accepted.contains(&status) {
            return ProbeResult::Indeterminate(format!("unexpected HTTP status {}", status));
        }

        if let Some(needle) = &self.body_must_contain {
            if !body.contains(needle.as_str()) {
                return ProbeResult::Fail(format!(
                    "HTTP {} response did not contain \"{}\"",
                    status, needle
                ));
            }
        }

        ProbeResult::Pass
    }
}

#[async_trait]
impl Probe for HttpReachabilityProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ProbeResult {
        debug!(probe = %self.name, url = %self.url, "sending HTTP probe");

        let response = match self.client.get(&self.url).send().await {
            Ok(r) => r,
            Err(err) => {
                return ProbeResult::Indeterminate(format!(
                    "request to {} failed: {}",
                    self.url, err
                ));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(b) => b,
            Err(err) => {
                return ProbeResult::Indeterminate(format!("failed to read response body: {}", err));
            }
        };

        self.classify(status, &body)
    }
}
