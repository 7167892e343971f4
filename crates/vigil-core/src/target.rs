//! Target description shared by every probe.
//!
//! A [`TargetContext`] is built once at startup and handed to probe
//! constructors. It replaces ambient globals: nothing in the poller reads
//! configuration from anywhere else.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to reach the system under observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetContext {
    /// Host name or IP address of the target server.
    pub host: String,

    /// URL scheme for HTTP probes (fresh provisioning is plain `http`).
    pub scheme: String,

    /// Remote user for SSH-based probes.
    pub ssh_user: String,

    /// Private key handed to `ssh -i`.
    pub ssh_key: PathBuf,

    /// Connect timeout for a single network dial, in seconds.
    pub connect_timeout_secs: u64,

    /// Total timeout for a single HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Total timeout for a single remote command, in seconds.
    pub command_timeout_secs: u64,

    /// API token for authenticated REST calls, if any.
    pub api_token: Option<String>,
}

impl TargetContext {
    /// Create a context for a host with the defaults the provisioning
    /// flow assumes (ubuntu SSH user, `~/.ssh/id_rsa`, 10s/15s/30s
    /// timeouts).
    ///
    /// Fails fast on an empty or whitespace host; a bad target must never
    /// enter a retry loop.
    pub fn new(host: &str) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(CoreError::InvalidTarget("empty host".to_string()));
        }
        if host.contains(char::is_whitespace) || host.contains('/') {
            return Err(CoreError::InvalidTarget(host.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            scheme: "http".to_string(),
            ssh_user: "ubuntu".to_string(),
            ssh_key: PathBuf::from("~/.ssh/id_rsa"),
            connect_timeout_secs: 10,
            request_timeout_secs: 15,
            command_timeout_secs: 30,
            api_token: None,
        })
    }

    /// Override the SSH user.
    pub fn with_ssh_user(mut self, user: &str) -> Self {
        self.ssh_user = user.to_string();
        self
    }

    /// Override the SSH private key path.
    pub fn with_ssh_key(mut self, key: PathBuf) -> Self {
        self.ssh_key = key;
        self
    }

    /// Attach an API token.
    pub fn with_api_token(mut self, token: &str) -> Self {
        self.api_token = Some(token.to_string());
        self
    }

    /// Override the per-request HTTP timeout.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Base URL of the target web service.
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// URL for a path under the target web service.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = TargetContext::new("203.0.113.10").unwrap();
        assert_eq!(ctx.ssh_user, "ubuntu");
        assert_eq!(ctx.scheme, "http");
        assert_eq!(ctx.connect_timeout_secs, 10);
        assert_eq!(ctx.base_url(), "http://203.0.113.10");
    }

    #[test]
    fn test_url_join() {
        let ctx = TargetContext::new("gitlab.internal").unwrap();
        assert_eq!(ctx.url("/users/sign_in"), "http://gitlab.internal/users/sign_in");
        assert_eq!(ctx.url("users/sign_in"), "http://gitlab.internal/users/sign_in");
    }

    #[test]
    fn test_empty_host_rejected() {
        assert!(TargetContext::new("").is_err());
        assert!(TargetContext::new("   ").is_err());
    }

    #[test]
    fn test_malformed_host_rejected() {
        assert!(TargetContext::new("host with spaces").is_err());
        assert!(TargetContext::new("http://already-a-url").is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let ctx = TargetContext::new("10.0.0.5")
            .unwrap()
            .with_ssh_user("admin")
            .with_api_token("glpat-123");
        assert_eq!(ctx.ssh_user, "admin");
        assert_eq!(ctx.api_token.as_deref(), Some("glpat-123"));
    }
}
