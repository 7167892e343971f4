//! Remote command probe (SSH).

use crate::probe::{Probe, ProbeResult};
use crate::target::TargetContext;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

// OpenSSH uses 255 for its own connection/auth failures; remote commands
// get every other code.
const SSH_EXIT_CODE: i32 = 255;

/// Runs a fixed command on the target host over SSH and classifies the
/// output.
///
/// Host key checking is disabled: the target is an ephemeral, freshly
/// provisioned machine whose key is not known in advance. Do not point
/// this at long-lived production hosts.
pub struct RemoteCommandProbe {
    name: String,
    program: String,
    ssh_user: String,
    host: String,
    ssh_key: PathBuf,
    connect_timeout_secs: u64,
    command_timeout_secs: u64,
    command: String,
    success_pattern: Option<String>,
    failure_patterns: Vec<String>,
}

impl RemoteCommandProbe {
    /// Build a probe that runs `command` on the context's host.
    pub fn new(name: &str, ctx: &TargetContext, command: &str) -> Self {
        Self {
            name: name.to_string(),
            program: "ssh".to_string(),
            ssh_user: ctx.ssh_user.clone(),
            host: ctx.host.clone(),
            ssh_key: ctx.ssh_key.clone(),
            connect_timeout_secs: ctx.connect_timeout_secs,
            command_timeout_secs: ctx.command_timeout_secs,
            command: command.to_string(),
            success_pattern: None,
            failure_patterns: Vec::new(),
        }
    }

    /// Require stdout to contain `pattern` for a pass.
    pub fn with_success_pattern(mut self, pattern: &str) -> Self {
        self.success_pattern = Some(pattern.to_string());
        self
    }

    /// Treat stdout containing `pattern` as a failure even on exit 0.
    ///
    /// `gitlab-ctl status` exits 0 while listing `down:` services; the
    /// failure patterns catch that case. May be called repeatedly.
    pub fn with_failure_pattern(mut self, pattern: &str) -> Self {
        self.failure_patterns.push(pattern.to_string());
        self
    }

    fn classify(&self, exit_code: Option<i32>, stdout: &str, stderr: &str) -> ProbeResult {
        match exit_code {
            Some(0) => {
                for pattern in &self.failure_patterns {
                    if stdout.contains(pattern.as_str()) {
                        return ProbeResult::Fail(format!(
                            "output contains \"{}\"",
                            pattern
                        ));
                    }
                }
                match &self.success_pattern {
                    Some(pattern) if !stdout.contains(pattern.as_str()) => ProbeResult::Fail(
                        format!("output did not contain \"{}\"", pattern),
                    ),
                    _ => ProbeResult::Pass,
                }
            }
            Some(SSH_EXIT_CODE) => ProbeResult::Indeterminate(format!(
                "ssh connection to {}@{} failed: {}",
                self.ssh_user,
                self.host,
                stderr.trim()
            )),
            Some(code) => ProbeResult::Fail(format!(
                "remote command exited with {}: {}",
                code,
                stderr.trim()
            )),
            None => {
                ProbeResult::Indeterminate("remote command terminated by signal".to_string())
            }
        }
    }
}

#[async_trait]
impl Probe for RemoteCommandProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ProbeResult {
        debug!(probe = %self.name, host = %self.host, "running remote command");

        let mut cmd = Command::new(&self.program);
        cmd.arg("-i")
            .arg(&self.ssh_key)
            .args(["-o", "StrictHostKeyChecking=no"])
            .args(["-o", "UserKnownHostsFile=/dev/null"])
            .args(["-o", "LogLevel=ERROR"])
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg(format!("{}@{}", self.ssh_user, self.host))
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(err) => {
                return ProbeResult::Indeterminate(format!(
                    "failed to spawn {}: {}",
                    self.program, err
                ));
            }
        };

        let output = match tokio::time::timeout(
            Duration::from_secs(self.command_timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                return ProbeResult::Indeterminate(format!("remote execution failed: {}", err));
            }
            Err(_) => {
                return ProbeResult::Indeterminate(format!(
                    "remote command timed out after {}s",
                    self.command_timeout_secs
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        self.classify(output.status.code(), &stdout, &stderr)
    }
}
