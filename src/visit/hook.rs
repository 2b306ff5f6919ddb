//! Meeting-ended hook abstraction and shell command implementation.
//!
//! Runs once whenever a visit whose media went live stops, gracefully or
//! not (e.g. to flip the appointment to "completed" or page support on a
//! dropped call). Hooks never see join tokens.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::state::SessionState;
use crate::gateway::Role;
use crate::media::StopReason;

/// Environment variable names for visit metadata passed to hooks.
pub mod hook_env {
    pub const MEETING_ID: &str = "TELEVISIT_MEETING_ID";
    pub const APPOINTMENT_ID: &str = "TELEVISIT_APPOINTMENT_ID";
    pub const ROLE: &str = "TELEVISIT_ROLE";
    pub const END_REASON: &str = "TELEVISIT_END_REASON";
    pub const OUTCOME: &str = "TELEVISIT_OUTCOME";
    pub const DURATION_SECONDS: &str = "TELEVISIT_DURATION_SECONDS";
}

/// What happened to a visit, handed to the meeting-ended hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingEndedReport {
    pub meeting_id: String,
    pub appointment_id: String,
    pub role: Option<Role>,
    pub reason: StopReason,
    /// Ended or Failed.
    pub outcome: SessionState,
    pub duration_seconds: u64,
}

impl MeetingEndedReport {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "meeting_id": self.meeting_id,
            "appointment_id": self.appointment_id,
            "role": self.role,
            "reason": self.reason.code(),
            "outcome": self.outcome,
            "duration_seconds": self.duration_seconds,
        })
    }

    /// The same fields as flat environment variables.
    pub fn env(&self) -> [(&'static str, String); 6] {
        [
            (hook_env::MEETING_ID, self.meeting_id.clone()),
            (hook_env::APPOINTMENT_ID, self.appointment_id.clone()),
            (
                hook_env::ROLE,
                self.role.map(|r| r.as_str()).unwrap_or_default().to_string(),
            ),
            (hook_env::END_REASON, self.reason.code().to_string()),
            (hook_env::OUTCOME, self.outcome.as_str().to_string()),
            (hook_env::DURATION_SECONDS, self.duration_seconds.to_string()),
        ]
    }
}

#[async_trait]
pub trait MeetingEndedHook: Send + Sync {
    /// An error is logged by the caller; it never changes visit state.
    async fn execute(&self, report: &MeetingEndedReport) -> Result<()>;
}

/// Runs `sh -c <command>` with the report as JSON on stdin and as
/// `TELEVISIT_*` variables. Spawn failure, non-zero exit and timeout are
/// errors; on timeout the child is killed.
pub struct ShellCommandHook {
    command: String,
    timeout: Duration,
}

impl ShellCommandHook {
    pub fn new(command: String, timeout_seconds: u64) -> Self {
        Self {
            command,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    fn command(&self, report: &MeetingEndedReport) -> Command {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .envs(report.env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl MeetingEndedHook for ShellCommandHook {
    async fn execute(&self, report: &MeetingEndedReport) -> Result<()> {
        debug!(
            "Running meeting-ended hook for meeting {}: {}",
            report.meeting_id, self.command
        );

        let mut child = self
            .command(report)
            .spawn()
            .with_context(|| format!("Failed to spawn meeting-ended hook `{}`", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = report.to_json().to_string();
            // Commands that ignore stdin may close the pipe first.
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                debug!("Meeting-ended hook did not read the report: {}", e);
            }
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.context("Failed to wait for meeting-ended hook")?,
            Err(_) => bail!(
                "Meeting-ended hook timed out after {}s and was killed",
                self.timeout.as_secs()
            ),
        };

        for line in String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter(|line| !line.trim().is_empty())
        {
            info!("[meeting-ended hook] {}", line);
        }

        if !output.status.success() {
            bail!(
                "Meeting-ended hook exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!("Meeting-ended hook finished for meeting {}", report.meeting_id);
        Ok(())
    }
}
