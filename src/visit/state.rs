//! Session state machine values and the status snapshot hosts render.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::gateway::Role;

/// Lifecycle of one visit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Creating,
    Created,
    Joining,
    Active,
    Ending,
    Ended,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Joining => "joining",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Ended => "ended",
            Self::Failed => "failed",
        }
    }

    /// Ended and Failed are final for an orchestrator instance.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a visit, safe to hand to UI or API layers.
/// Carries no credentials.
#[derive(Debug, Clone, Serialize)]
pub struct VisitStatus {
    pub state: SessionState,
    pub appointment_id: Option<String>,
    pub meeting_id: Option<String>,
    pub role: Option<Role>,
    pub microphone_muted: bool,
    pub video_enabled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_warning: Option<String>,
}

impl Default for VisitStatus {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            appointment_id: None,
            meeting_id: None,
            role: None,
            microphone_muted: false,
            video_enabled: true,
            started_at: None,
            last_error: None,
            last_warning: None,
        }
    }
}

impl VisitStatus {
    /// Seconds since media went live.
    pub fn duration_seconds(&self) -> Option<u64> {
        self.started_at.map(|started| {
            let elapsed = Utc::now() - started;
            elapsed.num_seconds().max(0) as u64
        })
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }
}
