//! Meeting descriptor, attendee credentials and gateway wire payloads.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the visit the local participant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signaling and media endpoints assigned to a meeting.
///
/// Every field is optional on the wire; completeness is checked when a
/// session is built, since the gateway may return partial data during
/// outages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportPlacement {
    #[serde(default)]
    pub signaling_url: Option<String>,
    #[serde(default)]
    pub audio_host_url: Option<String>,
    #[serde(default)]
    pub turn_control_url: Option<String>,
}

/// Server-issued record for one video meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingDescriptor {
    pub meeting_id: String,
    #[serde(rename = "media_placement", default)]
    pub transport: TransportPlacement,
    #[serde(rename = "media_region", default)]
    pub region: String,
    pub expires_at: DateTime<Utc>,
}

impl MeetingDescriptor {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Per-participant join credential. Never serialized back out.
#[derive(Debug, Clone, Deserialize)]
pub struct AttendeeCredential {
    pub attendee_id: String,
    pub join_token: SecretString,
    #[serde(default)]
    pub external_user_id: String,
}

/// Both sides' credentials as returned by meeting creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendeeCredentials {
    #[serde(default)]
    pub doctor: Option<AttendeeCredential>,
    #[serde(default)]
    pub patient: Option<AttendeeCredential>,
}

impl AttendeeCredentials {
    pub fn for_role(&self, role: Role) -> Option<&AttendeeCredential> {
        match role {
            Role::Doctor => self.doctor.as_ref(),
            Role::Patient => self.patient.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.doctor.is_none() && self.patient.is_none()
    }
}

/// Everything a successful create call hands back.
#[derive(Debug, Clone)]
pub struct MeetingGrant {
    pub meeting: MeetingDescriptor,
    pub attendees: AttendeeCredentials,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateMeetingRequest<'a> {
    pub appointment_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct JoinMeetingRequest<'a> {
    pub appointment_id: &'a str,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub(crate) struct EndMeetingRequest<'a> {
    pub appointment_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateMeetingResponse {
    pub meeting: MeetingPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeetingPayload {
    #[serde(flatten)]
    pub descriptor: MeetingDescriptor,
    #[serde(default)]
    pub attendees: AttendeeCredentials,
}

impl From<CreateMeetingResponse> for MeetingGrant {
    fn from(response: CreateMeetingResponse) -> Self {
        Self {
            meeting: response.meeting.descriptor,
            attendees: response.meeting.attendees,
        }
    }
}

/// `{ "detail": ... }` error body. Validation errors may carry a list.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub detail: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        }
    }
}
