//! Session builder: turns a meeting descriptor and one attendee credential
//! into a ready-to-start media session. No network calls.

use chrono::{DateTime, Utc};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::devices::{DeviceController, RenderTargets};
use super::session::{MediaEngine, MediaEventReceiver, MediaSession};
use crate::error::VisitError;
use crate::gateway::{AttendeeCredential, MeetingDescriptor};

/// Validated, read-only input to a media engine.
#[derive(Debug, Clone)]
pub struct SessionConfiguration {
    pub session_id: Uuid,
    pub meeting_id: String,
    pub region: String,
    pub signaling_url: Url,
    pub audio_host_url: Url,
    pub turn_control_url: Option<Url>,
    pub attendee_id: String,
    pub external_user_id: String,
    pub join_token: SecretString,
    pub expires_at: DateTime<Utc>,
}

/// A session plus the receiving end of its event channel.
pub struct BuiltSession {
    pub session: Arc<dyn MediaSession>,
    pub devices: DeviceController,
    pub events: MediaEventReceiver,
}

pub struct SessionBuilder {
    engine: Arc<dyn MediaEngine>,
}

impl SessionBuilder {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        Self { engine }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Combine descriptor and credential, rejecting incomplete transport data.
    pub fn configuration(
        meeting: &MeetingDescriptor,
        credential: &AttendeeCredential,
    ) -> Result<SessionConfiguration, VisitError> {
        if meeting.meeting_id.trim().is_empty() {
            return Err(VisitError::Configuration("meeting id is empty".to_string()));
        }
        if meeting.region.trim().is_empty() {
            return Err(VisitError::Configuration("media region is missing".to_string()));
        }

        let transport = &meeting.transport;
        let signaling_url = required_url("signaling_url", transport.signaling_url.as_deref())?;
        let audio_host_url = required_url("audio_host_url", transport.audio_host_url.as_deref())?;
        let turn_control_url = transport
            .turn_control_url
            .as_deref()
            .map(|raw| parse_url("turn_control_url", raw))
            .transpose()?;

        if credential.attendee_id.trim().is_empty() {
            return Err(VisitError::Configuration("attendee id is empty".to_string()));
        }
        if credential.join_token.expose_secret().is_empty() {
            return Err(VisitError::Configuration("join token is empty".to_string()));
        }

        Ok(SessionConfiguration {
            session_id: Uuid::new_v4(),
            meeting_id: meeting.meeting_id.clone(),
            region: meeting.region.clone(),
            signaling_url,
            audio_host_url,
            turn_control_url,
            attendee_id: credential.attendee_id.clone(),
            external_user_id: credential.external_user_id.clone(),
            join_token: credential.join_token.clone(),
            expires_at: meeting.expires_at,
        })
    }

    /// Build the configuration, a device controller and the media session.
    pub fn build(
        &self,
        meeting: &MeetingDescriptor,
        credential: &AttendeeCredential,
        targets: RenderTargets,
    ) -> Result<BuiltSession, VisitError> {
        let config = Self::configuration(meeting, credential)?;
        debug!(
            "Building {} session {} for meeting {} (attendee {})",
            self.engine.name(),
            config.session_id,
            config.meeting_id,
            config.attendee_id
        );

        let devices = DeviceController::new(targets);
        let (tx, rx) = mpsc::unbounded_channel();
        let session = self
            .engine
            .create_session(config, devices.clone(), tx)
            .map_err(|e| VisitError::MediaFailure(format!("Failed to create media session: {}", e)))?;

        Ok(BuiltSession {
            session,
            devices,
            events: rx,
        })
    }
}

fn required_url(field: &str, raw: Option<&str>) -> Result<Url, VisitError> {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => parse_url(field, value),
        _ => Err(VisitError::Configuration(format!(
            "transport placement is missing {}",
            field
        ))),
    }
}

fn parse_url(field: &str, raw: &str) -> Result<Url, VisitError> {
    Url::parse(raw.trim())
        .map_err(|e| VisitError::Configuration(format!("{} is not a valid URL: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TransportPlacement;
    use crate::media::loopback::LoopbackEngine;

    fn meeting() -> MeetingDescriptor {
        MeetingDescriptor {
            meeting_id: "m-1".to_string(),
            transport: TransportPlacement {
                signaling_url: Some("wss://signal.example.com/control".to_string()),
                audio_host_url: Some("https://audio.example.com:3478".to_string()),
                turn_control_url: None,
            },
            region: "us-east-1".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn credential() -> AttendeeCredential {
        AttendeeCredential {
            attendee_id: "a-doc".to_string(),
            join_token: SecretString::from("join-secret"),
            external_user_id: "dr-7".to_string(),
        }
    }

    #[test]
    fn test_configuration_from_complete_descriptor() {
        let config = SessionBuilder::configuration(&meeting(), &credential()).unwrap();
        assert_eq!(config.meeting_id, "m-1");
        assert_eq!(config.signaling_url.scheme(), "wss");
        assert_eq!(config.audio_host_url.port(), Some(3478));
        assert_eq!(config.join_token.expose_secret(), "join-secret");
        assert!(!format!("{:?}", config).contains("join-secret"));
    }

    #[test]
    fn test_missing_signaling_url() {
        let mut m = meeting();
        m.transport.signaling_url = None;
        let err = SessionBuilder::configuration(&m, &credential()).unwrap_err();
        assert!(matches!(err, VisitError::Configuration(ref msg) if msg.contains("signaling_url")));
    }

    #[test]
    fn test_blank_audio_host_url() {
        let mut m = meeting();
        m.transport.audio_host_url = Some("   ".to_string());
        assert!(matches!(
            SessionBuilder::configuration(&m, &credential()),
            Err(VisitError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_optional_turn_url() {
        let mut m = meeting();
        m.transport.turn_control_url = Some("::nope".to_string());
        assert!(matches!(
            SessionBuilder::configuration(&m, &credential()),
            Err(VisitError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_region_and_attendee() {
        let mut m = meeting();
        m.region.clear();
        assert!(SessionBuilder::configuration(&m, &credential()).is_err());

        let mut c = credential();
        c.attendee_id.clear();
        assert!(SessionBuilder::configuration(&meeting(), &c).is_err());
    }

    #[test]
    fn test_build_binds_targets() {
        let builder = SessionBuilder::new(Arc::new(LoopbackEngine));
        let targets = RenderTargets {
            local: Some(crate::media::RenderTarget::new("self-view")),
            remote: None,
        };
        let built = builder.build(&meeting(), &credential(), targets.clone()).unwrap();
        assert_eq!(built.devices.targets(), targets);
        assert!(!built.devices.is_released());
    }
}
