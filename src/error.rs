//! Error taxonomy for visit lifecycle operations.
//!
//! Every public orchestrator operation resolves or fails with one of these
//! kinds. Application plumbing (config, CLI, server startup) stays on
//! `anyhow`.

use thiserror::Error;

use crate::visit::state::SessionState;

/// Failure talking to the credential gateway.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct GatewayError {
    /// HTTP status, when the gateway answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl GatewayError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: format!("Malformed gateway response: {}", message.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum VisitError {
    #[error("Authentication required: no valid bearer credential")]
    AuthRequired,

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Credentials unavailable: {0}")]
    CredentialsUnavailable(String),

    #[error("Invalid session configuration: {0}")]
    Configuration(String),

    #[error("Cannot {operation} while session is {}", .state.as_str())]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Another {0} operation is already in progress")]
    OperationInProgress(&'static str),

    #[error("Media failure: {0}")]
    MediaFailure(String),
}

impl VisitError {
    pub fn invalid_state(operation: &'static str, state: SessionState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Stable code used by the control API and CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthRequired => "auth_required",
            Self::Gateway(_) => "gateway_error",
            Self::CredentialsUnavailable(_) => "credentials_unavailable",
            Self::Configuration(_) => "configuration_error",
            Self::InvalidState { .. } => "invalid_state",
            Self::OperationInProgress(_) => "operation_in_progress",
            Self::MediaFailure(_) => "media_failure",
        }
    }

    /// Only transient gateway and media failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::MediaFailure(_))
    }

    /// Short message suitable for showing to a clinician or patient.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthRequired => "Please sign in again to start the visit.".to_string(),
            Self::Gateway(e) => format!("Could not reach the visit service: {}", e.message),
            Self::CredentialsUnavailable(_) => {
                "This visit is not ready to join yet. Create the meeting first.".to_string()
            }
            Self::Configuration(_) => {
                "The visit service returned incomplete meeting details.".to_string()
            }
            Self::InvalidState { .. } => "That action is not available right now.".to_string(),
            Self::OperationInProgress(_) => "Please wait for the current action to finish.".to_string(),
            Self::MediaFailure(reason) => format!("Camera or microphone problem: {}", reason),
        }
    }

    /// Caller bugs rather than runtime conditions.
    pub fn is_caller_bug(&self) -> bool {
        matches!(self, Self::InvalidState { .. } | Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(VisitError::Gateway(GatewayError::network("down")).is_retryable());
        assert!(VisitError::MediaFailure("denied".into()).is_retryable());
        assert!(!VisitError::AuthRequired.is_retryable());
        assert!(!VisitError::Configuration("x".into()).is_retryable());
        assert!(!VisitError::invalid_state("join", SessionState::Ended).is_retryable());
        assert!(!VisitError::OperationInProgress("create").is_retryable());
    }

    #[test]
    fn test_invalid_state_message() {
        let err = VisitError::invalid_state("join the meeting", SessionState::Active);
        assert_eq!(err.to_string(), "Cannot join the meeting while session is active");
        assert_eq!(err.kind(), "invalid_state");
        assert!(err.is_caller_bug());
    }

    #[test]
    fn test_gateway_message_passthrough() {
        let err = VisitError::from(GatewayError::status(404, "Appointment not found"));
        assert_eq!(err.to_string(), "Gateway error: Appointment not found");
        assert!(err.user_message().contains("Appointment not found"));
    }
}
