//! Credential gateway: the backend that provisions meetings and issues
//! attendee credentials.

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::auth::BearerCredential;
use crate::error::GatewayError;

pub use client::HttpCredentialGateway;
pub use types::{
    AttendeeCredential, AttendeeCredentials, MeetingDescriptor, MeetingGrant, Role,
    TransportPlacement,
};

/// Meeting provisioning backend.
///
/// Callers check the bearer credential before invoking any method; an
/// implementation only sends what it is given.
#[async_trait]
pub trait CredentialGateway: Send + Sync {
    /// Provision a meeting for an appointment and issue both attendees' credentials.
    async fn create_meeting(
        &self,
        bearer: &BearerCredential,
        appointment_id: &str,
    ) -> Result<MeetingGrant, GatewayError>;

    /// Tell the backend a participant is joining.
    async fn join_meeting(
        &self,
        bearer: &BearerCredential,
        meeting_id: &str,
        appointment_id: &str,
        role: Role,
    ) -> Result<(), GatewayError>;

    /// Tell the backend the meeting is over.
    async fn end_meeting(
        &self,
        bearer: &BearerCredential,
        meeting_id: &str,
        appointment_id: &str,
    ) -> Result<(), GatewayError>;
}
