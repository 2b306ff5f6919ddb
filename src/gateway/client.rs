//! HTTP client for the credential gateway.
//!
//! All endpoints are `POST` with a JSON body and a bearer header. Non-2xx
//! responses are turned into [`GatewayError`] carrying the server's
//! `detail` message when there is one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{
    CreateMeetingRequest, CreateMeetingResponse, EndMeetingRequest, ErrorResponse,
    JoinMeetingRequest, MeetingGrant, Role,
};
use super::CredentialGateway;
use crate::auth::BearerCredential;
use crate::error::GatewayError;

/// Client for the meetings endpoints of the clinic backend.
pub struct HttpCredentialGateway {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCredentialGateway {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `https://clinic.example.com/api/v1`
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid gateway base URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Gateway base URL cannot have path segments: {}", base_url);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build gateway HTTP client")?;

        info!("Credential gateway at {}", base_url);

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and return the raw body of a 2xx response.
    async fn post<B: Serialize>(
        &self,
        bearer: &BearerCredential,
        url: Url,
        body: &B,
    ) -> Result<String, GatewayError> {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url.clone())
            .header(reqwest::header::AUTHORIZATION, bearer.header_value())
            .json(body)
            .send()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to reach gateway: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::network(format!("Failed to read gateway response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|e| e.message())
                .unwrap_or_else(|| {
                    if text.trim().is_empty() {
                        format!("Gateway request failed ({})", status)
                    } else {
                        format!("Gateway request failed ({}): {}", status, text.trim())
                    }
                });
            warn!("Gateway {} returned {}", url.path(), status);
            return Err(GatewayError::status(status.as_u16(), message));
        }

        Ok(text)
    }
}

#[async_trait]
impl CredentialGateway for HttpCredentialGateway {
    async fn create_meeting(
        &self,
        bearer: &BearerCredential,
        appointment_id: &str,
    ) -> Result<MeetingGrant, GatewayError> {
        let url = self.endpoint(&["meetings", "create"]);
        let body = self
            .post(bearer, url, &CreateMeetingRequest { appointment_id })
            .await?;

        let response: CreateMeetingResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::malformed(e.to_string()))?;

        Ok(response.into())
    }

    async fn join_meeting(
        &self,
        bearer: &BearerCredential,
        meeting_id: &str,
        appointment_id: &str,
        role: Role,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&["meetings", meeting_id, "join"]);
        self.post(bearer, url, &JoinMeetingRequest { appointment_id, role })
            .await?;
        Ok(())
    }

    async fn end_meeting(
        &self,
        bearer: &BearerCredential,
        meeting_id: &str,
        appointment_id: &str,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&["meetings", meeting_id, "end"]);
        self.post(bearer, url, &EndMeetingRequest { appointment_id })
            .await?;
        Ok(())
    }
}
