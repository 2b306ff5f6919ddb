//! API error handling for consistent JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::error::VisitError;

/// API error type that converts to JSON responses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    retryable: bool,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "kind": self.kind,
            "message": self.message,
            "retryable": self.retryable,
        }));
        (self.status, body).into_response()
    }
}

impl From<VisitError> for ApiError {
    fn from(err: VisitError) -> Self {
        let status = match &err {
            VisitError::AuthRequired => StatusCode::UNAUTHORIZED,
            VisitError::Gateway(_) => StatusCode::BAD_GATEWAY,
            VisitError::CredentialsUnavailable(_)
            | VisitError::InvalidState { .. }
            | VisitError::OperationInProgress(_) => StatusCode::CONFLICT,
            VisitError::Configuration(_) | VisitError::MediaFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if err.is_caller_bug() {
            error!("Control API request hit a caller bug: {}", err);
        }

        Self {
            status,
            kind: err.kind(),
            message: err.user_message(),
            retryable: err.is_retryable(),
        }
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::visit::SessionState;

    #[test]
    fn test_visit_error_status_mapping() {
        assert_eq!(ApiError::from(VisitError::AuthRequired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(VisitError::Gateway(GatewayError::network("down"))).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(VisitError::invalid_state("end the meeting", SessionState::Idle)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(VisitError::OperationInProgress("end")).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_retryable_flag_carried() {
        let err = ApiError::from(VisitError::MediaFailure("camera busy".into()));
        assert!(err.retryable);
        assert_eq!(err.kind, "media_failure");
    }
}
