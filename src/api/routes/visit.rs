//! Visit control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Getting visit status (GET /visit/status)
//! - Toggling the microphone (POST /visit/microphone)
//! - Toggling the camera (POST /visit/video)
//! - Ending the visit (POST /visit/end)

use crate::api::error::ApiResult;
use crate::visit::VisitOrchestrator;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Shared state for visit routes.
#[derive(Clone)]
pub struct VisitState {
    pub orchestrator: Arc<VisitOrchestrator>,
}

pub fn router(state: VisitState) -> Router {
    Router::new()
        .route("/visit/status", get(visit_status))
        .route("/visit/microphone", post(toggle_microphone))
        .route("/visit/video", post(toggle_video))
        .route("/visit/end", post(end_visit))
        .with_state(state)
}

async fn visit_status(State(state): State<VisitState>) -> Json<Value> {
    let status = state.orchestrator.status();

    Json(json!({
        "active": status.is_active(),
        "state": status.state,
        "appointment_id": status.appointment_id,
        "meeting_id": status.meeting_id,
        "role": status.role,
        "microphone_muted": status.microphone_muted,
        "video_enabled": status.video_enabled,
        "duration_seconds": status.duration_seconds(),
        "last_error": status.last_error,
        "last_warning": status.last_warning,
    }))
}

async fn toggle_microphone(State(state): State<VisitState>) -> Json<Value> {
    info!("Microphone toggle received via API");

    match state.orchestrator.toggle_microphone() {
        Some(muted) => Json(json!({
            "changed": true,
            "microphone_muted": muted,
        })),
        None => Json(json!({
            "changed": false,
            "message": "No active visit",
        })),
    }
}

async fn toggle_video(State(state): State<VisitState>) -> Json<Value> {
    info!("Video toggle received via API");

    match state.orchestrator.toggle_video() {
        Some(enabled) => Json(json!({
            "changed": true,
            "video_enabled": enabled,
        })),
        None => Json(json!({
            "changed": false,
            "message": "No active visit",
        })),
    }
}

async fn end_visit(State(state): State<VisitState>) -> ApiResult<Json<Value>> {
    info!("End visit received via API");

    let meeting_id = state.orchestrator.status().meeting_id.unwrap_or_default();
    let outcome = state.orchestrator.end_meeting(&meeting_id).await?;

    Ok(Json(json!({
        "success": true,
        "meeting_id": outcome.meeting_id,
        "state": state.orchestrator.state(),
        "notify_warning": outcome.notify_warning,
    })))
}
