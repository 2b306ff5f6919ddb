//! Local control API for a running visit.
//!
//! Loopback-only HTTP endpoints for:
//! - Service info
//! - Visit status
//! - Microphone and camera toggles
//! - Ending the visit

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::visit::VisitOrchestrator;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

pub use routes::visit::VisitState;

pub struct ApiServer {
    port: u16,
    visit_state: VisitState,
}

impl ApiServer {
    pub fn new(orchestrator: Arc<VisitOrchestrator>, config: &Config) -> Self {
        Self {
            port: config.api.port,
            visit_state: VisitState { orchestrator },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(status))
            .merge(routes::visit::router(self.visit_state.clone()))
            .layer(ServiceBuilder::new())
    }

    pub async fn start(self) -> Result<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(&format!("127.0.0.1:{}", self.port)).await?;

        info!("Control API listening on http://127.0.0.1:{}", self.port);
        info!("Endpoints:");
        info!("  GET  /                 - Service info");
        info!("  GET  /visit/status     - Get visit status");
        info!("  POST /visit/microphone - Toggle microphone mute");
        info!("  POST /visit/video      - Toggle camera");
        info!("  POST /visit/end        - End the visit");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn status() -> Json<Value> {
    Json(json!({
        "service": "televisit",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}
