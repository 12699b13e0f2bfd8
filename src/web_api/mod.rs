//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - HTTP API routes
//! - Request validation
//! - Response formatting

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::broker::ConnectionState;
use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let broker_connected = *state.broker_state.borrow() == ConnectionState::Connected;
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_sec: uptime.num_seconds().max(0) as u64,
        broker_connected,
        tracked_reviews: state.tracker.tracked_count().await,
        registered_devices: state.devices.count().await,
    };

    Json(response)
}

/// Status endpoint
pub async fn service_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "service": "camnotify",
        "version": env!("CARGO_PKG_VERSION"),
        "review_topic": state.config.review_topic,
        "legacy_topic": state.config.legacy_topic,
        "status": "running"
    }))
}
