//! API Routes

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::composer::{compose, EventContext, EventSource, Notification};
use crate::device_directory::{Device, DeviceTemplates, RegisterDeviceRequest};
use crate::error::Result;
use crate::filter::FilterConfig;
use crate::models::ApiResponse;
use crate::review_tracker::NotificationDecision;
use crate::state::AppState;
use crate::stats::StatsSnapshot;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/healthz", get(super::health_check))
        .route("/api/status", get(super::service_status))
        // Devices
        .route("/api/devices", get(list_devices))
        .route("/api/devices", post(register_device))
        .route("/api/devices/:id", get(get_device))
        .route("/api/devices/:id", delete(remove_device))
        .route("/api/devices/:id/templates", put(update_templates))
        // Filter config
        .route("/api/config/filters", get(get_filters))
        .route("/api/config/filters", put(update_filters))
        // Statistics
        .route("/api/stats", get(get_stats))
        // Test notification fan-out
        .route("/api/test/notify", post(test_notify))
        .with_state(state)
}

async fn list_devices(State(state): State<AppState>) -> Json<ApiResponse<Vec<Device>>> {
    Json(ApiResponse::success(state.devices.list_all().await))
}

async fn register_device(
    State(state): State<AppState>,
    Json(request): Json<RegisterDeviceRequest>,
) -> Result<Json<ApiResponse<Device>>> {
    let device = state.devices.register(request).await?;
    Ok(Json(ApiResponse::success(device)))
}

async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Device>>> {
    let device = state
        .devices
        .get(&id)
        .await
        .ok_or_else(|| crate::Error::NotFound(format!("device {}", id)))?;
    Ok(Json(ApiResponse::success(device)))
}

async fn remove_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>> {
    state.devices.remove(&id).await?;
    Ok(Json(ApiResponse::success(())))
}

async fn update_templates(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(templates): Json<DeviceTemplates>,
) -> Result<Json<ApiResponse<Device>>> {
    let device = state.devices.update_templates(&id, templates).await?;
    Ok(Json(ApiResponse::success(device)))
}

async fn get_filters(State(state): State<AppState>) -> Json<ApiResponse<FilterConfig>> {
    Json(ApiResponse::success(state.config_store.snapshot().await))
}

async fn update_filters(
    State(state): State<AppState>,
    Json(config): Json<FilterConfig>,
) -> Result<Json<ApiResponse<FilterConfig>>> {
    state.config_store.update(config.clone()).await?;
    Ok(Json(ApiResponse::success(config)))
}

async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<StatsSnapshot>> {
    Json(ApiResponse::success(state.stats.snapshot().await))
}

/// Send a canned notification to every registered device
async fn test_notify(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>> {
    let context = EventContext {
        event_id: format!("test-{}", chrono::Utc::now().timestamp()),
        camera: Some("test_camera".to_string()),
        labels: vec!["person".to_string()],
        zones: vec!["test zone".to_string()],
        start_time: Some(chrono::Utc::now().timestamp() as f64),
        score: None,
        image_ref: None,
        source: EventSource::Review,
    };

    let devices = state.devices.list_all().await;
    let batch: Vec<(Device, Notification)> = devices
        .into_iter()
        .filter_map(|device| {
            compose(NotificationDecision::SendNew, &context, &device.templates)
                .map(|notification| (device, notification))
        })
        .collect();

    let outcome = state.dispatcher.dispatch_batch(batch).await;
    state
        .stats
        .record_dispatch(outcome.sent, outcome.failed, outcome.skipped)
        .await;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "sent": outcome.sent,
        "failed": outcome.failed,
        "skipped": outcome.skipped,
    }))))
}
