//! HTTP API endpoints for driving the sandbox.
//!
//! Every endpoint maps onto one tab operation; the WebSocket offers the same
//! commands plus a live event stream.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::coordinator::ClaimOutcome;
use crate::protocol::TabSnapshot;
use crate::settings::Preferences;
use crate::state::{AppState, SandboxError, SettingsUpdate};
use crate::types::{LeaderRecord, TabId, Visibility};

#[derive(Debug, Default, Deserialize)]
pub struct OpenTabRequest {
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VisibilityResponse {
    pub visibility: Visibility,
    pub changed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotResponse {
    pub key: String,
    pub record: Option<LeaderRecord>,
}

impl IntoResponse for SandboxError {
    fn into_response(self) -> Response {
        let status = match &self {
            SandboxError::UnknownTab(_) => StatusCode::NOT_FOUND,
            SandboxError::Coordinator(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        tracing::warn!("Request failed: {}", self);
        (status, self.to_string()).into_response()
    }
}

/// GET /api/tabs
pub async fn list_tabs(State(state): State<Arc<AppState>>) -> Json<Vec<TabSnapshot>> {
    Json(state.snapshot().await)
}

/// POST /api/tabs
///
/// Body is optional; `{"hidden": true}` opens the tab in the background.
pub async fn open_tab(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = if body.is_empty() {
        OpenTabRequest::default()
    } else {
        match serde_json::from_slice::<OpenTabRequest>(&body) {
            Ok(request) => request,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Invalid request: {}", e))
                    .into_response()
            }
        }
    };

    let tab = state
        .open_tab(Visibility::from_visible(!request.hidden))
        .await;
    (StatusCode::CREATED, Json(tab)).into_response()
}

/// DELETE /api/tabs/{id}
///
/// Abrupt close: the tab does not resign.
pub async fn close_tab(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, SandboxError> {
    state.close_tab(&TabId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tabs/{id}/visibility
pub async fn set_visibility(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Json<VisibilityResponse>, SandboxError> {
    let visibility = Visibility::from_visible(request.visible);
    let changed = state
        .set_visibility(&TabId::from(id), visibility)
        .await?;
    Ok(Json(VisibilityResponse {
        visibility,
        changed,
    }))
}

/// POST /api/tabs/{id}/claim
pub async fn claim(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClaimOutcome>, SandboxError> {
    Ok(Json(state.claim(&TabId::from(id)).await?))
}

/// POST /api/tabs/{id}/resign
pub async fn resign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, SandboxError> {
    state.resign(&TabId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/tabs/{id}/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Preferences>, SandboxError> {
    Ok(Json(state.settings(&TabId::from(id)).await?))
}

/// POST /api/tabs/{id}/settings
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Preferences>, SandboxError> {
    Ok(Json(state.update_settings(&TabId::from(id), update).await?))
}

/// GET /api/slot
pub async fn get_slot(State(state): State<Arc<AppState>>) -> Json<SlotResponse> {
    Json(SlotResponse {
        key: state.config.coordinator.leader_key.clone(),
        record: state.slot(),
    })
}
