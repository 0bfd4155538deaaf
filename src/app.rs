use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{api, state::AppState, ws};

/// Routes for the sandbox: REST control plane plus the event WebSocket
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/tabs", get(api::list_tabs).post(api::open_tab))
        .route("/tabs/{id}", axum::routing::delete(api::close_tab))
        .route("/tabs/{id}/visibility", post(api::set_visibility))
        .route("/tabs/{id}/claim", post(api::claim))
        .route("/tabs/{id}/resign", post(api::resign))
        .route(
            "/tabs/{id}/settings",
            get(api::get_settings).post(api::update_settings),
        )
        .route("/slot", get(api::get_slot));

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
