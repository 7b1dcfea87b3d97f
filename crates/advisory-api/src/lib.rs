pub mod advisories;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
};

use advisory_gateway::connection;

use crate::state::AppState;

/// Routes: the `sendAdvisory` callable, the subscriber gateway and a health check.
pub fn router(state: AppState) -> Router {
    let callable_routes = Router::new()
        .route("/sendAdvisory", post(advisories::send_advisory))
        .layer(from_fn_with_state(state.clone(), middleware::callable_context));

    Router::new()
        .merge(callable_routes)
        .route("/gateway", get(ws_upgrade))
        .route("/health", get(health))
        .with_state(state)
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
