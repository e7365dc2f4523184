pub mod http;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use push::PushGatewayState;

pub use state::AppState;

/// Builds the full HTTP/WS app from an already-constructed `AppState`.
/// Split from `main` so integration tests can drive it without binding a
/// socket.
pub fn build_router(state: Arc<AppState>) -> Router {
    let push_state = Arc::new(PushGatewayState {
        hub: state.push_hub.clone(),
        keys: state.api_keys.clone(),
    });

    let api = Router::new()
        .route("/api/v1/ingest", post(http::ingest_handler))
        .route("/api/v1/query", post(http::query_handler))
        .route("/api/v1/health", get(http::health_handler))
        .route("/api/v1/purge", post(http::purge_handler))
        .with_state(state);

    let ws = Router::new()
        .route("/api/v1/ws", get(push::push_ws))
        .with_state(push_state);

    api.merge(ws)
}
