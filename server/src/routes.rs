use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::app_state::SharedState;
use crate::{handlers, push};

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/push", post(push::handle_push))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
