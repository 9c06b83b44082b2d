//! HTTP and WebSocket surface of the gateway.

pub mod handlers;
pub mod ws;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::{service::InferenceService, session::SessionRegistry};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InferenceService>,
    pub sessions: SessionRegistry,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/predict", get(handlers::predict))
        .route("/predict/", get(handlers::predict))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
