//! HTTP router construction.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::orchestration::Orchestrator;
use crate::server::api;

/// Build the application router over a shared orchestrator.
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/v1/calculate", post(api::calculate))
        .route("/api/v1/expressions", get(api::list_expressions))
        .route("/api/v1/expressions/{id}", get(api::get_expression))
        .route("/internal/task", get(api::get_task).post(api::post_task))
        .route("/internal/stats", get(api::stats))
        .fallback(api::not_found)
        .method_not_allowed_fallback(api::method_not_allowed)
        .with_state(orchestrator)
}
