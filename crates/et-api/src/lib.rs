//! # et-api
//!
//! The HTTP routing and orchestration layer for EventThreads.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::AppState;

/// Configures the routes for the EventThreads API.
///
/// # Developer Note
/// Core operations are nested under `/api` so the web client can be served
/// from the same origin in front of it; `/health` and `/metrics` stay at the root.
pub fn configure_routes(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/threads", get(handlers::list_threads).post(handlers::create_thread))
        .route(
            "/threads/{id}",
            get(handlers::get_thread).put(handlers::update_thread).delete(handlers::delete_thread),
        )
        .route("/threads/{id}/join", post(handlers::request_join))
        .route("/threads/{id}/requests", post(handlers::resolve_request))
        .route("/threads/{id}/messages", post(handlers::post_message))
        .route("/admin/dashboard", get(handlers::admin_dashboard));

    Router::new()
        .nest("/api", api)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::record_errors))
        .with_state(state)
}
