//! eventthreads/crates/et-api/src/middleware.rs Middleware
//!
//! Request tracing, CORS and error accounting layers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{HttpMakeClassifier, TraceLayer};

use crate::error::ErrorKind;
use crate::handlers::AppState;

/// One span per request with method, path and status.
pub fn standard_middleware() -> TraceLayer<HttpMakeClassifier> {
    TraceLayer::new_for_http()
}

/// The web client is served from a different origin than the API.
pub fn cors_policy(allow_any_origin: bool) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));
    if allow_any_origin {
        cors.allow_origin(Any)
    } else {
        cors
    }
}

/// Counts failed calls by the error kind the handler attached.
pub async fn record_errors(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;
    if let Some(ErrorKind(kind)) = response.extensions().get::<ErrorKind>() {
        state.metrics.record_error(kind);
    }
    response
}
