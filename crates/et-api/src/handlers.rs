//! # et-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core.
//! Every handler resolves the caller's `userId` into a [`Session`] first and
//! then delegates to exactly one core operation.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use et_core::admin::AdminProjection;
use et_core::engine::MembershipEngine;
use et_core::error::AppError;
use et_core::models::{ThreadDraft, ThreadDuration, ThreadId, ThreadPatch, UserId};
use et_core::registry::ThreadRegistry;
use et_core::session::Session;
use et_core::traits::{AuthProvider, Credentials};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::metrics::Metrics;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// State shared across all request handlers.
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub registry: Arc<ThreadRegistry>,
    pub engine: Arc<MembershipEngine>,
    pub admin: Arc<AdminProjection>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    async fn session(&self, user_id: UserId) -> Result<Session, AppError> {
        self.auth.session_for(user_id).await
    }

    async fn optional_session(&self, user_id: Option<UserId>) -> Result<Option<Session>, AppError> {
        match user_id {
            Some(id) => self.session(id).await.map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerQuery {
    pub user_id: Option<UserId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadRequest {
    pub title: String,
    pub description: String,
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub creator_id: UserId,
    pub duration_hours: Option<u32>,
    /// Client-computed deadline, used only to pick the duration
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThreadRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub tags: Option<Vec<String>>,
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequestBody {
    /// The pending requester
    pub user_id: UserId,
    pub approve: bool,
    /// The creator acting on the request
    pub current_user_id: UserId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub user_id: UserId,
    pub message: String,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let credentials = Credentials {
        username: req.username,
        password: req.password,
        is_admin: req.is_admin,
    };
    let session = state.auth.login(credentials).await?;
    Ok(Json(json!({ "success": true, "user": session })))
}

/// GET /api/threads
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    ApiQuery(viewer): ApiQuery<ViewerQuery>,
) -> ApiResult<Json<Value>> {
    let session = state.optional_session(viewer.user_id).await?;
    let threads = state.engine.list_active_views(session.as_ref()).await?;
    Ok(Json(json!({ "success": true, "threads": threads })))
}

/// POST /api/threads
pub async fn create_thread(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateThreadRequest>,
) -> ApiResult<Json<Value>> {
    let session = state.session(req.creator_id).await?;
    let hours = match (req.duration_hours, req.expires_at) {
        (Some(hours), _) => hours,
        (None, Some(at)) => ThreadDuration::until(state.registry.now(), at)?.hours(),
        (None, None) => ThreadDuration::default().hours(),
    };
    let draft = ThreadDraft {
        title: req.title,
        description: req.description,
        location: req.location,
        tags: req.tags,
    };
    let thread = state.registry.create_thread(&session, draft, hours).await?;
    Ok(Json(json!({ "success": true, "thread": thread })))
}

/// GET /api/threads/{id}
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    ApiPath(thread_id): ApiPath<ThreadId>,
    ApiQuery(viewer): ApiQuery<ViewerQuery>,
) -> ApiResult<Json<Value>> {
    let session = state.optional_session(viewer.user_id).await?;
    let view = state.engine.view(thread_id, session.as_ref()).await?;
    Ok(Json(json!({ "success": true, "thread": view })))
}

/// PUT /api/threads/{id}
pub async fn update_thread(
    State(state): State<Arc<AppState>>,
    ApiPath(thread_id): ApiPath<ThreadId>,
    ApiJson(req): ApiJson<UpdateThreadRequest>,
) -> ApiResult<Json<Value>> {
    let session = state.session(req.user_id).await?;
    let patch = ThreadPatch {
        title: req.title,
        description: req.description,
        location: req.location,
        tags: req.tags,
    };
    let thread = state.registry.update_thread(thread_id, &session, patch).await?;
    Ok(Json(json!({ "success": true, "thread": thread })))
}

/// DELETE /api/threads/{id}
pub async fn delete_thread(
    State(state): State<Arc<AppState>>,
    ApiPath(thread_id): ApiPath<ThreadId>,
    ApiJson(req): ApiJson<UserRef>,
) -> ApiResult<Json<Value>> {
    let session = state.session(req.user_id).await?;
    if session.is_admin {
        state.admin.delete_thread(thread_id, &session).await?;
    } else {
        state.registry.delete_thread(thread_id, &session).await?;
    }
    Ok(Json(json!({ "success": true })))
}

/// POST /api/threads/{id}/join
pub async fn request_join(
    State(state): State<Arc<AppState>>,
    ApiPath(thread_id): ApiPath<ThreadId>,
    ApiJson(req): ApiJson<UserRef>,
) -> ApiResult<Json<Value>> {
    let session = state.session(req.user_id).await?;
    state.engine.request_join(thread_id, &session).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/threads/{id}/requests
pub async fn resolve_request(
    State(state): State<Arc<AppState>>,
    ApiPath(thread_id): ApiPath<ThreadId>,
    ApiJson(req): ApiJson<ResolveRequestBody>,
) -> ApiResult<Json<Value>> {
    let acting = state.session(req.current_user_id).await?;
    state.engine.resolve_request(thread_id, req.user_id, req.approve, &acting).await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/threads/{id}/messages
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    ApiPath(thread_id): ApiPath<ThreadId>,
    ApiJson(req): ApiJson<PostMessageRequest>,
) -> ApiResult<Json<Value>> {
    let session = state.session(req.user_id).await?;
    let message = state.engine.post_message(thread_id, &session, &req.message).await?;
    Ok(Json(json!({ "success": true, "message": message })))
}

/// GET /api/admin/dashboard
pub async fn admin_dashboard(
    State(state): State<Arc<AppState>>,
    ApiQuery(viewer): ApiQuery<ViewerQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = viewer
        .user_id
        .ok_or_else(|| ApiError(AppError::ValidationError("userId is required".into())))?;
    let session = state.session(user_id).await?;
    let data = state.admin.dashboard(&session).await?;
    Ok(Json(json!({ "success": true, "data": data })))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError(AppError::Internal(format!("metrics encoding failed: {e}"))))?;
    Ok(([(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body))
}
