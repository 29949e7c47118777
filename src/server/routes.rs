//! Command interface handlers.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::BridgeError;
use crate::server::AppState;
use crate::store::SessionStatus;
use crate::types::{ChatSummary, MessageSummary};

type ApiResult<T> = Result<T, BridgeError>;

#[derive(Debug, Deserialize)]
pub(crate) struct StartRequest {
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendRequest {
    session_id: Option<String>,
    chat_id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReadRequest {
    chat_id: Option<String>,
}

/// Query values arrive as text; anything unparsable falls back to defaults.
#[derive(Debug, Deserialize)]
pub(crate) struct MessagesQuery {
    limit: Option<String>,
    before: Option<String>,
}

/// GET /health
pub(crate) async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.manager.sessions().len(),
    }))
}

/// POST /start
pub(crate) async fn start(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> ApiResult<Json<Value>> {
    let session_id = request.session_id.unwrap_or_default();
    state.manager.start(&session_id)?;
    Ok(Json(json!({ "success": true })))
}

/// GET /qr_code/{session_id}
pub(crate) async fn qr_code(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Response> {
    let image = state.manager.qr_code(&session_id)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], image).into_response())
}

/// GET /status/{session_id}
pub(crate) async fn status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionStatus>> {
    Ok(Json(state.manager.status(&session_id)?))
}

/// POST /send
pub(crate) async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> ApiResult<Json<Value>> {
    let message_id = state
        .manager
        .send(
            request.session_id.as_deref().unwrap_or_default(),
            request.chat_id.as_deref().unwrap_or_default(),
            request.message.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "message_id": message_id })))
}

/// GET /chats/{session_id}
pub(crate) async fn chats(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<ChatSummary>>> {
    Ok(Json(state.manager.list_chats(&session_id).await?))
}

/// GET /messages/{session_id}/{chat_id}
pub(crate) async fn messages(
    State(state): State<AppState>,
    Path((session_id, chat_id)): Path<(String, String)>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<Vec<MessageSummary>>> {
    let limit = query.limit.and_then(|l| l.parse().ok());
    let before = query.before.and_then(|b| b.parse().ok());
    Ok(Json(
        state
            .manager
            .list_messages(&session_id, &chat_id, limit, before)
            .await?,
    ))
}

/// POST /read/{session_id}
pub(crate) async fn mark_read(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ReadRequest>,
) -> ApiResult<Json<Value>> {
    state
        .manager
        .mark_read(&session_id, request.chat_id.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// POST /logout/{session_id}
pub(crate) async fn logout(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.manager.logout(&session_id).await?;
    Ok(Json(json!({ "success": true })))
}
