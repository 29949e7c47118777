//! HTTP command interface.
//!
//! Exposes start, QR, status, send, chat and message listings, mark-read and
//! logout as JSON endpoints. Failures answer `{"error": ...}`.

mod routes;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::info;
use serde_json::json;

use crate::error::BridgeError;
use crate::manager::SessionManager;

/// Shared state accessible from handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
}

/// Build the router with all routes.
pub fn router(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/start", post(routes::start))
        .route("/qr_code/{session_id}", get(routes::qr_code))
        .route("/status/{session_id}", get(routes::status))
        .route("/send", post(routes::send))
        .route("/chats/{session_id}", get(routes::chats))
        .route("/messages/{session_id}/{chat_id}", get(routes::messages))
        .route("/read/{session_id}", post(routes::mark_read))
        .route("/logout/{session_id}", post(routes::logout))
        .with_state(AppState { manager })
}

/// Serve the command interface on `addr` until Ctrl-C.
pub async fn serve(addr: &str, manager: Arc<SessionManager>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("WhatsApp bridge listening on {}", listener.local_addr()?);

    axum::serve(listener, router(manager))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}

impl BridgeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::AlreadyExists => StatusCode::CONFLICT,
            BridgeError::NotFound | BridgeError::NotAvailable => StatusCode::NOT_FOUND,
            BridgeError::NotConnected | BridgeError::MissingParameters => StatusCode::BAD_REQUEST,
            BridgeError::SendFailed(_)
            | BridgeError::RelayFailed(_)
            | BridgeError::ClientFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
