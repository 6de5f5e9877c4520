//! REST surface — chat, session management, and admin provisioning.
//!
//! Identity is established upstream (auth proxy / login front-end) and
//! carried as an `x-account` username header; handlers resolve it against
//! the account store and enforce the admin flag where required.

pub mod admin;
pub mod chat;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;

use crate::chat::ChatOrchestrator;
use crate::provision::Importer;
use crate::store::Database;
use crate::store::model::Account;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Database>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub importer: Arc<Importer>,
}

/// Build the Axum router with chat and admin routes.
pub fn app_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat/{variant}", post(chat::post_chat))
        .route("/api/sessions", get(chat::list_sessions))
        .route("/api/sessions/new", post(chat::new_session))
        .route("/api/sessions/{id}/switch", post(chat::switch_session))
        .route("/api/sessions/{id}", delete(chat::delete_session))
        .route("/api/history", get(chat::history))
        .route(
            "/api/admin/accounts",
            get(admin::list_accounts).post(admin::create_account),
        )
        .route("/api/admin/accounts/{id}", delete(admin::delete_account))
        .route("/api/admin/accounts/{id}/history", get(admin::account_history))
        .route(
            "/api/admin/accounts/{id}/variables",
            get(admin::account_variables),
        )
        .route(
            "/api/admin/accounts/{id}/password",
            post(admin::reset_password),
        )
        .route("/api/admin/import", post(admin::import_accounts))
        .route("/api/admin/export", get(admin::export_transcript))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chatclass"
    }))
}

/// JSON error response.
pub(crate) fn error_response(status: StatusCode, message: impl AsRef<str>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.as_ref() })),
    )
        .into_response()
}

/// Resolve the calling account from the `x-account` header.
pub(crate) async fn resolve_account(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Account, Response> {
    let username = headers
        .get("x-account")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Missing x-account header"))?;

    match state.store.get_account_by_username(username).await {
        Ok(Some(account)) => Ok(account),
        Ok(None) => Err(error_response(StatusCode::UNAUTHORIZED, "Unknown account")),
        Err(e) => {
            tracing::error!(error = %e, "Account lookup failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Account lookup failed",
            ))
        }
    }
}

/// Resolve the calling account and require the admin flag.
pub(crate) async fn resolve_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Account, Response> {
    let account = resolve_account(state, headers).await?;
    if !account.is_admin {
        return Err(error_response(StatusCode::FORBIDDEN, "Admin access required"));
    }
    Ok(account)
}
