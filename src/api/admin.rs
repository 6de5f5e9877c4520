//! Admin endpoints — account provisioning, transcript inspection,
//! bulk import, and export.

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tracing::{error, info};

use super::{AppState, error_response, resolve_admin};
use crate::error::DatabaseError;
use crate::provision::export_csv;
use crate::store::model::{AgentVariant, NewAccount};

/// GET /api/admin/accounts — list every non-admin account.
pub async fn list_accounts(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = resolve_admin(&state, &headers).await {
        return resp;
    }

    match state.store.list_accounts().await {
        Ok(accounts) => Json(serde_json::json!({ "accounts": accounts })).into_response(),
        Err(e) => {
            error!(error = %e, "Account listing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub password: String,
    pub variant: AgentVariant,
    #[serde(default)]
    pub is_admin: bool,
}

/// POST /api/admin/accounts — create a single account.
pub async fn create_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAccountRequest>,
) -> Response {
    if let Err(resp) = resolve_admin(&state, &headers).await {
        return resp;
    }

    let username = req.username.trim();
    if username.is_empty() || req.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Username and password are required");
    }

    let password_hash = match crate::auth::hash_password(&req.password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Password hashing failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Password hashing failed");
        }
    };

    let new_account = NewAccount {
        username: username.to_string(),
        password_hash,
        variant: req.variant,
        is_admin: req.is_admin,
    };

    match state.store.create_account(&new_account).await {
        Ok(id) => {
            info!(username, id, "Account created");
            (StatusCode::CREATED, Json(serde_json::json!({ "id": id }))).into_response()
        }
        Err(DatabaseError::Constraint(msg)) => error_response(StatusCode::CONFLICT, msg),
        Err(e) => {
            error!(error = %e, "Account creation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

/// DELETE /api/admin/accounts/{id} — remove an account and its data.
pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let admin = match resolve_admin(&state, &headers).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };

    if admin.id == id {
        return error_response(StatusCode::BAD_REQUEST, "Cannot delete the calling account");
    }

    match state.store.delete_account(id).await {
        Ok(()) => Json(serde_json::json!({ "status": "deleted" })).into_response(),
        Err(e @ DatabaseError::NotFound { .. }) => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Account deletion failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

/// GET /api/admin/accounts/{id}/history — every message the account has
/// exchanged, across all sessions, oldest first.
pub async fn account_history(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = resolve_admin(&state, &headers).await {
        return resp;
    }

    match state.store.list_account_messages(id).await {
        Ok(messages) => Json(serde_json::json!({ "messages": messages })).into_response(),
        Err(e) => {
            error!(error = %e, "Account history fetch failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

/// GET /api/admin/accounts/{id}/variables — structured variables
/// extracted from the account's agent replies.
pub async fn account_variables(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = resolve_admin(&state, &headers).await {
        return resp;
    }

    match state.store.list_account_variables(id).await {
        Ok(variables) => Json(serde_json::json!({ "variables": variables })).into_response(),
        Err(e) => {
            error!(error = %e, "Variable fetch failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

/// POST /api/admin/accounts/{id}/password — set a new password.
pub async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(req): Json<ResetPasswordRequest>,
) -> Response {
    if let Err(resp) = resolve_admin(&state, &headers).await {
        return resp;
    }

    if req.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Password is required");
    }

    let password_hash = match crate::auth::hash_password(&req.password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Password hashing failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Password hashing failed");
        }
    };

    match state.store.set_password_hash(id, &password_hash).await {
        Ok(()) => Json(serde_json::json!({ "status": "updated" })).into_response(),
        Err(e @ DatabaseError::NotFound { .. }) => {
            error_response(StatusCode::NOT_FOUND, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "Password update failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

/// POST /api/admin/import — bulk account import from an uploaded
/// spreadsheet. Always returns 200 with a per-run report; a failed run
/// reports the diagnosis instead of an HTTP error so the admin UI can
/// render it inline.
pub async fn import_accounts(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(resp) = resolve_admin(&state, &headers).await {
        return resp;
    }

    let mut bytes: Option<Vec<u8>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            match field.bytes().await {
                Ok(b) => bytes = Some(b.to_vec()),
                Err(e) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read upload: {e}"),
                    );
                }
            }
        }
    }

    let Some(bytes) = bytes else {
        return error_response(StatusCode::BAD_REQUEST, "Missing file field");
    };

    match state.importer.run(&bytes).await {
        Ok(outcome) => Json(serde_json::json!({
            "created": outcome.created,
            "skipped_existing": outcome.skipped_existing,
            "skipped_blank": outcome.skipped_blank,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "Import run failed");
            Json(serde_json::json!({
                "created": 0,
                "error": e.to_string(),
            }))
            .into_response()
        }
    }
}

/// GET /api/admin/export — full transcript export as a CSV download.
pub async fn export_transcript(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(resp) = resolve_admin(&state, &headers).await {
        return resp;
    }

    match export_csv(&state.store).await {
        Ok(csv_text) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"transcripts.csv\"",
                ),
            ],
            csv_text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Export failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Export failed")
        }
    }
}
