//! Chat and session endpoints.

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use super::{AppState, error_response, resolve_account};
use crate::chat::uploads::Attachment;
use crate::error::ChatError;
use crate::store::model::AgentVariant;

/// POST /api/chat/{variant} — one conversational turn.
///
/// Multipart form: a `message` text field and an optional `file` part.
pub async fn post_chat(
    State(state): State<AppState>,
    Path(variant): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let account = match resolve_account(&state, &headers).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };

    let Ok(variant) = variant.parse::<AgentVariant>() else {
        return error_response(StatusCode::NOT_FOUND, "Unknown agent variant");
    };

    let mut message = String::new();
    let mut attachment: Option<Attachment> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("message") => {
                message = field.text().await.unwrap_or_default();
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.is_empty() {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) => {
                        attachment = Some(Attachment {
                            filename,
                            bytes: bytes.to_vec(),
                        });
                    }
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read upload: {e}"),
                        );
                    }
                }
            }
            _ => {}
        }
    }

    match state
        .orchestrator
        .handle_turn(&account, variant, &message, attachment)
        .await
    {
        Ok(display_text) => Json(serde_json::json!({ "response": display_text })).into_response(),
        Err(e) => chat_error_response(e),
    }
}

fn chat_error_response(e: ChatError) -> Response {
    match e {
        ChatError::Forbidden { .. } => {
            error_response(StatusCode::FORBIDDEN, "This account is not assigned to this agent")
        }
        ChatError::EmptyTurn => {
            error_response(StatusCode::BAD_REQUEST, "Message text or a file is required")
        }
        ChatError::SessionNotFound(id) => {
            error_response(StatusCode::NOT_FOUND, format!("Session {id} not found"))
        }
        ChatError::Upload(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        ChatError::Database(e) => {
            tracing::error!(error = %e, "Turn failed on the store");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

/// GET /api/sessions — the account's sessions, most recent first.
pub async fn list_sessions(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let account = match resolve_account(&state, &headers).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };

    match state.store.list_sessions(account.id).await {
        Ok(sessions) => Json(serde_json::json!({
            "active_session_id": account.active_session_id,
            "sessions": sessions,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Session listing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}

/// POST /api/sessions/new — retire the active session and start a fresh
/// one (session id and remote thread rotate together).
pub async fn new_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let account = match resolve_account(&state, &headers).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };

    match state.orchestrator.start_new_session(&account).await {
        Ok(session_id) => Json(serde_json::json!({ "session_id": session_id })).into_response(),
        Err(e) => chat_error_response(e),
    }
}

/// POST /api/sessions/{id}/switch — make a previously retired session the
/// active one (history viewing).
pub async fn switch_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let account = match resolve_account(&state, &headers).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };

    match state.orchestrator.switch_session(&account, &id).await {
        Ok(()) => Json(serde_json::json!({ "session_id": id })).into_response(),
        Err(e) => chat_error_response(e),
    }
}

/// DELETE /api/sessions/{id} — delete a session's transcript.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let account = match resolve_account(&state, &headers).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };

    match state.orchestrator.delete_session(&account, &id).await {
        Ok(()) => Json(serde_json::json!({ "status": "deleted" })).into_response(),
        Err(e) => chat_error_response(e),
    }
}

/// GET /api/history — transcript of the account's active session.
pub async fn history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let account = match resolve_account(&state, &headers).await {
        Ok(account) => account,
        Err(resp) => return resp,
    };

    let Some(session_id) = account.active_session_id.clone() else {
        return Json(serde_json::json!({ "session_id": null, "messages": [] })).into_response();
    };

    match state.store.list_session_messages(account.id, &session_id).await {
        Ok(messages) => Json(serde_json::json!({
            "session_id": session_id,
            "messages": messages,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "History fetch failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Storage failure")
        }
    }
}
