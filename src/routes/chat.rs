//! Chat routes: history, posting, deletion, read markers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::services::chat::{self, ChatError, ChatMessage};
use crate::services::feed;
use crate::state::AppState;

pub(crate) fn chat_error_to_status(err: &ChatError) -> StatusCode {
    match err {
        ChatError::DashboardNotFound(_) | ChatError::MessageNotFound(_) => StatusCode::NOT_FOUND,
        ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
        ChatError::InvalidMessage => StatusCode::BAD_REQUEST,
        ChatError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self::from_service(chat_error_to_status(&err), &err)
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct SendMessageBody {
    pub message: String,
}

/// `GET /api/dashboards/{id}/chat?limit=N`
pub async fn list_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(chat::list_messages(&state.pool, dashboard_id, auth.user.id, query.limit).await?))
}

/// `POST /api/dashboards/{id}/chat`
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = chat::send_message(&state.pool, dashboard_id, auth.user.id, &body.message).await?;
    feed::publish_chat_message(&state, &message, None).await;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `DELETE /api/chat/{message_id}`: author only.
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(message_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let dashboard_id = chat::delete_message(&state.pool, message_id, auth.user.id).await?;
    feed::publish_chat_delete(&state, dashboard_id, message_id, auth.user.id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/dashboards/{id}/chat/read`
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    chat::mark_read(&state.pool, dashboard_id, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/dashboards/{id}/chat/unread`
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = chat::unread_count(&state.pool, dashboard_id, auth.user.id).await?;
    Ok(Json(serde_json::json!({ "unread_count": count })))
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
