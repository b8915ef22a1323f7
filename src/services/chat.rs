//! Dashboard chat with per-user read markers.
//!
//! Messages are soft-deleted. Listings and unread counts skip rows with
//! `deleted_at` set.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::access;

pub const MAX_MESSAGE_LEN: usize = 2000;
pub const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("dashboard not found: {0}")]
    DashboardNotFound(Uuid),
    #[error("message not found: {0}")]
    MessageNotFound(Uuid),
    #[error("only the author can delete message {0}")]
    Forbidden(Uuid),
    #[error("message must be 1-{MAX_MESSAGE_LEN} characters")]
    InvalidMessage,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DashboardNotFound(_) => "E_DASHBOARD_NOT_FOUND",
            Self::MessageNotFound(_) => "E_MESSAGE_NOT_FOUND",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::InvalidMessage => "E_INVALID_MESSAGE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub dashboard_id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Trim and bound a chat message.
///
/// # Errors
///
/// Returns `InvalidMessage` for blank or overlong text.
pub fn validate_message(raw: &str) -> Result<String, ChatError> {
    let text = raw.trim();
    if text.is_empty() || text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ChatError::InvalidMessage);
    }
    Ok(text.to_owned())
}

#[must_use]
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
}

async fn require_member(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<(), ChatError> {
    access::member_role(pool, dashboard_id, user_id)
        .await?
        .map(|_| ())
        .ok_or(ChatError::DashboardNotFound(dashboard_id))
}

/// The latest `limit` live messages, oldest first.
///
/// # Errors
///
/// Returns `DashboardNotFound` for non-members.
pub async fn list_messages(
    pool: &PgPool,
    dashboard_id: Uuid,
    user_id: Uuid,
    limit: Option<i64>,
) -> Result<Vec<ChatMessage>, ChatError> {
    require_member(pool, dashboard_id, user_id).await?;
    let messages = sqlx::query_as::<_, ChatMessage>(
        "SELECT * FROM (
             SELECT c.id, c.dashboard_id, c.user_id, c.message, p.display_name, p.email, p.avatar_url,
                    c.created_at
             FROM chat_messages c
             JOIN profiles p ON p.id = c.user_id
             WHERE c.dashboard_id = $1 AND c.deleted_at IS NULL
             ORDER BY c.created_at DESC
             LIMIT $2
         ) recent
         ORDER BY created_at ASC",
    )
    .bind(dashboard_id)
    .bind(clamp_limit(limit))
    .fetch_all(pool)
    .await?;
    Ok(messages)
}

/// Post a message as `user_id`.
///
/// # Errors
///
/// Returns `InvalidMessage` or `DashboardNotFound`.
pub async fn send_message(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid, text: &str) -> Result<ChatMessage, ChatError> {
    let text = validate_message(text)?;
    require_member(pool, dashboard_id, user_id).await?;

    let message = sqlx::query_as::<_, ChatMessage>(
        "WITH inserted AS (
             INSERT INTO chat_messages (dashboard_id, user_id, message)
             VALUES ($1, $2, $3)
             RETURNING id, dashboard_id, user_id, message, created_at
         )
         SELECT i.id, i.dashboard_id, i.user_id, i.message, p.display_name, p.email, p.avatar_url, i.created_at
         FROM inserted i
         JOIN profiles p ON p.id = i.user_id",
    )
    .bind(dashboard_id)
    .bind(user_id)
    .bind(&text)
    .fetch_one(pool)
    .await?;

    info!(%dashboard_id, message_id = %message.id, "chat message sent");
    Ok(message)
}

/// Soft-delete a message. Author only. Returns the message's dashboard.
///
/// # Errors
///
/// Returns `MessageNotFound` or `Forbidden`.
pub async fn delete_message(pool: &PgPool, message_id: Uuid, user_id: Uuid) -> Result<Uuid, ChatError> {
    let owner: Option<(Uuid, Uuid)> =
        sqlx::query_as("SELECT dashboard_id, user_id FROM chat_messages WHERE id = $1 AND deleted_at IS NULL")
            .bind(message_id)
            .fetch_optional(pool)
            .await?;
    let Some((dashboard_id, author_id)) = owner else {
        return Err(ChatError::MessageNotFound(message_id));
    };
    if author_id != user_id {
        return Err(ChatError::Forbidden(message_id));
    }

    sqlx::query("UPDATE chat_messages SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(message_id)
        .execute(pool)
        .await?;
    Ok(dashboard_id)
}

/// Move the caller's read marker to now.
///
/// # Errors
///
/// Returns `DashboardNotFound` for non-members.
pub async fn mark_read(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<(), ChatError> {
    require_member(pool, dashboard_id, user_id).await?;
    sqlx::query(
        "INSERT INTO chat_reads (dashboard_id, user_id, last_read_at) VALUES ($1, $2, now())
         ON CONFLICT (dashboard_id, user_id) DO UPDATE SET last_read_at = EXCLUDED.last_read_at",
    )
    .bind(dashboard_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Live messages from others since the caller's read marker.
///
/// # Errors
///
/// Returns `DashboardNotFound` for non-members.
pub async fn unread_count(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<i64, ChatError> {
    require_member(pool, dashboard_id, user_id).await?;
    Ok(count_unread(pool, dashboard_id, user_id).await?)
}

pub(crate) async fn count_unread(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*)
         FROM chat_messages c
         LEFT JOIN chat_reads r ON r.dashboard_id = c.dashboard_id AND r.user_id = $2
         WHERE c.dashboard_id = $1
           AND c.user_id <> $2
           AND c.deleted_at IS NULL
           AND (r.last_read_at IS NULL OR c.created_at > r.last_read_at)",
    )
    .bind(dashboard_id)
    .bind(user_id)
    .fetch_one(pool)
    .await
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
