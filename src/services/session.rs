//! Login sessions and websocket tickets.
//!
//! A session token authenticates HTTP calls (cookie or bearer). Browsers
//! cannot attach either to a websocket upgrade, so the client first trades its
//! session for a ticket and passes that in the upgrade query string. Tickets
//! live for a minute and are deleted on first use.
//!
//! Both lifetimes are decided here and written into `expires_at`; the tables
//! carry no defaults of their own.

use std::fmt::Write;

use rand::Rng;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

pub const SESSION_TTL: Duration = Duration::days(30);
pub const WS_TICKET_TTL: Duration = Duration::seconds(60);

/// Lowercase hex of `bytes`.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

/// `N` random bytes as `2 * N` hex characters.
fn random_hex<const N: usize>() -> String {
    let bytes: [u8; N] = rand::rng().random();
    to_hex(&bytes)
}

#[must_use]
pub fn generate_token() -> String {
    random_hex::<32>()
}

#[must_use]
pub(crate) fn generate_ws_ticket() -> String {
    random_hex::<16>()
}

/// The signed-in profile behind a session token.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct SessionUser {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub theme_mode: String,
    pub theme_color: String,
}

/// Open a session for `user_id` and return its token.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(&token)
        .bind(user_id)
        .bind(OffsetDateTime::now_utc() + SESSION_TTL)
        .execute(pool)
        .await?;
    Ok(token)
}

/// Profile of an unexpired session, if any.
///
/// # Errors
///
/// Returns a database error if the lookup fails.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    sqlx::query_as::<_, SessionUser>(
        "SELECT p.id, p.display_name, p.email, p.avatar_url, p.theme_mode, p.theme_color
         FROM sessions s
         JOIN profiles p ON p.id = s.user_id
         WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}

/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Issue a one-use websocket ticket for `user_id`.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_ws_ticket(pool: &PgPool, user_id: Uuid) -> Result<String, sqlx::Error> {
    let ticket = generate_ws_ticket();
    sqlx::query("INSERT INTO ws_tickets (ticket, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(&ticket)
        .bind(user_id)
        .bind(OffsetDateTime::now_utc() + WS_TICKET_TTL)
        .execute(pool)
        .await?;
    Ok(ticket)
}

/// Redeem a ticket. A ticket is deleted on redemption, so a second call with
/// the same value returns `None`.
///
/// # Errors
///
/// Returns a database error if the delete fails.
pub async fn consume_ws_ticket(pool: &PgPool, ticket: &str) -> Result<Option<Uuid>, sqlx::Error> {
    sqlx::query_scalar("DELETE FROM ws_tickets WHERE ticket = $1 AND expires_at > now() RETURNING user_id")
        .bind(ticket)
        .fetch_optional(pool)
        .await
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
