//! Email invites to a dashboard.
//!
//! An owner invites an address; the recipient sees the invite once signed in
//! with that address and can accept (capacity-checked, like a code join) or
//! decline. Pending invites expire after seven days; the sweeper flips them
//! to `expired`.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::dashboard::{self, Admission, DashboardError};
use super::email_auth::normalize_email;
use crate::frame::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("invite not found: {0}")]
    NotFound(Uuid),
    #[error("dashboard not found: {0}")]
    DashboardNotFound(Uuid),
    #[error("only the owner can manage invites for dashboard {0}")]
    Forbidden(Uuid),
    #[error("invalid email")]
    InvalidEmail,
    #[error("that user is already a member of this dashboard")]
    AlreadyMember,
    #[error("an invite is already pending for that email")]
    DuplicateInvite,
    #[error("dashboard is full (maximum {0} members)")]
    Full(i32),
    #[error(transparent)]
    Dashboard(DashboardError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for InviteError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_INVITE_NOT_FOUND",
            Self::DashboardNotFound(_) => "E_DASHBOARD_NOT_FOUND",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::AlreadyMember => "E_ALREADY_MEMBER",
            Self::DuplicateInvite => "E_DUPLICATE_INVITE",
            Self::Full(_) => "E_DASHBOARD_FULL",
            Self::Dashboard(e) => e.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Dashboard(e) => e.retryable(),
            Self::Database(_) => true,
            _ => false,
        }
    }
}

impl From<DashboardError> for InviteError {
    fn from(err: DashboardError) -> Self {
        match err {
            DashboardError::NotFound(id) => Self::DashboardNotFound(id),
            DashboardError::Forbidden(id) => Self::Forbidden(id),
            DashboardError::Database(e) => Self::Database(e),
            DashboardError::Full(max) => Self::Full(max),
            DashboardError::AlreadyMember => Self::AlreadyMember,
            other => Self::Dashboard(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Invite {
    pub id: Uuid,
    pub dashboard_id: Uuid,
    pub email: String,
    pub invited_by: Uuid,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Invite addressed to the caller, with enough context to render it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReceivedInvite {
    pub id: Uuid,
    pub dashboard_id: Uuid,
    pub dashboard_name: String,
    pub inviter_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// A freshly stored invite plus what the email needs.
#[derive(Debug, Clone)]
pub struct SentInvite {
    pub invite: Invite,
    pub dashboard_name: String,
    pub inviter_name: String,
    pub invite_code: String,
    pub otp: String,
}

/// Result of accepting an invite. `joined` is false when the caller was
/// already a member and only the invite row changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acceptance {
    pub dashboard_id: Uuid,
    pub joined: bool,
}

const INVITE_COLUMNS: &str = "id, dashboard_id, email, invited_by, status, created_at, expires_at";

async fn caller_email(pool: &PgPool, user_id: Uuid) -> Result<Option<String>, sqlx::Error> {
    let email: Option<Option<String>> = sqlx::query_scalar("SELECT email FROM profiles WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(email.flatten())
}

/// Store a pending invite for `email`. Owner only.
///
/// # Errors
///
/// Returns `InvalidEmail`, `Forbidden`, `AlreadyMember`, or `DuplicateInvite`.
pub async fn send_invite(
    pool: &PgPool,
    dashboard_id: Uuid,
    inviter_id: Uuid,
    email: &str,
) -> Result<SentInvite, InviteError> {
    let email = normalize_email(email).ok_or(InviteError::InvalidEmail)?;
    dashboard::require_owner(pool, dashboard_id, inviter_id).await?;

    let already_member: bool = sqlx::query_scalar(
        "SELECT EXISTS (
             SELECT 1 FROM dashboard_members m
             JOIN profiles p ON p.id = m.user_id
             WHERE m.dashboard_id = $1 AND lower(p.email) = $2
         )",
    )
    .bind(dashboard_id)
    .bind(&email)
    .fetch_one(pool)
    .await?;
    if already_member {
        return Err(InviteError::AlreadyMember);
    }

    // A lapsed invite the sweeper has not reached yet must not block a fresh one.
    sqlx::query(
        "UPDATE dashboard_invites SET status = 'expired'
         WHERE dashboard_id = $1 AND email = $2 AND status = 'pending' AND expires_at <= now()",
    )
    .bind(dashboard_id)
    .bind(&email)
    .execute(pool)
    .await?;

    let invite = sqlx::query_as::<_, Invite>(&format!(
        "INSERT INTO dashboard_invites (dashboard_id, email, invited_by)
         VALUES ($1, $2, $3)
         ON CONFLICT (dashboard_id, email) WHERE status = 'pending' DO NOTHING
         RETURNING {INVITE_COLUMNS}"
    ))
    .bind(dashboard_id)
    .bind(&email)
    .bind(inviter_id)
    .fetch_optional(pool)
    .await?
    .ok_or(InviteError::DuplicateInvite)?;

    let (dashboard_name, invite_code, otp, inviter_name): (String, String, String, String) = sqlx::query_as(
        "SELECT d.name, d.invite_code, d.one_time_password, p.display_name
         FROM dashboards d JOIN profiles p ON p.id = $2
         WHERE d.id = $1",
    )
    .bind(dashboard_id)
    .bind(inviter_id)
    .fetch_one(pool)
    .await?;

    info!(%dashboard_id, invite_id = %invite.id, "invite created");
    Ok(SentInvite { invite, dashboard_name, inviter_name, invite_code, otp })
}

/// Pending, unexpired invites of a dashboard, newest first. Owner only.
///
/// # Errors
///
/// Returns `Forbidden` for members and `DashboardNotFound` for outsiders.
pub async fn list_pending_invites(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<Vec<Invite>, InviteError> {
    dashboard::require_owner(pool, dashboard_id, user_id).await?;
    let invites = sqlx::query_as::<_, Invite>(&format!(
        "SELECT {INVITE_COLUMNS} FROM dashboard_invites
         WHERE dashboard_id = $1 AND status = 'pending' AND expires_at > now()
         ORDER BY created_at DESC"
    ))
    .bind(dashboard_id)
    .fetch_all(pool)
    .await?;
    Ok(invites)
}

/// Withdraw a pending invite. Owner only.
///
/// # Errors
///
/// Returns `Forbidden` or `NotFound`.
pub async fn cancel_invite(pool: &PgPool, dashboard_id: Uuid, invite_id: Uuid, user_id: Uuid) -> Result<(), InviteError> {
    dashboard::require_owner(pool, dashboard_id, user_id).await?;
    let result = sqlx::query("DELETE FROM dashboard_invites WHERE id = $1 AND dashboard_id = $2 AND status = 'pending'")
        .bind(invite_id)
        .bind(dashboard_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(InviteError::NotFound(invite_id));
    }
    Ok(())
}

/// Pending, unexpired invites addressed to the caller's email.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list_my_invites(pool: &PgPool, user_id: Uuid) -> Result<Vec<ReceivedInvite>, InviteError> {
    let Some(email) = caller_email(pool, user_id).await? else {
        return Ok(Vec::new());
    };
    let invites = sqlx::query_as::<_, ReceivedInvite>(
        "SELECT i.id, i.dashboard_id, d.name AS dashboard_name, p.display_name AS inviter_name,
                i.created_at, i.expires_at
         FROM dashboard_invites i
         JOIN dashboards d ON d.id = i.dashboard_id
         JOIN profiles p ON p.id = i.invited_by
         WHERE i.email = lower($1) AND i.status = 'pending' AND i.expires_at > now()
         ORDER BY i.created_at DESC",
    )
    .bind(&email)
    .fetch_all(pool)
    .await?;
    Ok(invites)
}

/// Accept an invite addressed to the caller and join its dashboard.
/// Accepting while already a member still marks the invite accepted.
///
/// # Errors
///
/// Returns `NotFound` when the invite is missing, expired, not pending, or
/// addressed to someone else; `Full` when the dashboard has no room.
pub async fn accept_invite(pool: &PgPool, invite_id: Uuid, user_id: Uuid) -> Result<Acceptance, InviteError> {
    let email = caller_email(pool, user_id)
        .await?
        .ok_or(InviteError::NotFound(invite_id))?;

    let mut tx = pool.begin().await?;
    let dashboard_id: Uuid = sqlx::query_scalar(
        "SELECT dashboard_id FROM dashboard_invites
         WHERE id = $1 AND email = lower($2) AND status = 'pending' AND expires_at > now()
         FOR UPDATE",
    )
    .bind(invite_id)
    .bind(&email)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(InviteError::NotFound(invite_id))?;

    let dashboard = dashboard::lock_dashboard(&mut tx, dashboard_id)
        .await?
        .ok_or(InviteError::DashboardNotFound(dashboard_id))?;

    let joined = match dashboard::admit_member(&mut tx, &dashboard, user_id).await? {
        Admission::Added => true,
        Admission::AlreadyMember => false,
        Admission::Full => return Err(InviteError::Full(dashboard.max_users)),
    };

    sqlx::query("UPDATE dashboard_invites SET status = 'accepted' WHERE id = $1")
        .bind(invite_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(%dashboard_id, %invite_id, %user_id, joined, "invite accepted");
    Ok(Acceptance { dashboard_id, joined })
}

/// Decline (delete) an invite addressed to the caller.
///
/// # Errors
///
/// Returns `NotFound` when no pending invite matches.
pub async fn decline_invite(pool: &PgPool, invite_id: Uuid, user_id: Uuid) -> Result<(), InviteError> {
    let email = caller_email(pool, user_id)
        .await?
        .ok_or(InviteError::NotFound(invite_id))?;
    let result = sqlx::query("DELETE FROM dashboard_invites WHERE id = $1 AND email = lower($2) AND status = 'pending'")
        .bind(invite_id)
        .bind(&email)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(InviteError::NotFound(invite_id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "invite_test.rs"]
mod tests;
