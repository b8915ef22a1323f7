//! Dashboard service: create, join, leave, rename, delete, membership.
//!
//! DESIGN
//! ======
//! A dashboard is a workspace of at most `max_users` members with exactly one
//! owner. Every mutation that can change the member count runs in a
//! transaction that first locks the dashboard row (`FOR UPDATE`), so two
//! concurrent joins cannot both observe "3 of 4" and overshoot the cap.
//!
//! Invite credentials (code + OTP) are only ever returned to the owner.

use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::access::{self, MemberRole};
use super::email_auth::random_code;

pub const MAX_MEMBERS: i32 = 4;
const INVITE_CODE_LEN: usize = 8;
const OTP_LEN: usize = 6;
const MAX_NAME_LEN: usize = 100;
const INVITE_CODE_ATTEMPTS: usize = 5;

/// Widgets seeded into every new dashboard, in display order.
pub const DEFAULT_WIDGETS: [&str; 4] = ["System Design", "Leetcode", "Behavioral", "Job Applications"];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("dashboard not found: {0}")]
    NotFound(Uuid),
    #[error("only the owner can do that on dashboard {0}")]
    Forbidden(Uuid),
    #[error("dashboard name must be 1-{MAX_NAME_LEN} characters")]
    InvalidName,
    #[error("invalid invite code")]
    InvalidInviteCode,
    #[error("invalid one-time password")]
    InvalidOtp,
    #[error("you are already a member of this dashboard")]
    AlreadyMember,
    #[error("dashboard is full (maximum {0} members)")]
    Full(i32),
    #[error("the owner cannot leave; delete the dashboard instead")]
    OwnerCannotLeave,
    #[error("the owner cannot be removed")]
    CannotRemoveOwner,
    #[error("member not found: {0}")]
    MemberNotFound(Uuid),
    #[error("could not allocate a unique invite code")]
    InviteCodeExhausted,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for DashboardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_DASHBOARD_NOT_FOUND",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::InvalidName => "E_INVALID_NAME",
            Self::InvalidInviteCode => "E_INVALID_INVITE_CODE",
            Self::InvalidOtp => "E_INVALID_OTP",
            Self::AlreadyMember => "E_ALREADY_MEMBER",
            Self::Full(_) => "E_DASHBOARD_FULL",
            Self::OwnerCannotLeave => "E_OWNER_CANNOT_LEAVE",
            Self::CannotRemoveOwner => "E_CANNOT_REMOVE_OWNER",
            Self::MemberNotFound(_) => "E_MEMBER_NOT_FOUND",
            Self::InviteCodeExhausted => "E_INVITE_CODE_EXHAUSTED",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::InviteCodeExhausted)
    }
}

/// Row of the `dashboards` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DashboardRow {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub invite_code: String,
    pub one_time_password: String,
    pub max_users: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Dashboard as shown to one viewer. Credentials are present only for the owner.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub max_users: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_time_password: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl DashboardView {
    #[must_use]
    pub fn for_viewer(row: DashboardRow, viewer_id: Uuid) -> Self {
        let is_owner = row.owner_id == viewer_id;
        Self {
            id: row.id,
            name: row.name,
            owner_id: row.owner_id,
            max_users: row.max_users,
            invite_code: is_owner.then_some(row.invite_code),
            one_time_password: is_owner.then_some(row.one_time_password),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A dashboard joined with the caller's role on it.
#[derive(Debug, Clone, sqlx::FromRow)]
struct MembershipRow {
    role: String,
    #[sqlx(flatten)]
    dashboard: DashboardRow,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct MemberRow {
    dashboard_id: Uuid,
    user_id: Uuid,
    role: String,
    joined_at: OffsetDateTime,
    display_name: String,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// One member of a dashboard with profile fields.
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub user_id: Uuid,
    pub role: MemberRole,
    pub display_name: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Self {
            user_id: row.user_id,
            role: MemberRole::parse(&row.role).unwrap_or(MemberRole::Member),
            display_name: row.display_name,
            email: row.email,
            avatar_url: row.avatar_url,
            joined_at: row.joined_at,
        }
    }
}

/// A dashboard in the caller's list, with the caller's role and every member.
#[derive(Debug, Clone, Serialize)]
pub struct UserDashboard {
    pub role: MemberRole,
    pub dashboard: DashboardView,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Widget {
    pub id: Uuid,
    pub dashboard_id: Uuid,
    pub title: String,
    pub position: i32,
    pub is_default: bool,
}

/// Outcome of a capacity-checked membership insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Added,
    AlreadyMember,
    Full,
}

// =============================================================================
// VALIDATION & CODES
// =============================================================================

/// Trim and validate a dashboard name.
///
/// # Errors
///
/// Returns `InvalidName` when the trimmed name is empty or too long.
pub fn validate_name(raw: &str) -> Result<String, DashboardError> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(DashboardError::InvalidName);
    }
    Ok(name.to_owned())
}

#[must_use]
pub fn generate_invite_code() -> String {
    random_code(INVITE_CODE_LEN)
}

#[must_use]
pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    (0..OTP_LEN)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

#[must_use]
pub fn normalize_invite_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

// =============================================================================
// ACCESS
// =============================================================================

/// Caller's role, with non-members seeing `NotFound` so dashboards stay unguessable.
pub(crate) async fn require_member(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<MemberRole, DashboardError> {
    access::member_role(pool, dashboard_id, user_id)
        .await?
        .ok_or(DashboardError::NotFound(dashboard_id))
}

pub(crate) async fn require_owner(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<(), DashboardError> {
    if require_member(pool, dashboard_id, user_id).await?.is_owner() {
        Ok(())
    } else {
        Err(DashboardError::Forbidden(dashboard_id))
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// Create a dashboard owned by `owner_id` with fresh credentials and the
/// default widgets.
///
/// # Errors
///
/// Returns `InvalidName` for a bad name, or a database error.
pub async fn create_dashboard(pool: &PgPool, name: &str, owner_id: Uuid) -> Result<DashboardRow, DashboardError> {
    let name = validate_name(name)?;
    let mut tx = pool.begin().await?;

    let mut created = None;
    for _ in 0..INVITE_CODE_ATTEMPTS {
        let row = sqlx::query_as::<_, DashboardRow>(
            r"INSERT INTO dashboards (name, owner_id, invite_code, one_time_password, max_users)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (invite_code) DO NOTHING
              RETURNING id, name, owner_id, invite_code, one_time_password, max_users, created_at, updated_at",
        )
        .bind(&name)
        .bind(owner_id)
        .bind(generate_invite_code())
        .bind(generate_otp())
        .bind(MAX_MEMBERS)
        .fetch_optional(&mut *tx)
        .await?;
        if row.is_some() {
            created = row;
            break;
        }
    }
    let Some(dashboard) = created else {
        return Err(DashboardError::InviteCodeExhausted);
    };

    sqlx::query("INSERT INTO dashboard_members (dashboard_id, user_id, role) VALUES ($1, $2, 'owner')")
        .bind(dashboard.id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

    for (position, title) in DEFAULT_WIDGETS.iter().enumerate() {
        sqlx::query("INSERT INTO widgets (dashboard_id, title, position, is_default) VALUES ($1, $2, $3, true)")
            .bind(dashboard.id)
            .bind(*title)
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    info!(dashboard_id = %dashboard.id, %owner_id, "dashboard created");
    Ok(dashboard)
}

async fn fetch_dashboard(pool: &PgPool, dashboard_id: Uuid) -> Result<DashboardRow, DashboardError> {
    sqlx::query_as::<_, DashboardRow>(
        "SELECT id, name, owner_id, invite_code, one_time_password, max_users, created_at, updated_at
         FROM dashboards WHERE id = $1",
    )
    .bind(dashboard_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DashboardError::NotFound(dashboard_id))
}

/// Fetch one dashboard for a member.
///
/// # Errors
///
/// Returns `NotFound` when the dashboard is missing or the caller is not a member.
pub async fn get_dashboard(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<DashboardView, DashboardError> {
    require_member(pool, dashboard_id, user_id).await?;
    let row = fetch_dashboard(pool, dashboard_id).await?;
    Ok(DashboardView::for_viewer(row, user_id))
}

/// Every dashboard the user belongs to, oldest membership first.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list_dashboards_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<UserDashboard>, DashboardError> {
    let memberships = sqlx::query_as::<_, MembershipRow>(
        "SELECT m.role, d.id, d.name, d.owner_id, d.invite_code, d.one_time_password, d.max_users,
                d.created_at, d.updated_at
         FROM dashboard_members m
         JOIN dashboards d ON d.id = m.dashboard_id
         WHERE m.user_id = $1
         ORDER BY m.joined_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    if memberships.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = memberships.iter().map(|m| m.dashboard.id).collect();
    let member_rows = sqlx::query_as::<_, MemberRow>(
        "SELECT m.dashboard_id, m.user_id, m.role, m.joined_at, p.display_name, p.email, p.avatar_url
         FROM dashboard_members m
         JOIN profiles p ON p.id = m.user_id
         WHERE m.dashboard_id = ANY($1)
         ORDER BY m.joined_at ASC",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    Ok(assemble_user_dashboards(memberships, member_rows, user_id))
}

fn assemble_user_dashboards(
    memberships: Vec<MembershipRow>,
    member_rows: Vec<MemberRow>,
    viewer_id: Uuid,
) -> Vec<UserDashboard> {
    let mut out: Vec<UserDashboard> = memberships
        .into_iter()
        .map(|m| UserDashboard {
            role: MemberRole::parse(&m.role).unwrap_or(MemberRole::Member),
            dashboard: DashboardView::for_viewer(m.dashboard, viewer_id),
            members: Vec::new(),
        })
        .collect();

    for row in member_rows {
        if let Some(entry) = out.iter_mut().find(|d| d.dashboard.id == row.dashboard_id) {
            entry.members.push(Member::from(row));
        }
    }
    out
}

/// Members of a dashboard, visible to members only.
///
/// # Errors
///
/// Returns `NotFound` when the caller is not a member.
pub async fn list_members(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<Vec<Member>, DashboardError> {
    require_member(pool, dashboard_id, user_id).await?;
    let rows = sqlx::query_as::<_, MemberRow>(
        "SELECT m.dashboard_id, m.user_id, m.role, m.joined_at, p.display_name, p.email, p.avatar_url
         FROM dashboard_members m
         JOIN profiles p ON p.id = m.user_id
         WHERE m.dashboard_id = $1
         ORDER BY m.joined_at ASC",
    )
    .bind(dashboard_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Member::from).collect())
}

/// Rename a dashboard. Owner only.
///
/// # Errors
///
/// Returns `InvalidName`, `NotFound`, or `Forbidden`.
pub async fn rename_dashboard(
    pool: &PgPool,
    dashboard_id: Uuid,
    user_id: Uuid,
    name: &str,
) -> Result<DashboardView, DashboardError> {
    let name = validate_name(name)?;
    require_owner(pool, dashboard_id, user_id).await?;

    let row = sqlx::query_as::<_, DashboardRow>(
        "UPDATE dashboards SET name = $2, updated_at = now() WHERE id = $1
         RETURNING id, name, owner_id, invite_code, one_time_password, max_users, created_at, updated_at",
    )
    .bind(dashboard_id)
    .bind(&name)
    .fetch_optional(pool)
    .await?
    .ok_or(DashboardError::NotFound(dashboard_id))?;

    Ok(DashboardView::for_viewer(row, user_id))
}

/// Delete a dashboard and everything scoped to it. Owner only.
///
/// # Errors
///
/// Returns `NotFound` or `Forbidden`.
pub async fn delete_dashboard(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<(), DashboardError> {
    require_owner(pool, dashboard_id, user_id).await?;

    let result = sqlx::query("DELETE FROM dashboards WHERE id = $1 AND owner_id = $2")
        .bind(dashboard_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DashboardError::NotFound(dashboard_id));
    }
    info!(%dashboard_id, "dashboard deleted");
    Ok(())
}

// =============================================================================
// MEMBERSHIP
// =============================================================================

/// Insert `user_id` as a member unless already present or the dashboard is full.
/// The caller must hold the dashboard row lock in `tx`.
pub(crate) async fn admit_member(
    tx: &mut Transaction<'_, Postgres>,
    dashboard: &DashboardRow,
    user_id: Uuid,
) -> Result<Admission, sqlx::Error> {
    if access::member_role(&mut **tx, dashboard.id, user_id).await?.is_some() {
        return Ok(Admission::AlreadyMember);
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dashboard_members WHERE dashboard_id = $1")
        .bind(dashboard.id)
        .fetch_one(&mut **tx)
        .await?;
    if count >= i64::from(dashboard.max_users) {
        return Ok(Admission::Full);
    }

    sqlx::query("INSERT INTO dashboard_members (dashboard_id, user_id, role) VALUES ($1, $2, 'member')")
        .bind(dashboard.id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(Admission::Added)
}

/// Lock a dashboard row for the rest of `tx`.
pub(crate) async fn lock_dashboard(
    tx: &mut Transaction<'_, Postgres>,
    dashboard_id: Uuid,
) -> Result<Option<DashboardRow>, sqlx::Error> {
    sqlx::query_as::<_, DashboardRow>(
        "SELECT id, name, owner_id, invite_code, one_time_password, max_users, created_at, updated_at
         FROM dashboards WHERE id = $1 FOR UPDATE",
    )
    .bind(dashboard_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Join with invite code + OTP.
///
/// # Errors
///
/// Returns `InvalidInviteCode`, `InvalidOtp`, `AlreadyMember`, or `Full`.
pub async fn join_dashboard(
    pool: &PgPool,
    invite_code: &str,
    otp: &str,
    user_id: Uuid,
) -> Result<DashboardView, DashboardError> {
    let code = normalize_invite_code(invite_code);
    if code.is_empty() {
        return Err(DashboardError::InvalidInviteCode);
    }

    let mut tx = pool.begin().await?;
    let dashboard = sqlx::query_as::<_, DashboardRow>(
        "SELECT id, name, owner_id, invite_code, one_time_password, max_users, created_at, updated_at
         FROM dashboards WHERE invite_code = $1 FOR UPDATE",
    )
    .bind(&code)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(DashboardError::InvalidInviteCode)?;

    if dashboard.one_time_password != otp.trim() {
        return Err(DashboardError::InvalidOtp);
    }

    match admit_member(&mut tx, &dashboard, user_id).await? {
        Admission::Added => {}
        Admission::AlreadyMember => return Err(DashboardError::AlreadyMember),
        Admission::Full => return Err(DashboardError::Full(dashboard.max_users)),
    }
    tx.commit().await?;

    info!(dashboard_id = %dashboard.id, %user_id, "member joined dashboard");
    Ok(DashboardView::for_viewer(dashboard, user_id))
}

async fn delete_membership(
    tx: &mut Transaction<'_, Postgres>,
    dashboard_id: Uuid,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "DELETE FROM timer_states
         WHERE user_id = $2 AND widget_id IN (SELECT id FROM widgets WHERE dashboard_id = $1)",
    )
    .bind(dashboard_id)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    sqlx::query("DELETE FROM chat_reads WHERE dashboard_id = $1 AND user_id = $2")
        .bind(dashboard_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM dashboard_members WHERE dashboard_id = $1 AND user_id = $2")
        .bind(dashboard_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Leave a dashboard. The owner cannot leave.
///
/// # Errors
///
/// Returns `NotFound` for non-members and `OwnerCannotLeave` for the owner.
pub async fn leave_dashboard(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<(), DashboardError> {
    let mut tx = pool.begin().await?;
    if lock_dashboard(&mut tx, dashboard_id).await?.is_none() {
        return Err(DashboardError::NotFound(dashboard_id));
    }
    match access::member_role(&mut *tx, dashboard_id, user_id).await? {
        None => return Err(DashboardError::NotFound(dashboard_id)),
        Some(MemberRole::Owner) => return Err(DashboardError::OwnerCannotLeave),
        Some(MemberRole::Member) => {}
    }
    delete_membership(&mut tx, dashboard_id, user_id).await?;
    tx.commit().await?;

    info!(%dashboard_id, %user_id, "member left dashboard");
    Ok(())
}

/// Remove another member. Owner only; the owner cannot be removed.
///
/// # Errors
///
/// Returns `Forbidden`, `CannotRemoveOwner`, or `MemberNotFound`.
pub async fn remove_member(
    pool: &PgPool,
    dashboard_id: Uuid,
    owner_id: Uuid,
    member_id: Uuid,
) -> Result<(), DashboardError> {
    require_owner(pool, dashboard_id, owner_id).await?;

    let mut tx = pool.begin().await?;
    lock_dashboard(&mut tx, dashboard_id)
        .await?
        .ok_or(DashboardError::NotFound(dashboard_id))?;
    match access::member_role(&mut *tx, dashboard_id, member_id).await? {
        None => return Err(DashboardError::MemberNotFound(member_id)),
        Some(MemberRole::Owner) => return Err(DashboardError::CannotRemoveOwner),
        Some(MemberRole::Member) => {}
    }
    delete_membership(&mut tx, dashboard_id, member_id).await?;
    tx.commit().await?;

    info!(%dashboard_id, %member_id, "member removed from dashboard");
    Ok(())
}

// =============================================================================
// WIDGETS
// =============================================================================

/// Widgets of a dashboard in display order. Members only.
///
/// # Errors
///
/// Returns `NotFound` when the caller is not a member.
pub async fn list_widgets(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<Vec<Widget>, DashboardError> {
    require_member(pool, dashboard_id, user_id).await?;
    let widgets = sqlx::query_as::<_, Widget>(
        "SELECT id, dashboard_id, title, position, is_default
         FROM widgets WHERE dashboard_id = $1
         ORDER BY position ASC",
    )
    .bind(dashboard_id)
    .fetch_all(pool)
    .await?;
    Ok(widgets)
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
