//! Membership lookups shared by every dashboard-scoped service.
//!
//! Each service turns a missing membership into its own `NotFound` and a
//! wrong role into its own `Forbidden`; this module only answers "what is
//! this user's role here".

use sqlx::{PgExecutor, Row};
use uuid::Uuid;

/// Role of a user within a dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

impl MemberRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Member => "member",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "owner" => Some(Self::Owner),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_owner(self) -> bool {
        self == Self::Owner
    }
}

/// The caller's role on `dashboard_id`, or `None` when not a member.
pub async fn member_role<'e, E>(executor: E, dashboard_id: Uuid, user_id: Uuid) -> Result<Option<MemberRole>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query("SELECT role FROM dashboard_members WHERE dashboard_id = $1 AND user_id = $2")
        .bind(dashboard_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

    Ok(row.and_then(|r| MemberRole::parse(&r.get::<String, _>("role"))))
}

/// Dashboard that owns `widget_id`, if the widget exists.
pub async fn widget_dashboard<'e, E>(executor: E, widget_id: Uuid) -> Result<Option<Uuid>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar("SELECT dashboard_id FROM widgets WHERE id = $1")
        .bind(widget_id)
        .fetch_optional(executor)
        .await
}
