//! Dashboard overview: everything the dashboard page renders, in one call.

use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::access::MemberRole;
use super::chat;
use super::dashboard::{self, DashboardError, DashboardView, Member, Widget};
use super::timer::{self, TimerSession, TimerState, TimerView};

/// A widget with the caller's own timer and today's session.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetOverview {
    #[serde(flatten)]
    pub widget: Widget,
    pub timer: TimerView,
    pub today: Option<TimerSession>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardOverview {
    pub role: MemberRole,
    pub dashboard: DashboardView,
    pub members: Vec<Member>,
    pub widgets: Vec<WidgetOverview>,
    pub unread_count: i64,
}

/// Pair each widget with the caller's timer (idle when none is stored) and
/// today's session row.
#[must_use]
pub fn assemble_widgets(
    widgets: Vec<Widget>,
    timers: Vec<TimerState>,
    sessions: Vec<TimerSession>,
    user_id: Uuid,
    now: OffsetDateTime,
) -> Vec<WidgetOverview> {
    widgets
        .into_iter()
        .map(|widget| {
            let state = timers
                .iter()
                .find(|t| t.widget_id == widget.id)
                .cloned()
                .unwrap_or_else(|| TimerState::idle(widget.id, user_id, now));
            let today = sessions.iter().find(|s| s.widget_id == widget.id).cloned();
            WidgetOverview { timer: TimerView::new(widget.dashboard_id, state, now), today, widget }
        })
        .collect()
}

/// # Errors
///
/// Returns `NotFound` when the dashboard is missing or the caller is not a member.
pub async fn dashboard_overview(pool: &PgPool, dashboard_id: Uuid, user_id: Uuid) -> Result<DashboardOverview, DashboardError> {
    let role = dashboard::require_member(pool, dashboard_id, user_id).await?;
    let dashboard = dashboard::get_dashboard(pool, dashboard_id, user_id).await?;
    let members = dashboard::list_members(pool, dashboard_id, user_id).await?;
    let widgets = dashboard::list_widgets(pool, dashboard_id, user_id).await?;

    let now = OffsetDateTime::now_utc();
    let timers = timer::timers_on_dashboard(pool, dashboard_id, user_id).await?;
    let sessions = timer::sessions_on_dashboard(pool, dashboard_id, user_id, timer::credit_date(now)).await?;
    let unread_count = chat::count_unread(pool, dashboard_id, user_id).await?;

    Ok(DashboardOverview {
        role,
        dashboard,
        members,
        widgets: assemble_widgets(widgets, timers, sessions, user_id, now),
        unread_count,
    })
}

#[cfg(test)]
#[path = "overview_test.rs"]
mod tests;
