//! Dashboard routes: lifecycle, membership, widgets.
//!
//! Membership changes are pushed to live subscribers after the service call
//! commits. Members who leave or are removed see the change, then lose their
//! feed subscriptions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::services::dashboard::{self, DashboardError, DashboardView, Member, UserDashboard, Widget};
use crate::services::feed::{self, MemberChange};
use crate::services::overview::{self, DashboardOverview};
use crate::state::AppState;

pub(crate) fn dashboard_error_to_status(err: &DashboardError) -> StatusCode {
    match err {
        DashboardError::NotFound(_) | DashboardError::MemberNotFound(_) => StatusCode::NOT_FOUND,
        DashboardError::Forbidden(_) => StatusCode::FORBIDDEN,
        DashboardError::InvalidName | DashboardError::InvalidInviteCode | DashboardError::InvalidOtp => {
            StatusCode::BAD_REQUEST
        }
        DashboardError::AlreadyMember
        | DashboardError::Full(_)
        | DashboardError::OwnerCannotLeave
        | DashboardError::CannotRemoveOwner => StatusCode::CONFLICT,
        DashboardError::InviteCodeExhausted => StatusCode::SERVICE_UNAVAILABLE,
        DashboardError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        Self::from_service(dashboard_error_to_status(&err), &err)
    }
}

#[derive(Deserialize)]
pub struct DashboardNameBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct JoinBody {
    pub invite_code: String,
    pub otp: String,
}

/// `POST /api/dashboards`: create a dashboard owned by the caller.
pub async fn create_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<DashboardNameBody>,
) -> Result<(StatusCode, Json<DashboardView>), ApiError> {
    let row = dashboard::create_dashboard(&state.pool, &body.name, auth.user.id).await?;
    Ok((StatusCode::CREATED, Json(DashboardView::for_viewer(row, auth.user.id))))
}

/// `GET /api/dashboards`: dashboards the caller belongs to.
pub async fn list_dashboards(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<UserDashboard>>, ApiError> {
    Ok(Json(dashboard::list_dashboards_for_user(&state.pool, auth.user.id).await?))
}

/// `GET /api/dashboards/{id}`
pub async fn get_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<Json<DashboardView>, ApiError> {
    Ok(Json(dashboard::get_dashboard(&state.pool, dashboard_id, auth.user.id).await?))
}

/// `GET /api/dashboards/{id}/overview`: members, widgets, timers, unread count.
pub async fn get_overview(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<Json<DashboardOverview>, ApiError> {
    Ok(Json(overview::dashboard_overview(&state.pool, dashboard_id, auth.user.id).await?))
}

/// `PATCH /api/dashboards/{id}`: rename. Owner only.
pub async fn rename_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
    Json(body): Json<DashboardNameBody>,
) -> Result<Json<DashboardView>, ApiError> {
    let view = dashboard::rename_dashboard(&state.pool, dashboard_id, auth.user.id, &body.name).await?;
    Ok(Json(view))
}

/// `DELETE /api/dashboards/{id}`: delete and close the live feed. Owner only.
pub async fn delete_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    dashboard::delete_dashboard(&state.pool, dashboard_id, auth.user.id).await?;
    feed::close_feed(&state, dashboard_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/dashboards/join`: join with invite code + OTP.
pub async fn join_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<JoinBody>,
) -> Result<Json<DashboardView>, ApiError> {
    state.rate_limiter.check_join(auth.user.id)?;
    let view = dashboard::join_dashboard(&state.pool, &body.invite_code, &body.otp, auth.user.id).await?;
    feed::publish_members_changed(&state, view.id, auth.user.id, MemberChange::Joined).await;
    Ok(Json(view))
}

/// `POST /api/dashboards/{id}/leave`
pub async fn leave_dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    dashboard::leave_dashboard(&state.pool, dashboard_id, auth.user.id).await?;
    feed::publish_members_changed(&state, dashboard_id, auth.user.id, MemberChange::Left).await;
    feed::drop_user(&state, dashboard_id, auth.user.id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/dashboards/{id}/members`
pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<Json<Vec<Member>>, ApiError> {
    Ok(Json(dashboard::list_members(&state.pool, dashboard_id, auth.user.id).await?))
}

/// `DELETE /api/dashboards/{id}/members/{user_id}`: owner removes a member.
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((dashboard_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    dashboard::remove_member(&state.pool, dashboard_id, auth.user.id, member_id).await?;
    feed::publish_members_changed(&state, dashboard_id, member_id, MemberChange::Removed).await;
    feed::drop_user(&state, dashboard_id, member_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/dashboards/{id}/widgets`
pub async fn list_widgets(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<Json<Vec<Widget>>, ApiError> {
    Ok(Json(dashboard::list_widgets(&state.pool, dashboard_id, auth.user.id).await?))
}

#[cfg(test)]
#[path = "dashboards_test.rs"]
mod tests;
