//! Invite routes: owners invite by email, recipients accept or decline.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::AuthUser;
use super::dashboards::dashboard_error_to_status;
use super::error::ApiError;
use crate::services::dashboard::{self, DashboardView};
use crate::services::feed::{self, MemberChange};
use crate::services::invite::{self, Invite, InviteError, ReceivedInvite, SentInvite};
use crate::services::mailer::InviteEmail;
use crate::state::AppState;

pub(crate) fn invite_error_to_status(err: &InviteError) -> StatusCode {
    match err {
        InviteError::NotFound(_) | InviteError::DashboardNotFound(_) => StatusCode::NOT_FOUND,
        InviteError::Forbidden(_) => StatusCode::FORBIDDEN,
        InviteError::InvalidEmail => StatusCode::BAD_REQUEST,
        InviteError::AlreadyMember | InviteError::DuplicateInvite | InviteError::Full(_) => StatusCode::CONFLICT,
        InviteError::Dashboard(e) => dashboard_error_to_status(e),
        InviteError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<InviteError> for ApiError {
    fn from(err: InviteError) -> Self {
        Self::from_service(invite_error_to_status(&err), &err)
    }
}

#[derive(Deserialize)]
pub struct SendInviteBody {
    pub email: String,
}

#[derive(Serialize)]
pub struct SendInviteResponse {
    #[serde(flatten)]
    pub invite: Invite,
    /// False when mail is not configured or delivery failed; the invite is
    /// still stored and visible to the recipient in-app.
    pub email_sent: bool,
}

async fn deliver(state: &AppState, sent: &SentInvite) -> bool {
    let Some(mailer) = &state.mailer else {
        tracing::debug!(invite_id = %sent.invite.id, "mail delivery not configured; invite not emailed");
        return false;
    };
    let email = InviteEmail {
        to: &sent.invite.email,
        inviter_name: &sent.inviter_name,
        dashboard_name: &sent.dashboard_name,
        invite_code: &sent.invite_code,
        otp: &sent.otp,
    };
    match mailer.send_invite(&email).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, invite_id = %sent.invite.id, "invite email failed");
            false
        }
    }
}

/// `POST /api/dashboards/{id}/invites`: invite an email address. Owner only.
pub async fn send_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
    Json(body): Json<SendInviteBody>,
) -> Result<(StatusCode, Json<SendInviteResponse>), ApiError> {
    let sent = invite::send_invite(&state.pool, dashboard_id, auth.user.id, &body.email).await?;
    let email_sent = deliver(&state, &sent).await;
    Ok((StatusCode::CREATED, Json(SendInviteResponse { invite: sent.invite, email_sent })))
}

/// `GET /api/dashboards/{id}/invites`: pending invites. Owner only.
pub async fn list_pending_invites(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(dashboard_id): Path<Uuid>,
) -> Result<Json<Vec<Invite>>, ApiError> {
    Ok(Json(invite::list_pending_invites(&state.pool, dashboard_id, auth.user.id).await?))
}

/// `DELETE /api/dashboards/{id}/invites/{invite_id}`: revoke. Owner only.
pub async fn cancel_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((dashboard_id, invite_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    invite::cancel_invite(&state.pool, dashboard_id, invite_id, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/invites`: pending invites addressed to the caller.
pub async fn list_my_invites(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ReceivedInvite>>, ApiError> {
    Ok(Json(invite::list_my_invites(&state.pool, auth.user.id).await?))
}

/// `POST /api/invites/{invite_id}/accept`
pub async fn accept_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invite_id): Path<Uuid>,
) -> Result<Json<DashboardView>, ApiError> {
    let accepted = invite::accept_invite(&state.pool, invite_id, auth.user.id).await?;
    if accepted.joined {
        feed::publish_members_changed(&state, accepted.dashboard_id, auth.user.id, MemberChange::Joined).await;
    }
    Ok(Json(dashboard::get_dashboard(&state.pool, accepted.dashboard_id, auth.user.id).await?))
}

/// `POST /api/invites/{invite_id}/decline`
pub async fn decline_invite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invite_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    invite::decline_invite(&state.pool, invite_id, auth.user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "invites_test.rs"]
mod tests;
