//! Timer routes: per-widget timers, daily sessions, leaderboard, notes.
//!
//! Every state change is fanned out to the widget's dashboard feed. HTTP
//! callers have no feed connection, so nobody is excluded.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::services::feed;
use crate::services::timer::{
    self, LeaderboardEntry, LeaderboardPeriod, MemberTimer, TeamNote, TimerError, TimerSession, TimerTransition,
    TimerView,
};
use crate::state::AppState;

pub(crate) fn timer_error_to_status(err: &TimerError) -> StatusCode {
    match err {
        TimerError::WidgetNotFound(_) => StatusCode::NOT_FOUND,
        TimerError::InvalidTransition { .. } => StatusCode::CONFLICT,
        TimerError::InvalidNote | TimerError::InvalidPeriod(_) => StatusCode::BAD_REQUEST,
        TimerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<TimerError> for ApiError {
    fn from(err: TimerError) -> Self {
        Self::from_service(timer_error_to_status(&err), &err)
    }
}

#[derive(Deserialize, Default)]
pub struct StopBody {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Deserialize)]
pub struct NoteBody {
    pub note: String,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    pub period: Option<String>,
}

/// `GET /api/widgets/{id}/timer`: the caller's timer.
pub async fn get_timer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
) -> Result<Json<TimerView>, ApiError> {
    Ok(Json(timer::get_timer_state(&state.pool, widget_id, auth.user.id).await?))
}

/// `GET /api/widgets/{id}/timers`: every member's timer on the widget.
pub async fn list_timers(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
) -> Result<Json<Vec<MemberTimer>>, ApiError> {
    Ok(Json(timer::list_timer_states(&state.pool, widget_id, auth.user.id).await?))
}

/// `POST /api/widgets/{id}/timer/start`
pub async fn start_timer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
) -> Result<Json<TimerTransition>, ApiError> {
    let transition = timer::start_timer(&state.pool, widget_id, auth.user.id).await?;
    feed::publish_transition(&state, &transition, None).await;
    Ok(Json(transition))
}

/// `POST /api/widgets/{id}/timer/pause`
pub async fn pause_timer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
) -> Result<Json<TimerTransition>, ApiError> {
    let transition = timer::pause_timer(&state.pool, widget_id, auth.user.id).await?;
    feed::publish_transition(&state, &transition, None).await;
    Ok(Json(transition))
}

/// `POST /api/widgets/{id}/timer/stop`: body `{"note": "..."}` is optional.
pub async fn stop_timer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
    body: Option<Json<StopBody>>,
) -> Result<Json<TimerTransition>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let transition = timer::stop_timer(&state.pool, widget_id, auth.user.id, body.note.as_deref()).await?;
    feed::publish_transition(&state, &transition, None).await;
    Ok(Json(transition))
}

/// `GET /api/widgets/{id}/session`: the caller's session row for today, if any.
pub async fn get_today_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
) -> Result<Json<Option<TimerSession>>, ApiError> {
    Ok(Json(timer::get_today_session(&state.pool, widget_id, auth.user.id).await?))
}

/// `PUT /api/widgets/{id}/note`
pub async fn update_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
    Json(body): Json<NoteBody>,
) -> Result<Json<TimerSession>, ApiError> {
    Ok(Json(timer::update_note(&state.pool, widget_id, auth.user.id, &body.note).await?))
}

/// `GET /api/widgets/{id}/notes`: teammates' notes for today.
pub async fn team_notes(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
) -> Result<Json<Vec<TeamNote>>, ApiError> {
    Ok(Json(timer::team_notes(&state.pool, widget_id, auth.user.id).await?))
}

/// `GET /api/widgets/{id}/leaderboard?period=day|week|month`: defaults to `day`.
pub async fn leaderboard(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(widget_id): Path<Uuid>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let period = match query.period.as_deref() {
        Some(raw) => LeaderboardPeriod::parse(raw)?,
        None => LeaderboardPeriod::Day,
    };
    Ok(Json(timer::leaderboard(&state.pool, widget_id, auth.user.id, period).await?))
}

#[cfg(test)]
#[path = "timers_test.rs"]
mod tests;
