//! Profile routes: the caller's profile, theme, and focus statistics.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use super::error::ApiError;
use crate::services::profile::{self, Activity, Profile, ProfileError, ProfilePage, ProfileUpdate, TimerStats};
use crate::state::AppState;

pub(crate) fn profile_error_to_status(err: &ProfileError) -> StatusCode {
    match err {
        ProfileError::NotFound(_) => StatusCode::NOT_FOUND,
        ProfileError::InvalidDisplayName
        | ProfileError::InvalidAvatarUrl
        | ProfileError::InvalidThemeMode(_)
        | ProfileError::InvalidThemeColor(_) => StatusCode::BAD_REQUEST,
        ProfileError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        Self::from_service(profile_error_to_status(&err), &err)
    }
}

#[derive(Deserialize)]
pub struct ThemeBody {
    pub mode: String,
    pub color: String,
}

#[derive(Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

/// `GET /api/profile`
pub async fn my_profile(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Profile>, ApiError> {
    Ok(Json(profile::get_profile(&state.pool, auth.user.id).await?))
}

/// `PATCH /api/profile`: display name and/or avatar. An empty avatar clears it.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(profile::update_profile(&state.pool, auth.user.id, &body).await?))
}

/// `PUT /api/profile/theme`
pub async fn update_theme(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ThemeBody>,
) -> Result<Json<Profile>, ApiError> {
    Ok(Json(profile::update_theme(&state.pool, auth.user.id, &body.mode, &body.color).await?))
}

/// `GET /api/profile/stats`
pub async fn my_stats(State(state): State<AppState>, auth: AuthUser) -> Result<Json<TimerStats>, ApiError> {
    Ok(Json(profile::timer_stats(&state.pool, auth.user.id).await?))
}

/// `GET /api/profile/activity?limit=N`
pub async fn my_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<Activity>>, ApiError> {
    Ok(Json(profile::recent_activity(&state.pool, auth.user.id, query.limit).await?))
}

/// `GET /api/profile/page`: profile, stats, and recent activity together.
pub async fn my_profile_page(State(state): State<AppState>, auth: AuthUser) -> Result<Json<ProfilePage>, ApiError> {
    Ok(Json(profile::profile_page(&state.pool, auth.user.id).await?))
}

/// `GET /api/users/{id}/profile`
pub async fn user_profile(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ProfilePage>, ApiError> {
    Ok(Json(profile::profile_page(&state.pool, user_id).await?))
}

#[cfg(test)]
#[path = "profiles_test.rs"]
mod tests;
