//! Profiles, theme preferences, and focus statistics.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

const MAX_DISPLAY_NAME_LEN: usize = 50;
const MAX_AVATAR_URL_LEN: usize = 2048;
pub const DEFAULT_ACTIVITY_LIMIT: i64 = 10;
const MAX_ACTIVITY_LIMIT: i64 = 100;

pub const THEME_COLORS: [&str; 12] = [
    "zinc", "slate", "stone", "gray", "neutral", "red", "rose", "orange", "green", "blue", "yellow", "violet",
];

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile not found: {0}")]
    NotFound(Uuid),
    #[error("display name must be 1-{MAX_DISPLAY_NAME_LEN} characters")]
    InvalidDisplayName,
    #[error("avatar url is too long")]
    InvalidAvatarUrl,
    #[error("unknown theme mode: {0}")]
    InvalidThemeMode(String),
    #[error("unknown theme color: {0}")]
    InvalidThemeColor(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ProfileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PROFILE_NOT_FOUND",
            Self::InvalidDisplayName => "E_INVALID_DISPLAY_NAME",
            Self::InvalidAvatarUrl => "E_INVALID_AVATAR_URL",
            Self::InvalidThemeMode(_) => "E_INVALID_THEME_MODE",
            Self::InvalidThemeColor(_) => "E_INVALID_THEME_COLOR",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    System,
}

impl ThemeMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    /// # Errors
    ///
    /// Returns `InvalidThemeMode` for anything but light, dark, or system.
    pub fn parse(raw: &str) -> Result<Self, ProfileError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            _ => Err(ProfileError::InvalidThemeMode(raw.to_owned())),
        }
    }
}

/// # Errors
///
/// Returns `InvalidThemeColor` when `raw` is not a known palette name.
pub fn parse_theme_color(raw: &str) -> Result<&'static str, ProfileError> {
    let wanted = raw.trim().to_ascii_lowercase();
    THEME_COLORS
        .iter()
        .copied()
        .find(|c| *c == wanted)
        .ok_or_else(|| ProfileError::InvalidThemeColor(raw.to_owned()))
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub theme_mode: String,
    pub theme_color: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerStats {
    pub total_seconds: i64,
    pub session_rows: i64,
    pub average_seconds: i64,
    pub most_used_widget: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Activity {
    pub widget_id: Uuid,
    pub widget_title: String,
    pub dashboard_id: Uuid,
    pub dashboard_name: String,
    pub date: Date,
    pub total_seconds: i64,
    pub session_count: i32,
    pub note: Option<String>,
}

/// Everything the profile screen renders.
#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub profile: Profile,
    pub stats: TimerStats,
    pub recent_activity: Vec<Activity>,
}

/// Partial profile edit. `None` leaves a field unchanged; an empty avatar clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Validated form of a `ProfileUpdate`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidUpdate {
    display_name: Option<String>,
    /// `Some(None)` clears the avatar.
    avatar_url: Option<Option<String>>,
}

fn validate_update(update: &ProfileUpdate) -> Result<ValidUpdate, ProfileError> {
    let display_name = match update.display_name.as_deref().map(str::trim) {
        None => None,
        Some(name) if name.is_empty() || name.chars().count() > MAX_DISPLAY_NAME_LEN => {
            return Err(ProfileError::InvalidDisplayName);
        }
        Some(name) => Some(name.to_owned()),
    };
    let avatar_url = match update.avatar_url.as_deref().map(str::trim) {
        None => None,
        Some("") => Some(None),
        Some(url) if url.len() > MAX_AVATAR_URL_LEN => return Err(ProfileError::InvalidAvatarUrl),
        Some(url) => Some(Some(url.to_owned())),
    };
    Ok(ValidUpdate { display_name, avatar_url })
}

/// Reduce raw aggregates to the stats shown on a profile.
#[must_use]
pub fn summarize_stats(total_seconds: i64, session_rows: i64, most_used_widget: Option<String>) -> TimerStats {
    TimerStats {
        total_seconds,
        session_rows,
        average_seconds: if session_rows > 0 { total_seconds / session_rows } else { 0 },
        most_used_widget: most_used_widget.unwrap_or_else(|| "None".to_owned()),
    }
}

const PROFILE_COLUMNS: &str = "id, email, display_name, avatar_url, theme_mode, theme_color, created_at";

/// # Errors
///
/// Returns `NotFound` for unknown users.
pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Profile, ProfileError> {
    sqlx::query_as::<_, Profile>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"))
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ProfileError::NotFound(user_id))
}

/// # Errors
///
/// Returns `InvalidDisplayName`, `InvalidAvatarUrl`, or `NotFound`.
pub async fn update_profile(pool: &PgPool, user_id: Uuid, update: &ProfileUpdate) -> Result<Profile, ProfileError> {
    let valid = validate_update(update)?;
    let (set_avatar, avatar) = match valid.avatar_url {
        None => (false, None),
        Some(value) => (true, value),
    };
    sqlx::query_as::<_, Profile>(&format!(
        r"UPDATE profiles
          SET display_name = COALESCE($2, display_name),
              avatar_url = CASE WHEN $3 THEN $4 ELSE avatar_url END,
              updated_at = now()
          WHERE id = $1
          RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(user_id)
    .bind(valid.display_name)
    .bind(set_avatar)
    .bind(avatar)
    .fetch_optional(pool)
    .await?
    .ok_or(ProfileError::NotFound(user_id))
}

/// # Errors
///
/// Returns `InvalidThemeMode`, `InvalidThemeColor`, or `NotFound`.
pub async fn update_theme(pool: &PgPool, user_id: Uuid, mode: &str, color: &str) -> Result<Profile, ProfileError> {
    let mode = ThemeMode::parse(mode)?;
    let color = parse_theme_color(color)?;
    sqlx::query_as::<_, Profile>(&format!(
        "UPDATE profiles SET theme_mode = $2, theme_color = $3, updated_at = now()
         WHERE id = $1
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(user_id)
    .bind(mode.as_str())
    .bind(color)
    .fetch_optional(pool)
    .await?
    .ok_or(ProfileError::NotFound(user_id))
}

/// # Errors
///
/// Returns a database error if a query fails.
pub async fn timer_stats(pool: &PgPool, user_id: Uuid) -> Result<TimerStats, ProfileError> {
    let (total, rows): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(total_seconds), 0)::BIGINT, COUNT(*)
         FROM timer_sessions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let most_used: Option<String> = sqlx::query_scalar(
        "SELECT w.title
         FROM timer_sessions s
         JOIN widgets w ON w.id = s.widget_id
         WHERE s.user_id = $1
         GROUP BY w.title
         ORDER BY COUNT(*) DESC, w.title ASC
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(summarize_stats(total, rows, most_used))
}

/// Latest session rows with widget and dashboard names.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn recent_activity(pool: &PgPool, user_id: Uuid, limit: Option<i64>) -> Result<Vec<Activity>, ProfileError> {
    let limit = limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT).clamp(1, MAX_ACTIVITY_LIMIT);
    let rows = sqlx::query_as::<_, Activity>(
        "SELECT s.widget_id, w.title AS widget_title, d.id AS dashboard_id, d.name AS dashboard_name,
                s.date, s.total_seconds, s.session_count, s.note
         FROM timer_sessions s
         JOIN widgets w ON w.id = s.widget_id
         JOIN dashboards d ON d.id = w.dashboard_id
         WHERE s.user_id = $1
         ORDER BY s.date DESC, s.updated_at DESC
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns `NotFound` for unknown users.
pub async fn profile_page(pool: &PgPool, user_id: Uuid) -> Result<ProfilePage, ProfileError> {
    let profile = get_profile(pool, user_id).await?;
    let stats = timer_stats(pool, user_id).await?;
    let recent_activity = recent_activity(pool, user_id, None).await?;
    Ok(ProfilePage { profile, stats, recent_activity })
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
