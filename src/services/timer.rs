//! Per-user, per-widget focus timers and their daily session totals.
//!
//! DESIGN
//! ======
//! A timer row stores `current_seconds` (time banked by earlier running
//! windows) and, while running, `started_at`. The live elapsed value is always
//! derived as `current_seconds + (now - started_at)`; nothing ticks in the
//! database. Pause folds the running window into `current_seconds`; stop folds
//! it into today's `timer_sessions` row and resets the timer to idle.
//!
//! A user runs at most one timer at a time: starting one pauses every other
//! running timer of that user, across dashboards, in the same transaction.
//! Starts lock the user's profile row first, so concurrent starts queue up
//! instead of both seeing no running timer. A unique partial index on
//! running rows backs this up.
//!
//! "Today" is the UTC date at the moment of the stop, so a timer left running
//! past midnight credits the whole run to the day it was stopped on.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use time::{Date, Duration, OffsetDateTime, UtcOffset};
use tracing::info;
use uuid::Uuid;

use super::access;

pub const MAX_NOTE_LEN: usize = 1000;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("widget not found: {0}")]
    WidgetNotFound(Uuid),
    #[error("cannot {action} a timer that is {status}")]
    InvalidTransition { status: TimerStatus, action: &'static str },
    #[error("note must be at most {MAX_NOTE_LEN} characters")]
    InvalidNote,
    #[error("unknown leaderboard period: {0}")]
    InvalidPeriod(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for TimerError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::WidgetNotFound(_) => "E_WIDGET_NOT_FOUND",
            Self::InvalidTransition { .. } => "E_INVALID_TRANSITION",
            Self::InvalidNote => "E_INVALID_NOTE",
            Self::InvalidPeriod(_) => "E_INVALID_PERIOD",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

impl TimerStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }

    /// Unknown values read as idle; the column is constrained anyway.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" => Self::Running,
            "paused" => Self::Paused,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerState {
    pub widget_id: Uuid,
    pub user_id: Uuid,
    pub status: TimerStatus,
    /// Seconds banked from earlier running windows.
    pub current_seconds: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl TimerState {
    #[must_use]
    pub fn idle(widget_id: Uuid, user_id: Uuid, now: OffsetDateTime) -> Self {
        Self {
            widget_id,
            user_id,
            status: TimerStatus::Idle,
            current_seconds: 0,
            started_at: None,
            last_updated: now,
        }
    }

    fn running_window(&self, now: OffsetDateTime) -> i64 {
        match (self.status, self.started_at) {
            (TimerStatus::Running, Some(started)) => (now - started).whole_seconds().max(0),
            _ => 0,
        }
    }

    /// Total seconds on the clock at `now`.
    #[must_use]
    pub fn elapsed_seconds(&self, now: OffsetDateTime) -> i64 {
        self.current_seconds.saturating_add(self.running_window(now))
    }

    /// Start or resume. Returns `false` when already running.
    pub fn start(&mut self, now: OffsetDateTime) -> bool {
        if self.status == TimerStatus::Running {
            return false;
        }
        self.status = TimerStatus::Running;
        self.started_at = Some(now);
        self.last_updated = now;
        true
    }

    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the timer is running.
    pub fn pause(&mut self, now: OffsetDateTime) -> Result<(), TimerError> {
        if self.status != TimerStatus::Running {
            return Err(TimerError::InvalidTransition { status: self.status, action: "pause" });
        }
        self.current_seconds = self.elapsed_seconds(now);
        self.status = TimerStatus::Paused;
        self.started_at = None;
        self.last_updated = now;
        Ok(())
    }

    /// Reset to idle and return the seconds to credit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when the timer is already idle.
    pub fn stop(&mut self, now: OffsetDateTime) -> Result<i64, TimerError> {
        if self.status == TimerStatus::Idle {
            return Err(TimerError::InvalidTransition { status: self.status, action: "stop" });
        }
        let elapsed = self.elapsed_seconds(now);
        self.status = TimerStatus::Idle;
        self.current_seconds = 0;
        self.started_at = None;
        self.last_updated = now;
        Ok(elapsed)
    }
}

/// A timer with its dashboard and derived elapsed time, as sent to clients.
#[derive(Debug, Clone, Serialize)]
pub struct TimerView {
    pub dashboard_id: Uuid,
    #[serde(flatten)]
    pub state: TimerState,
    pub elapsed_seconds: i64,
}

impl TimerView {
    #[must_use]
    pub fn new(dashboard_id: Uuid, state: TimerState, now: OffsetDateTime) -> Self {
        let elapsed_seconds = state.elapsed_seconds(now);
        Self { dashboard_id, state, elapsed_seconds }
    }
}

/// A member's timer on a widget, for the team view.
#[derive(Debug, Clone, Serialize)]
pub struct MemberTimer {
    #[serde(flatten)]
    pub timer: TimerView,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// Result of a start/pause/stop.
#[derive(Debug, Clone, Serialize)]
pub struct TimerTransition {
    pub timer: TimerView,
    /// Other timers of the caller paused by a start.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paused: Vec<TimerView>,
    /// Today's session row after a stop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<TimerSession>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TimerRow {
    dashboard_id: Uuid,
    widget_id: Uuid,
    user_id: Uuid,
    status: String,
    current_seconds: i64,
    started_at: Option<OffsetDateTime>,
    last_updated: OffsetDateTime,
}

impl TimerRow {
    fn into_parts(self) -> (Uuid, TimerState) {
        let state = TimerState {
            widget_id: self.widget_id,
            user_id: self.user_id,
            status: TimerStatus::parse(&self.status),
            current_seconds: self.current_seconds,
            started_at: self.started_at,
            last_updated: self.last_updated,
        };
        (self.dashboard_id, state)
    }
}

// =============================================================================
// SESSIONS & LEADERBOARD TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TimerSession {
    pub widget_id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub total_seconds: i64,
    pub session_count: i32,
    pub note: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardPeriod {
    #[default]
    Day,
    Week,
    Month,
}

impl LeaderboardPeriod {
    /// # Errors
    ///
    /// Returns `InvalidPeriod` for anything but `day`, `week`, or `month`.
    pub fn parse(raw: &str) -> Result<Self, TimerError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            _ => Err(TimerError::InvalidPeriod(raw.to_owned())),
        }
    }

    /// First date (inclusive) counted for this period.
    #[must_use]
    pub fn window_start(self, today: Date) -> Date {
        match self {
            Self::Day => today,
            Self::Week => today - Duration::days(7),
            Self::Month => today - Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    #[sqlx(default)]
    pub rank: i64,
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub total_seconds: i64,
    pub session_count: i64,
}

/// Competition ranking over entries already sorted by total descending:
/// equal totals share a rank and the next rank skips ahead.
pub fn assign_ranks(entries: &mut [LeaderboardEntry]) {
    let mut previous: Option<i64> = None;
    let mut rank = 0;
    for (idx, entry) in entries.iter_mut().enumerate() {
        if previous != Some(entry.total_seconds) {
            rank = i64::try_from(idx).unwrap_or(i64::MAX).saturating_add(1);
            previous = Some(entry.total_seconds);
        }
        entry.rank = rank;
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamNote {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub note: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Trim a note; empty becomes `None`.
///
/// # Errors
///
/// Returns `InvalidNote` when longer than `MAX_NOTE_LEN` characters.
pub fn normalize_note(raw: Option<&str>) -> Result<Option<String>, TimerError> {
    let Some(note) = raw.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if note.chars().count() > MAX_NOTE_LEN {
        return Err(TimerError::InvalidNote);
    }
    Ok(Some(note.to_owned()))
}

/// UTC date a stop at `now` is credited to. The whole run lands on this
/// date, even when it started the day before.
#[must_use]
pub fn credit_date(now: OffsetDateTime) -> Date {
    now.to_offset(UtcOffset::UTC).date()
}

#[must_use]
pub fn today_utc() -> Date {
    credit_date(OffsetDateTime::now_utc())
}

// =============================================================================
// PERSISTENCE HELPERS
// =============================================================================

const TIMER_SELECT: &str = "SELECT w.dashboard_id, t.widget_id, t.user_id, t.status, t.current_seconds,
        t.started_at, t.last_updated
 FROM timer_states t
 JOIN widgets w ON w.id = t.widget_id";

const SESSION_COLUMNS: &str = "widget_id, user_id, date, total_seconds, session_count, note, updated_at";

/// Dashboard of `widget_id` if the caller is a member there.
///
/// # Errors
///
/// Returns `WidgetNotFound` for missing widgets and for non-members.
pub async fn widget_scope(pool: &PgPool, widget_id: Uuid, user_id: Uuid) -> Result<Uuid, TimerError> {
    let dashboard_id = access::widget_dashboard(pool, widget_id)
        .await?
        .ok_or(TimerError::WidgetNotFound(widget_id))?;
    access::member_role(pool, dashboard_id, user_id)
        .await?
        .ok_or(TimerError::WidgetNotFound(widget_id))?;
    Ok(dashboard_id)
}

async fn lock_state(
    tx: &mut Transaction<'_, Postgres>,
    widget_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TimerState>, sqlx::Error> {
    let row = sqlx::query_as::<_, TimerRow>(&format!(
        "{TIMER_SELECT} WHERE t.widget_id = $1 AND t.user_id = $2 FOR UPDATE OF t"
    ))
    .bind(widget_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|r| r.into_parts().1))
}

/// Serialize timer transitions of one user for the rest of `tx`.
async fn lock_user(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1 FROM profiles WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn save_state(tx: &mut Transaction<'_, Postgres>, state: &TimerState) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"INSERT INTO timer_states (widget_id, user_id, status, current_seconds, started_at, last_updated)
          VALUES ($1, $2, $3, $4, $5, $6)
          ON CONFLICT (widget_id, user_id) DO UPDATE
          SET status = EXCLUDED.status,
              current_seconds = EXCLUDED.current_seconds,
              started_at = EXCLUDED.started_at,
              last_updated = EXCLUDED.last_updated",
    )
    .bind(state.widget_id)
    .bind(state.user_id)
    .bind(state.status.as_str())
    .bind(state.current_seconds)
    .bind(state.started_at)
    .bind(state.last_updated)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =============================================================================
// READS
// =============================================================================

/// The caller's timer on a widget, or a fresh idle one.
///
/// # Errors
///
/// Returns `WidgetNotFound` when the caller cannot see the widget.
pub async fn get_timer_state(pool: &PgPool, widget_id: Uuid, user_id: Uuid) -> Result<TimerView, TimerError> {
    let dashboard_id = widget_scope(pool, widget_id, user_id).await?;
    let now = OffsetDateTime::now_utc();
    let row = sqlx::query_as::<_, TimerRow>(&format!("{TIMER_SELECT} WHERE t.widget_id = $1 AND t.user_id = $2"))
        .bind(widget_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    let state = row.map_or_else(|| TimerState::idle(widget_id, user_id, now), |r| r.into_parts().1);
    Ok(TimerView::new(dashboard_id, state, now))
}

#[derive(sqlx::FromRow)]
struct MemberTimerRow {
    #[sqlx(flatten)]
    timer: TimerRow,
    display_name: String,
    avatar_url: Option<String>,
}

/// Every member's stored timer on a widget.
///
/// # Errors
///
/// Returns `WidgetNotFound` when the caller cannot see the widget.
pub async fn list_timer_states(pool: &PgPool, widget_id: Uuid, user_id: Uuid) -> Result<Vec<MemberTimer>, TimerError> {
    widget_scope(pool, widget_id, user_id).await?;
    let now = OffsetDateTime::now_utc();
    let rows = sqlx::query_as::<_, MemberTimerRow>(
        "SELECT w.dashboard_id, t.widget_id, t.user_id, t.status, t.current_seconds, t.started_at,
                t.last_updated, p.display_name, p.avatar_url
         FROM timer_states t
         JOIN widgets w ON w.id = t.widget_id
         JOIN profiles p ON p.id = t.user_id
         WHERE t.widget_id = $1
         ORDER BY p.display_name ASC",
    )
    .bind(widget_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let (dashboard_id, state) = row.timer.into_parts();
            MemberTimer {
                timer: TimerView::new(dashboard_id, state, now),
                display_name: row.display_name,
                avatar_url: row.avatar_url,
            }
        })
        .collect())
}

/// The caller's session row for today, if any.
///
/// # Errors
///
/// Returns `WidgetNotFound` when the caller cannot see the widget.
pub async fn get_today_session(pool: &PgPool, widget_id: Uuid, user_id: Uuid) -> Result<Option<TimerSession>, TimerError> {
    widget_scope(pool, widget_id, user_id).await?;
    let session = sqlx::query_as::<_, TimerSession>(&format!(
        "SELECT {SESSION_COLUMNS} FROM timer_sessions WHERE widget_id = $1 AND user_id = $2 AND date = $3"
    ))
    .bind(widget_id)
    .bind(user_id)
    .bind(today_utc())
    .fetch_optional(pool)
    .await?;
    Ok(session)
}

/// Per-user totals on a widget since the period's window start.
///
/// # Errors
///
/// Returns `WidgetNotFound` when the caller cannot see the widget.
pub async fn leaderboard(
    pool: &PgPool,
    widget_id: Uuid,
    user_id: Uuid,
    period: LeaderboardPeriod,
) -> Result<Vec<LeaderboardEntry>, TimerError> {
    widget_scope(pool, widget_id, user_id).await?;
    let since = period.window_start(today_utc());
    let mut entries = sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT s.user_id, p.display_name, p.avatar_url,
                SUM(s.total_seconds)::BIGINT AS total_seconds,
                SUM(s.session_count)::BIGINT AS session_count
         FROM timer_sessions s
         JOIN profiles p ON p.id = s.user_id
         WHERE s.widget_id = $1 AND s.date >= $2
         GROUP BY s.user_id, p.display_name, p.avatar_url
         ORDER BY total_seconds DESC, p.display_name ASC",
    )
    .bind(widget_id)
    .bind(since)
    .fetch_all(pool)
    .await?;
    assign_ranks(&mut entries);
    Ok(entries)
}

/// Today's non-empty notes on a widget, most recently edited first.
///
/// # Errors
///
/// Returns `WidgetNotFound` when the caller cannot see the widget.
pub async fn team_notes(pool: &PgPool, widget_id: Uuid, user_id: Uuid) -> Result<Vec<TeamNote>, TimerError> {
    widget_scope(pool, widget_id, user_id).await?;
    let notes = sqlx::query_as::<_, TeamNote>(
        "SELECT s.user_id, p.display_name, p.avatar_url, s.note, s.updated_at
         FROM timer_sessions s
         JOIN profiles p ON p.id = s.user_id
         WHERE s.widget_id = $1 AND s.date = $2 AND s.note IS NOT NULL AND btrim(s.note) <> ''
         ORDER BY s.updated_at DESC",
    )
    .bind(widget_id)
    .bind(today_utc())
    .fetch_all(pool)
    .await?;
    Ok(notes)
}

/// The caller's stored timers on every widget of a dashboard.
pub(crate) async fn timers_on_dashboard(
    pool: &PgPool,
    dashboard_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<TimerState>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TimerRow>(&format!("{TIMER_SELECT} WHERE w.dashboard_id = $1 AND t.user_id = $2"))
        .bind(dashboard_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|r| r.into_parts().1).collect())
}

/// The caller's session rows on a dashboard for one date.
pub(crate) async fn sessions_on_dashboard(
    pool: &PgPool,
    dashboard_id: Uuid,
    user_id: Uuid,
    date: Date,
) -> Result<Vec<TimerSession>, sqlx::Error> {
    sqlx::query_as::<_, TimerSession>(
        "SELECT s.widget_id, s.user_id, s.date, s.total_seconds, s.session_count, s.note, s.updated_at
         FROM timer_sessions s
         JOIN widgets w ON w.id = s.widget_id
         WHERE w.dashboard_id = $1 AND s.user_id = $2 AND s.date = $3",
    )
    .bind(dashboard_id)
    .bind(user_id)
    .bind(date)
    .fetch_all(pool)
    .await
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Start or resume the caller's timer, pausing any other running timer first.
///
/// # Errors
///
/// Returns `WidgetNotFound` when the caller cannot see the widget.
pub async fn start_timer(pool: &PgPool, widget_id: Uuid, user_id: Uuid) -> Result<TimerTransition, TimerError> {
    let dashboard_id = widget_scope(pool, widget_id, user_id).await?;
    let mut tx = pool.begin().await?;
    lock_user(&mut tx, user_id).await?;
    let now = OffsetDateTime::now_utc();

    let running = sqlx::query_as::<_, TimerRow>(&format!(
        "{TIMER_SELECT} WHERE t.user_id = $1 AND t.status = 'running' AND t.widget_id <> $2 FOR UPDATE OF t"
    ))
    .bind(user_id)
    .bind(widget_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut paused = Vec::with_capacity(running.len());
    for row in running {
        let (other_dashboard, mut state) = row.into_parts();
        state.pause(now)?;
        save_state(&mut tx, &state).await?;
        paused.push(TimerView::new(other_dashboard, state, now));
    }

    let mut state = lock_state(&mut tx, widget_id, user_id)
        .await?
        .unwrap_or_else(|| TimerState::idle(widget_id, user_id, now));
    if state.start(now) {
        save_state(&mut tx, &state).await?;
    }
    tx.commit().await?;

    info!(%widget_id, %user_id, paused = paused.len(), "timer started");
    Ok(TimerTransition { timer: TimerView::new(dashboard_id, state, now), paused, session: None })
}

/// Pause the caller's running timer.
///
/// # Errors
///
/// Returns `InvalidTransition` unless the timer is running.
pub async fn pause_timer(pool: &PgPool, widget_id: Uuid, user_id: Uuid) -> Result<TimerTransition, TimerError> {
    let dashboard_id = widget_scope(pool, widget_id, user_id).await?;
    let now = OffsetDateTime::now_utc();
    let mut tx = pool.begin().await?;

    let mut state = lock_state(&mut tx, widget_id, user_id)
        .await?
        .unwrap_or_else(|| TimerState::idle(widget_id, user_id, now));
    state.pause(now)?;
    save_state(&mut tx, &state).await?;
    tx.commit().await?;

    info!(%widget_id, %user_id, seconds = state.current_seconds, "timer paused");
    Ok(TimerTransition { timer: TimerView::new(dashboard_id, state, now), paused: Vec::new(), session: None })
}

/// Stop the caller's timer and credit its time to today's session row.
///
/// # Errors
///
/// Returns `InvalidTransition` when idle and `InvalidNote` for an overlong note.
pub async fn stop_timer(
    pool: &PgPool,
    widget_id: Uuid,
    user_id: Uuid,
    note: Option<&str>,
) -> Result<TimerTransition, TimerError> {
    let note = normalize_note(note)?;
    let dashboard_id = widget_scope(pool, widget_id, user_id).await?;
    let now = OffsetDateTime::now_utc();
    let mut tx = pool.begin().await?;

    let mut state = lock_state(&mut tx, widget_id, user_id)
        .await?
        .unwrap_or_else(|| TimerState::idle(widget_id, user_id, now));
    let elapsed = state.stop(now)?;
    save_state(&mut tx, &state).await?;

    let session = sqlx::query_as::<_, TimerSession>(&format!(
        r"INSERT INTO timer_sessions (widget_id, user_id, date, total_seconds, session_count, note)
          VALUES ($1, $2, $3, $4, 1, $5)
          ON CONFLICT (widget_id, user_id, date) DO UPDATE
          SET total_seconds = timer_sessions.total_seconds + EXCLUDED.total_seconds,
              session_count = timer_sessions.session_count + 1,
              note = COALESCE(EXCLUDED.note, timer_sessions.note),
              updated_at = now()
          RETURNING {SESSION_COLUMNS}"
    ))
    .bind(widget_id)
    .bind(user_id)
    .bind(credit_date(now))
    .bind(elapsed)
    .bind(note)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(%widget_id, %user_id, elapsed, "timer stopped");
    Ok(TimerTransition {
        timer: TimerView::new(dashboard_id, state, now),
        paused: Vec::new(),
        session: Some(session),
    })
}

/// Set today's note without touching totals. An empty note clears it.
///
/// # Errors
///
/// Returns `InvalidNote` for an overlong note.
pub async fn update_note(pool: &PgPool, widget_id: Uuid, user_id: Uuid, note: &str) -> Result<TimerSession, TimerError> {
    let note = normalize_note(Some(note))?;
    widget_scope(pool, widget_id, user_id).await?;
    let session = sqlx::query_as::<_, TimerSession>(&format!(
        r"INSERT INTO timer_sessions (widget_id, user_id, date, note)
          VALUES ($1, $2, $3, $4)
          ON CONFLICT (widget_id, user_id, date) DO UPDATE
          SET note = EXCLUDED.note, updated_at = now()
          RETURNING {SESSION_COLUMNS}"
    ))
    .bind(widget_id)
    .bind(user_id)
    .bind(today_utc())
    .bind(note)
    .fetch_one(pool)
    .await?;
    Ok(session)
}

#[cfg(test)]
#[path = "timer_test.rs"]
mod tests;
