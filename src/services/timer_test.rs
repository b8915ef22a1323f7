use super::*;
use crate::frame::ErrorCode;
use time::macros::{date, datetime};

fn t0() -> OffsetDateTime {
    datetime!(2025-03-10 09:00:00 UTC)
}

fn fresh() -> TimerState {
    TimerState::idle(Uuid::new_v4(), Uuid::new_v4(), t0())
}

fn entry(name: &str, total: i64) -> LeaderboardEntry {
    LeaderboardEntry {
        rank: 0,
        user_id: Uuid::new_v4(),
        display_name: name.into(),
        avatar_url: None,
        total_seconds: total,
        session_count: 1,
    }
}

// =============================================================================
// state machine
// =============================================================================

#[test]
fn idle_has_zero_elapsed() {
    assert_eq!(fresh().elapsed_seconds(t0() + Duration::hours(3)), 0);
}

#[test]
fn running_elapsed_is_derived_from_started_at() {
    let mut s = fresh();
    assert!(s.start(t0()));
    assert_eq!(s.elapsed_seconds(t0() + Duration::seconds(90)), 90);
    assert_eq!(s.current_seconds, 0);
}

#[test]
fn start_on_running_is_noop() {
    let mut s = fresh();
    s.start(t0());
    let before = s.clone();
    assert!(!s.start(t0() + Duration::minutes(5)));
    assert_eq!(s, before);
}

#[test]
fn pause_banks_running_window() {
    let mut s = fresh();
    s.start(t0());
    s.pause(t0() + Duration::seconds(125)).unwrap();
    assert_eq!(s.status, TimerStatus::Paused);
    assert_eq!(s.current_seconds, 125);
    assert!(s.started_at.is_none());
    assert_eq!(s.elapsed_seconds(t0() + Duration::hours(1)), 125);
}

#[test]
fn resume_keeps_accumulated_seconds() {
    let mut s = fresh();
    s.start(t0());
    s.pause(t0() + Duration::seconds(60)).unwrap();
    s.start(t0() + Duration::seconds(600));
    assert_eq!(s.elapsed_seconds(t0() + Duration::seconds(630)), 90);
}

#[test]
fn pause_requires_running() {
    let mut s = fresh();
    let err = s.pause(t0()).unwrap_err();
    assert!(matches!(err, TimerError::InvalidTransition { status: TimerStatus::Idle, action: "pause" }));

    s.start(t0());
    s.pause(t0() + Duration::seconds(1)).unwrap();
    assert!(matches!(
        s.pause(t0() + Duration::seconds(2)),
        Err(TimerError::InvalidTransition { status: TimerStatus::Paused, .. })
    ));
}

#[test]
fn stop_returns_total_and_resets() {
    let mut s = fresh();
    s.start(t0());
    s.pause(t0() + Duration::seconds(40)).unwrap();
    s.start(t0() + Duration::seconds(100));
    let credited = s.stop(t0() + Duration::seconds(120)).unwrap();
    assert_eq!(credited, 60);
    assert_eq!(s.status, TimerStatus::Idle);
    assert_eq!(s.current_seconds, 0);
    assert!(s.started_at.is_none());
}

#[test]
fn stop_from_paused_credits_banked_time() {
    let mut s = fresh();
    s.start(t0());
    s.pause(t0() + Duration::seconds(30)).unwrap();
    assert_eq!(s.stop(t0() + Duration::hours(2)).unwrap(), 30);
}

#[test]
fn stop_idle_is_invalid() {
    let err = fresh().stop(t0()).unwrap_err();
    assert_eq!(err.error_code(), "E_INVALID_TRANSITION");
    assert_eq!(err.to_string(), "cannot stop a timer that is idle");
}

#[test]
fn clock_skew_never_goes_negative() {
    let mut s = fresh();
    s.start(t0());
    assert_eq!(s.elapsed_seconds(t0() - Duration::seconds(30)), 0);
}

#[test]
fn timer_view_serializes_flat_with_elapsed() {
    let mut s = fresh();
    s.start(t0());
    let view = TimerView::new(Uuid::nil(), s, t0() + Duration::seconds(5));
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["status"], "running");
    assert_eq!(json["elapsed_seconds"], 5);
    assert_eq!(json["current_seconds"], 0);
    assert!(json["started_at"].is_string());
    assert!(json.get("state").is_none());
}

#[test]
fn status_parse_round_trip() {
    for status in [TimerStatus::Idle, TimerStatus::Running, TimerStatus::Paused] {
        assert_eq!(TimerStatus::parse(status.as_str()), status);
    }
    assert_eq!(TimerStatus::parse("bogus"), TimerStatus::Idle);
}

// =============================================================================
// leaderboard
// =============================================================================

#[test]
fn period_windows_are_inclusive_offsets() {
    let today = date!(2025 - 03 - 10);
    assert_eq!(LeaderboardPeriod::Day.window_start(today), today);
    assert_eq!(LeaderboardPeriod::Week.window_start(today), date!(2025 - 03 - 03));
    assert_eq!(LeaderboardPeriod::Month.window_start(today), date!(2025 - 02 - 08));
}

#[test]
fn period_parse_accepts_known_values() {
    assert_eq!(LeaderboardPeriod::parse("day").unwrap(), LeaderboardPeriod::Day);
    assert_eq!(LeaderboardPeriod::parse(" WEEK ").unwrap(), LeaderboardPeriod::Week);
    assert_eq!(LeaderboardPeriod::parse("month").unwrap(), LeaderboardPeriod::Month);
    assert!(matches!(LeaderboardPeriod::parse("year"), Err(TimerError::InvalidPeriod(p)) if p == "year"));
}

#[test]
fn ranks_share_on_ties_and_skip() {
    let mut entries = vec![entry("a", 300), entry("b", 200), entry("c", 200), entry("d", 50)];
    assign_ranks(&mut entries);
    let ranks: Vec<_> = entries.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, [1, 2, 2, 4]);
}

#[test]
fn ranks_on_empty_board() {
    let mut entries: Vec<LeaderboardEntry> = Vec::new();
    assign_ranks(&mut entries);
    assert!(entries.is_empty());
}

// =============================================================================
// notes
// =============================================================================

#[test]
fn normalize_note_trims_and_clears() {
    assert_eq!(normalize_note(Some("  solved two-sum  ")).unwrap().as_deref(), Some("solved two-sum"));
    assert_eq!(normalize_note(Some("   ")).unwrap(), None);
    assert_eq!(normalize_note(None).unwrap(), None);
}

#[test]
fn normalize_note_limits_length() {
    assert!(normalize_note(Some(&"n".repeat(MAX_NOTE_LEN))).is_ok());
    assert!(matches!(normalize_note(Some(&"n".repeat(MAX_NOTE_LEN + 1))), Err(TimerError::InvalidNote)));
}

#[test]
fn run_across_midnight_is_credited_to_stop_date() {
    let mut state = fresh();
    state.start(datetime!(2025-03-10 23:50:00 UTC));
    let stopped_at = datetime!(2025-03-11 00:10:00 UTC);

    assert_eq!(state.stop(stopped_at).unwrap(), 1200);
    assert_eq!(credit_date(stopped_at), date!(2025 - 03 - 11));
}

#[test]
fn credit_date_uses_utc_not_local_offset() {
    let local = datetime!(2025-03-10 20:30:00 -05:00);
    assert_eq!(credit_date(local), date!(2025 - 03 - 11));
}

#[test]
fn session_date_serializes_as_calendar_date() {
    let session = TimerSession {
        widget_id: Uuid::nil(),
        user_id: Uuid::nil(),
        date: date!(2025 - 03 - 10),
        total_seconds: 1500,
        session_count: 2,
        note: None,
        updated_at: t0(),
    };
    let json = serde_json::to_value(&session).unwrap();
    assert_eq!(json["date"], "2025-03-10");
}

#[tokio::test]
async fn stop_rejects_overlong_note_without_db() {
    let state = crate::state::test_helpers::test_app_state();
    let note = "x".repeat(MAX_NOTE_LEN + 1);
    let err = stop_timer(&state.pool, Uuid::new_v4(), Uuid::new_v4(), Some(&note))
        .await
        .unwrap_err();
    assert!(matches!(err, TimerError::InvalidNote));
}

// =============================================================================
// live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::services::dashboard::{create_dashboard, list_widgets};
    use crate::state::test_helpers::{live_pool, make_user};

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn starting_second_timer_pauses_first() {
        let pool = live_pool().await;
        let user = make_user(&pool, "timer-user").await;
        let d = create_dashboard(&pool, "Timers", user).await.unwrap();
        let widgets = list_widgets(&pool, d.id, user).await.unwrap();
        let (a, b) = (widgets[0].id, widgets[1].id);

        start_timer(&pool, a, user).await.unwrap();
        let started_b = start_timer(&pool, b, user).await.unwrap();
        assert_eq!(started_b.paused.len(), 1);
        assert_eq!(started_b.paused[0].state.widget_id, a);

        let a_state = get_timer_state(&pool, a, user).await.unwrap();
        assert_eq!(a_state.state.status, TimerStatus::Paused);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn stop_accumulates_and_note_update_keeps_totals() {
        let pool = live_pool().await;
        let user = make_user(&pool, "timer-notes").await;
        let d = create_dashboard(&pool, "Notes", user).await.unwrap();
        let widget = list_widgets(&pool, d.id, user).await.unwrap()[0].id;

        start_timer(&pool, widget, user).await.unwrap();
        let stopped = stop_timer(&pool, widget, user, Some("first")).await.unwrap();
        let session = stopped.session.unwrap();
        assert_eq!(session.session_count, 1);
        assert_eq!(session.note.as_deref(), Some("first"));

        start_timer(&pool, widget, user).await.unwrap();
        let session = stop_timer(&pool, widget, user, None).await.unwrap().session.unwrap();
        assert_eq!(session.session_count, 2);
        assert_eq!(session.note.as_deref(), Some("first"));

        let updated = update_note(&pool, widget, user, "edited").await.unwrap();
        assert_eq!(updated.session_count, 2);
        assert_eq!(updated.total_seconds, session.total_seconds);

        assert!(matches!(
            stop_timer(&pool, widget, user, None).await,
            Err(TimerError::InvalidTransition { .. })
        ));

        let board = leaderboard(&pool, widget, user, LeaderboardPeriod::Day).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].rank, 1);
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn leaderboard_without_sessions_is_empty() {
        let pool = live_pool().await;
        let user = make_user(&pool, "empty-board").await;
        let d = create_dashboard(&pool, "Quiet", user).await.unwrap();
        let widget = list_widgets(&pool, d.id, user).await.unwrap()[0].id;

        for period in [LeaderboardPeriod::Day, LeaderboardPeriod::Week, LeaderboardPeriod::Month] {
            assert!(leaderboard(&pool, widget, user, period).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn concurrent_starts_leave_one_timer_running() {
        let pool = live_pool().await;
        let user = make_user(&pool, "racer").await;
        let d = create_dashboard(&pool, "Race", user).await.unwrap();
        let widgets = list_widgets(&pool, d.id, user).await.unwrap();

        let starts: Vec<_> = widgets
            .iter()
            .map(|w| tokio::spawn(start_timer_owned(pool.clone(), w.id, user)))
            .collect();
        for handle in starts {
            handle.await.unwrap().unwrap();
        }

        let running: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM timer_states WHERE user_id = $1 AND status = 'running'")
                .bind(user)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(running, 1);
    }

    async fn start_timer_owned(pool: PgPool, widget_id: Uuid, user_id: Uuid) -> Result<TimerTransition, TimerError> {
        start_timer(&pool, widget_id, user_id).await
    }
}
