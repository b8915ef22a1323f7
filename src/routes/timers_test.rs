use super::*;
use crate::services::timer::{MAX_NOTE_LEN, TimerStatus};
use crate::state::test_helpers::test_app_state;

#[test]
fn timer_errors_map_to_statuses() {
    let transition = TimerError::InvalidTransition { status: TimerStatus::Idle, action: "pause" };
    assert_eq!(timer_error_to_status(&TimerError::WidgetNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(timer_error_to_status(&transition), StatusCode::CONFLICT);
    assert_eq!(timer_error_to_status(&TimerError::InvalidNote), StatusCode::BAD_REQUEST);
    assert_eq!(timer_error_to_status(&TimerError::InvalidPeriod("year".into())), StatusCode::BAD_REQUEST);
    assert_eq!(timer_error_to_status(&TimerError::Database(sqlx::Error::PoolTimedOut)), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn invalid_transition_message_names_the_state() {
    let api = ApiError::from(TimerError::InvalidTransition { status: TimerStatus::Idle, action: "stop" });
    assert_eq!(api.code, "E_INVALID_TRANSITION");
    assert_eq!(api.message, "cannot stop a timer that is idle");
}

#[test]
fn stop_body_note_is_optional() {
    let body: StopBody = serde_json::from_str("{}").unwrap();
    assert!(body.note.is_none());
    let body: StopBody = serde_json::from_str(r#"{"note":"two graphs"}"#).unwrap();
    assert_eq!(body.note.as_deref(), Some("two graphs"));
}

#[tokio::test]
async fn unknown_leaderboard_period_is_a_bad_request() {
    let state = test_app_state();
    let query = LeaderboardQuery { period: Some("decade".into()) };
    let err = leaderboard(State(state), AuthUser::for_test(Uuid::new_v4()), Path(Uuid::new_v4()), Query(query))
        .await
        .err()
        .unwrap();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.code, "E_INVALID_PERIOD");
}

#[tokio::test]
async fn overlong_stop_note_is_rejected_before_any_lookup() {
    let state = test_app_state();
    let body = StopBody { note: Some("x".repeat(MAX_NOTE_LEN + 1)) };
    let err = stop_timer(State(state), AuthUser::for_test(Uuid::new_v4()), Path(Uuid::new_v4()), Some(Json(body)))
        .await
        .err()
        .unwrap();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.code, "E_INVALID_NOTE");
}
