use super::*;
use crate::state::test_helpers::test_app_state;

#[test]
fn chat_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    assert_eq!(chat_error_to_status(&ChatError::DashboardNotFound(id)), StatusCode::NOT_FOUND);
    assert_eq!(chat_error_to_status(&ChatError::MessageNotFound(id)), StatusCode::NOT_FOUND);
    assert_eq!(chat_error_to_status(&ChatError::Forbidden(id)), StatusCode::FORBIDDEN);
    assert_eq!(chat_error_to_status(&ChatError::InvalidMessage), StatusCode::BAD_REQUEST);
    assert_eq!(chat_error_to_status(&ChatError::Database(sqlx::Error::PoolTimedOut)), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn blank_message_is_rejected_without_a_lookup() {
    let state = test_app_state();
    let body = SendMessageBody { message: "   ".into() };
    let err = send_message(State(state), AuthUser::for_test(Uuid::new_v4()), Path(Uuid::new_v4()), Json(body))
        .await
        .err()
        .unwrap();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.code, "E_INVALID_MESSAGE");
}

#[test]
fn history_limit_is_optional() {
    let query: HistoryQuery = serde_json::from_str("{}").unwrap();
    assert!(query.limit.is_none());
}
