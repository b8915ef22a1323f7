use super::*;
use crate::state::test_helpers::{subscribe_client, test_app_state};

#[test]
fn dashboard_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    let cases = [
        (DashboardError::NotFound(id), StatusCode::NOT_FOUND),
        (DashboardError::MemberNotFound(id), StatusCode::NOT_FOUND),
        (DashboardError::Forbidden(id), StatusCode::FORBIDDEN),
        (DashboardError::InvalidName, StatusCode::BAD_REQUEST),
        (DashboardError::InvalidInviteCode, StatusCode::BAD_REQUEST),
        (DashboardError::InvalidOtp, StatusCode::BAD_REQUEST),
        (DashboardError::AlreadyMember, StatusCode::CONFLICT),
        (DashboardError::Full(4), StatusCode::CONFLICT),
        (DashboardError::OwnerCannotLeave, StatusCode::CONFLICT),
        (DashboardError::CannotRemoveOwner, StatusCode::CONFLICT),
        (DashboardError::InviteCodeExhausted, StatusCode::SERVICE_UNAVAILABLE),
        (DashboardError::Database(sqlx::Error::PoolTimedOut), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(dashboard_error_to_status(&err), status, "{err}");
    }
}

#[test]
fn full_dashboard_becomes_conflict_api_error() {
    let err = ApiError::from(DashboardError::Full(4));
    assert_eq!(err.status, StatusCode::CONFLICT);
    assert_eq!(err.code, "E_DASHBOARD_FULL");
    assert!(!err.retryable);
}

#[tokio::test]
async fn join_is_rejected_once_rate_limit_is_spent() {
    let state = test_app_state();
    let user_id = Uuid::new_v4();
    while state.rate_limiter.check_join(user_id).is_ok() {}

    let body = JoinBody { invite_code: "ABCD2345".into(), otp: "123456".into() };
    let err = join_dashboard(State(state), AuthUser::for_test(user_id), Json(body)).await.err().unwrap();
    assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(err.code, "E_RATE_LIMITED");
}

#[tokio::test]
async fn removed_member_sees_the_change_before_losing_the_feed() {
    let state = test_app_state();
    let dashboard_id = Uuid::new_v4();
    let member_id = Uuid::new_v4();
    let mut rx = subscribe_client(&state, dashboard_id, Uuid::new_v4(), member_id).await;

    feed::publish_members_changed(&state, dashboard_id, member_id, MemberChange::Removed).await;
    feed::drop_user(&state, dashboard_id, member_id).await;

    let frame = rx.try_recv().expect("removal frame should be delivered");
    assert_eq!(frame.syscall, feed::MEMBERS_CHANGED);
    assert_eq!(feed::subscriber_count(&state, dashboard_id).await, 0);
}
