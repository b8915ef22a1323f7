use super::*;
use crate::services::dashboard::DashboardError;
use crate::state::test_helpers::test_app_state;
use time::macros::datetime;

fn sent_invite() -> SentInvite {
    SentInvite {
        invite: Invite {
            id: Uuid::new_v4(),
            dashboard_id: Uuid::new_v4(),
            email: "friend@example.com".into(),
            invited_by: Uuid::new_v4(),
            status: "pending".into(),
            created_at: datetime!(2025-03-10 12:00:00 UTC),
            expires_at: datetime!(2025-03-17 12:00:00 UTC),
        },
        dashboard_name: "Interview Prep".into(),
        inviter_name: "Ada".into(),
        invite_code: "ABCD2345".into(),
        otp: "123456".into(),
    }
}

#[test]
fn invite_errors_map_to_statuses() {
    let id = Uuid::new_v4();
    assert_eq!(invite_error_to_status(&InviteError::NotFound(id)), StatusCode::NOT_FOUND);
    assert_eq!(invite_error_to_status(&InviteError::DashboardNotFound(id)), StatusCode::NOT_FOUND);
    assert_eq!(invite_error_to_status(&InviteError::Forbidden(id)), StatusCode::FORBIDDEN);
    assert_eq!(invite_error_to_status(&InviteError::InvalidEmail), StatusCode::BAD_REQUEST);
    assert_eq!(invite_error_to_status(&InviteError::DuplicateInvite), StatusCode::CONFLICT);
    assert_eq!(invite_error_to_status(&InviteError::Full(4)), StatusCode::CONFLICT);
    assert_eq!(invite_error_to_status(&InviteError::AlreadyMember), StatusCode::CONFLICT);
}

#[test]
fn wrapped_dashboard_errors_keep_their_status() {
    let err = InviteError::from(DashboardError::InviteCodeExhausted);
    assert_eq!(invite_error_to_status(&err), StatusCode::SERVICE_UNAVAILABLE);
    let api = ApiError::from(err);
    assert_eq!(api.code, "E_INVITE_CODE_EXHAUSTED");
    assert!(api.retryable);
}

#[tokio::test]
async fn delivery_without_mailer_reports_not_sent() {
    let state = test_app_state();
    assert!(!deliver(&state, &sent_invite()).await);
}

#[test]
fn send_response_flattens_invite_and_hides_credentials() {
    let sent = sent_invite();
    let json = serde_json::to_value(SendInviteResponse { invite: sent.invite, email_sent: false }).unwrap();
    assert_eq!(json["email"], "friend@example.com");
    assert_eq!(json["status"], "pending");
    assert_eq!(json["email_sent"], false);
    assert!(json.get("otp").is_none());
    assert!(json.get("invite_code").is_none());
}
