use super::*;
use crate::state::test_helpers::test_app_state;

#[test]
fn profile_errors_map_to_statuses() {
    assert_eq!(profile_error_to_status(&ProfileError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(profile_error_to_status(&ProfileError::InvalidDisplayName), StatusCode::BAD_REQUEST);
    assert_eq!(profile_error_to_status(&ProfileError::InvalidAvatarUrl), StatusCode::BAD_REQUEST);
    assert_eq!(profile_error_to_status(&ProfileError::InvalidThemeMode("sepia".into())), StatusCode::BAD_REQUEST);
    assert_eq!(profile_error_to_status(&ProfileError::InvalidThemeColor("teal".into())), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_theme_mode_is_rejected_before_the_update() {
    let state = test_app_state();
    let body = ThemeBody { mode: "sepia".into(), color: "blue".into() };
    let err = update_theme(State(state), AuthUser::for_test(Uuid::new_v4()), Json(body)).await.err().unwrap();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);
    assert_eq!(err.code, "E_INVALID_THEME_MODE");
    assert_eq!(err.message, "unknown theme mode: sepia");
}

#[tokio::test]
async fn blank_display_name_is_rejected_before_the_update() {
    let state = test_app_state();
    let body = ProfileUpdate { display_name: Some("  ".into()), avatar_url: None };
    let err = update_profile(State(state), AuthUser::for_test(Uuid::new_v4()), Json(body)).await.err().unwrap();
    assert_eq!(err.code, "E_INVALID_DISPLAY_NAME");
}
