use super::*;
use crate::frame::ErrorCode;

fn update(name: Option<&str>, avatar: Option<&str>) -> ProfileUpdate {
    ProfileUpdate { display_name: name.map(str::to_owned), avatar_url: avatar.map(str::to_owned) }
}

#[test]
fn theme_mode_parse() {
    assert_eq!(ThemeMode::parse("Dark").unwrap(), ThemeMode::Dark);
    assert_eq!(ThemeMode::parse(" system ").unwrap().as_str(), "system");
    assert!(matches!(ThemeMode::parse("sepia"), Err(ProfileError::InvalidThemeMode(m)) if m == "sepia"));
}

#[test]
fn theme_color_must_be_in_palette() {
    assert_eq!(parse_theme_color("Violet").unwrap(), "violet");
    assert_eq!(parse_theme_color("zinc").unwrap(), "zinc");
    assert!(parse_theme_color("magenta").is_err());
    assert_eq!(THEME_COLORS.len(), 12);
}

#[test]
fn empty_update_changes_nothing() {
    let valid = validate_update(&ProfileUpdate::default()).unwrap();
    assert_eq!(valid, ValidUpdate { display_name: None, avatar_url: None });
}

#[test]
fn display_name_is_trimmed_and_bounded() {
    let valid = validate_update(&update(Some("  Ada  "), None)).unwrap();
    assert_eq!(valid.display_name.as_deref(), Some("Ada"));
    assert!(matches!(validate_update(&update(Some("  "), None)), Err(ProfileError::InvalidDisplayName)));
    assert!(validate_update(&update(Some(&"a".repeat(51)), None)).is_err());
    assert!(validate_update(&update(Some(&"a".repeat(50)), None)).is_ok());
}

#[test]
fn empty_avatar_clears() {
    let valid = validate_update(&update(None, Some(" "))).unwrap();
    assert_eq!(valid.avatar_url, Some(None));

    let valid = validate_update(&update(None, Some("https://cdn.example.com/a.png"))).unwrap();
    assert_eq!(valid.avatar_url, Some(Some("https://cdn.example.com/a.png".to_owned())));
}

#[test]
fn overlong_avatar_is_rejected() {
    let url = format!("https://x.example.com/{}", "a".repeat(MAX_AVATAR_URL_LEN));
    assert!(matches!(validate_update(&update(None, Some(&url))), Err(ProfileError::InvalidAvatarUrl)));
}

#[test]
fn stats_without_sessions() {
    let stats = summarize_stats(0, 0, None);
    assert_eq!(stats.average_seconds, 0);
    assert_eq!(stats.most_used_widget, "None");
}

#[test]
fn stats_average_is_per_row() {
    let stats = summarize_stats(3_600, 4, Some("Leetcode".into()));
    assert_eq!(stats.average_seconds, 900);
    assert_eq!(stats.most_used_widget, "Leetcode");
}

#[test]
fn error_codes() {
    assert_eq!(ProfileError::InvalidThemeColor("x".into()).error_code(), "E_INVALID_THEME_COLOR");
    assert_eq!(ProfileError::NotFound(Uuid::nil()).error_code(), "E_PROFILE_NOT_FOUND");
}

#[tokio::test]
async fn update_theme_validates_before_db() {
    let state = crate::state::test_helpers::test_app_state();
    let err = update_theme(&state.pool, Uuid::new_v4(), "dark", "plaid").await.unwrap_err();
    assert!(matches!(err, ProfileError::InvalidThemeColor(_)));
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::state::test_helpers::{live_pool, make_user};

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL/live Postgres"]
    async fn update_and_page_round_trip() {
        let pool = live_pool().await;
        let user = make_user(&pool, "profile-user").await;

        let p = update_profile(&pool, user, &update(Some("Grace"), Some("https://a.example/x.png")))
            .await
            .unwrap();
        assert_eq!(p.display_name, "Grace");
        let p = update_profile(&pool, user, &update(None, Some(""))).await.unwrap();
        assert_eq!(p.display_name, "Grace");
        assert!(p.avatar_url.is_none());

        let p = update_theme(&pool, user, "dark", "rose").await.unwrap();
        assert_eq!((p.theme_mode.as_str(), p.theme_color.as_str()), ("dark", "rose"));

        let page = profile_page(&pool, user).await.unwrap();
        assert_eq!(page.stats.most_used_widget, "None");
        assert!(page.recent_activity.is_empty());
    }
}
