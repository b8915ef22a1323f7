use super::*;
use crate::frame::ErrorCode;

fn limiter() -> RateLimiter {
    RateLimiter::with_config(RateLimitConfig::default())
}

#[test]
fn join_allows_up_to_limit() {
    let rl = limiter();
    let user = Uuid::new_v4();
    let now = Instant::now();

    for i in 0..DEFAULT_JOIN_LIMIT {
        assert!(rl.check_join_at(user, now).is_ok(), "attempt {i} should succeed");
    }
    assert_eq!(
        rl.check_join_at(user, now),
        Err(RateLimitError::JoinAttempts { limit: DEFAULT_JOIN_LIMIT, window_secs: DEFAULT_JOIN_WINDOW_SECS })
    );
}

#[test]
fn join_limits_are_per_user() {
    let rl = limiter();
    let now = Instant::now();
    let noisy = Uuid::new_v4();

    for _ in 0..DEFAULT_JOIN_LIMIT {
        rl.check_join_at(noisy, now).unwrap();
    }
    assert!(rl.check_join_at(noisy, now).is_err());
    assert!(rl.check_join_at(Uuid::new_v4(), now).is_ok());
}

#[test]
fn join_window_expiry_allows_new_attempts() {
    let rl = limiter();
    let user = Uuid::new_v4();
    let start = Instant::now();

    for _ in 0..DEFAULT_JOIN_LIMIT {
        rl.check_join_at(user, start).unwrap();
    }
    assert!(rl.check_join_at(user, start).is_err());

    let later = start + Duration::from_secs(DEFAULT_JOIN_WINDOW_SECS + 1);
    assert!(rl.check_join_at(user, later).is_ok());
}

#[test]
fn code_requests_limited_per_email() {
    let rl = limiter();
    let now = Instant::now();

    for _ in 0..DEFAULT_CODE_LIMIT {
        rl.check_code_request_at("a@example.com", now).unwrap();
    }
    assert!(matches!(
        rl.check_code_request_at("a@example.com", now),
        Err(RateLimitError::CodeRequests { .. })
    ));
    assert!(rl.check_code_request_at("b@example.com", now).is_ok());
}

#[test]
fn custom_config_is_respected() {
    let rl = RateLimiter::with_config(RateLimitConfig {
        join_limit: 1,
        join_window: Duration::from_secs(10),
        code_limit: 1,
        code_window: Duration::from_secs(10),
    });
    let user = Uuid::new_v4();
    let now = Instant::now();
    assert!(rl.check_join_at(user, now).is_ok());
    assert!(rl.check_join_at(user, now).is_err());
}

#[test]
fn prune_drops_idle_keys() {
    let rl = limiter();
    let start = Instant::now();
    rl.check_join_at(Uuid::new_v4(), start).unwrap();
    rl.check_code_request_at("x@example.com", start).unwrap();
    assert_eq!(rl.tracked_keys(), 2);

    rl.prune_at(start + Duration::from_secs(DEFAULT_CODE_WINDOW_SECS + 1));
    assert_eq!(rl.tracked_keys(), 0);
}

#[test]
fn prune_keeps_active_keys() {
    let rl = limiter();
    let start = Instant::now();
    rl.check_join_at(Uuid::new_v4(), start).unwrap();

    rl.prune_at(start + Duration::from_secs(1));
    assert_eq!(rl.tracked_keys(), 1);
}

#[test]
fn rate_limit_errors_are_retryable() {
    let err = RateLimitError::JoinAttempts { limit: 1, window_secs: 60 };
    assert_eq!(err.error_code(), "E_RATE_LIMITED");
    assert!(err.retryable());
    assert!(err.to_string().contains("join attempts"));
}
