use super::*;

// =============================================================================
// parse_bool / env_bool: unique env var names avoid races with parallel tests.
// =============================================================================

#[test]
fn parse_bool_true_variants() {
    for val in ["1", "true", "yes", "on", "TRUE", "On", "  yes  "] {
        assert_eq!(parse_bool(val), Some(true), "expected true for {val:?}");
    }
}

#[test]
fn parse_bool_false_variants() {
    for val in ["0", "false", "no", "off", "False", "NO"] {
        assert_eq!(parse_bool(val), Some(false), "expected false for {val:?}");
    }
}

#[test]
fn parse_bool_invalid_returns_none() {
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}

#[test]
fn env_bool_reads_variable() {
    let key = "__TEST_FB_ENV_BOOL_4411__";
    unsafe { std::env::set_var(key, "yes") };
    assert_eq!(env_bool(key), Some(true));
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_bool_unset_returns_none() {
    assert_eq!(env_bool("__TEST_FB_SURELY_UNSET_9913__"), None);
}

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_uses_value_when_valid() {
    let key = "__TEST_FB_ENV_PARSE_OK_2231__";
    unsafe { std::env::set_var(key, " 42 ") };
    assert_eq!(env_parse::<u64>(key, 7), 42);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_falls_back_on_garbage() {
    let key = "__TEST_FB_ENV_PARSE_BAD_2232__";
    unsafe { std::env::set_var(key, "forty-two") };
    assert_eq!(env_parse::<u64>(key, 7), 7);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_parse_falls_back_when_unset() {
    assert_eq!(env_parse::<usize>("__TEST_FB_ENV_PARSE_UNSET_2233__", 5), 5);
}

#[test]
fn config_error_messages_name_the_key() {
    let missing = ConfigError::Missing("DATABASE_URL");
    assert!(missing.to_string().contains("DATABASE_URL"));

    let invalid = ConfigError::Invalid { key: "PORT", value: "abc".into() };
    let msg = invalid.to_string();
    assert!(msg.contains("PORT"));
    assert!(msg.contains("abc"));
}
