//! Process configuration parsed from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` loads `.env` (if present) through `dotenvy`, then builds an
//! `AppConfig` once at startup. Subsystems with their own tuning knobs
//! (rate limiting, sweeper cadence) read them through `env_parse` so every
//! knob has a typed default.

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_APP_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Outbound email settings. Absent when `RESEND_API_KEY` is unset, in which
/// case codes and invites are logged instead of mailed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub api_key: String,
    pub from: String,
}

impl MailConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let from = std::env::var("RESEND_FROM").unwrap_or_else(|_| "Focusboard <noreply@focusboard.dev>".to_owned());
        Some(Self { api_key, from })
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Marks the session cookie `Secure`. Inferred from `APP_BASE_URL` when unset.
    pub cookie_secure: bool,
    /// Public origin used to build links in outgoing email.
    pub app_base_url: String,
    pub mail: Option<MailConfig>,
}

impl AppConfig {
    /// Build from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or `PORT` is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            Err(_) => DEFAULT_PORT,
        };
        let app_base_url = std::env::var("APP_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_owned())
            .unwrap_or_else(|_| DEFAULT_APP_BASE_URL.to_owned());
        let cookie_secure = env_bool("COOKIE_SECURE").unwrap_or_else(|| app_base_url.starts_with("https://"));

        Ok(Self { database_url, port, cookie_secure, app_base_url, mail: MailConfig::from_env() })
    }
}

/// Parse an optional boolean flag (`1/true/yes/on`, `0/false/no/off`).
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| parse_bool(&raw))
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse an environment variable, falling back to `default` when unset or invalid.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
