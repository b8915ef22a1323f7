//! In-memory rate limiting for brute-forceable endpoints.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<K, VecDeque<Instant>>`.
//! Two limits are enforced:
//! - Join attempts: 10 per user per 5 minutes (invite code + OTP guessing)
//! - Access-code requests: 5 per email per 15 minutes (mail flooding)
//!
//! TRADE-OFFS
//! ==========
//! Counters live in process memory, so limits reset on restart and are not
//! shared between replicas. Keys with empty windows are dropped on the next
//! check for the same key only; the sweeper calls `prune` to bound growth.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::env_parse;

const DEFAULT_JOIN_LIMIT: usize = 10;
const DEFAULT_JOIN_WINDOW_SECS: u64 = 300;

const DEFAULT_CODE_LIMIT: usize = 5;
const DEFAULT_CODE_WINDOW_SECS: u64 = 900;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub join_limit: usize,
    pub join_window: Duration,
    pub code_limit: usize,
    pub code_window: Duration,
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            join_limit: env_parse("RATE_LIMIT_JOIN_PER_USER", DEFAULT_JOIN_LIMIT),
            join_window: Duration::from_secs(env_parse("RATE_LIMIT_JOIN_WINDOW_SECS", DEFAULT_JOIN_WINDOW_SECS)),
            code_limit: env_parse("RATE_LIMIT_CODE_PER_EMAIL", DEFAULT_CODE_LIMIT),
            code_window: Duration::from_secs(env_parse("RATE_LIMIT_CODE_WINDOW_SECS", DEFAULT_CODE_WINDOW_SECS)),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            join_limit: DEFAULT_JOIN_LIMIT,
            join_window: Duration::from_secs(DEFAULT_JOIN_WINDOW_SECS),
            code_limit: DEFAULT_CODE_LIMIT,
            code_window: Duration::from_secs(DEFAULT_CODE_WINDOW_SECS),
        }
    }
}

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("too many join attempts (max {limit} per {window_secs}s)")]
    JoinAttempts { limit: usize, window_secs: u64 },
    #[error("too many access code requests (max {limit} per {window_secs}s)")]
    CodeRequests { limit: usize, window_secs: u64 },
}

impl crate::frame::ErrorCode for RateLimitError {
    fn error_code(&self) -> &'static str {
        "E_RATE_LIMITED"
    }

    fn retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// SLIDING WINDOW
// =============================================================================

struct SlidingWindow<K> {
    limit: usize,
    window: Duration,
    hits: HashMap<K, VecDeque<Instant>>,
}

impl<K: Eq + Hash> SlidingWindow<K> {
    fn new(limit: usize, window: Duration) -> Self {
        Self { limit, window, hits: HashMap::new() }
    }

    /// Record a hit for `key` unless the window is full. Returns whether it was admitted.
    fn admit(&mut self, key: K, now: Instant) -> bool {
        let deque = self.hits.entry(key).or_default();
        prune_window(deque, now, self.window);
        if deque.len() >= self.limit {
            return false;
        }
        deque.push_back(now);
        true
    }

    fn prune(&mut self, now: Instant) {
        let window = self.window;
        self.hits.retain(|_, deque| {
            prune_window(deque, now, window);
            !deque.is_empty()
        });
    }
}

// =============================================================================
// RATE LIMITER
// =============================================================================

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    config: RateLimitConfig,
}

struct RateLimiterInner {
    joins: SlidingWindow<Uuid>,
    codes: SlidingWindow<String>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::from_env())
    }

    #[must_use]
    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                joins: SlidingWindow::new(config.join_limit, config.join_window),
                codes: SlidingWindow::new(config.code_limit, config.code_window),
            })),
            config,
        }
    }

    /// Check and record one join attempt (invite code + OTP) for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `JoinAttempts` when the user's window is full.
    pub fn check_join(&self, user_id: Uuid) -> Result<(), RateLimitError> {
        self.check_join_at(user_id, Instant::now())
    }

    fn check_join_at(&self, user_id: Uuid, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.joins.admit(user_id, now) {
            Ok(())
        } else {
            Err(RateLimitError::JoinAttempts {
                limit: self.config.join_limit,
                window_secs: self.config.join_window.as_secs(),
            })
        }
    }

    /// Check and record one access-code request for a normalized email.
    ///
    /// # Errors
    ///
    /// Returns `CodeRequests` when the email's window is full.
    pub fn check_code_request(&self, email: &str) -> Result<(), RateLimitError> {
        self.check_code_request_at(email, Instant::now())
    }

    fn check_code_request_at(&self, email: &str, now: Instant) -> Result<(), RateLimitError> {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.codes.admit(email.to_owned(), now) {
            Ok(())
        } else {
            Err(RateLimitError::CodeRequests {
                limit: self.config.code_limit,
                window_secs: self.config.code_window.as_secs(),
            })
        }
    }

    /// Drop keys whose windows have fully elapsed.
    pub fn prune(&self) {
        self.prune_at(Instant::now());
    }

    fn prune_at(&self, now: Instant) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.joins.prune(now);
        inner.codes.prune(now);
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        inner.joins.hits.len() + inner.codes.hits.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn prune_window(deque: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = deque.front() {
        if now.duration_since(front) > window {
            deque.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_test.rs"]
mod tests;
