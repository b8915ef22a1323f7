//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the database pool, the live change-feed registry, the rate
//! limiter, and the optional mailer. Each dashboard with at least one
//! websocket subscriber has a `DashboardFeed` holding the subscribers'
//! outbound channels; feeds are evicted when their last subscriber leaves.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::frame::Frame;
use crate::rate_limit::RateLimiter;
use crate::services::mailer::Mailer;

// =============================================================================
// DASHBOARD FEED
// =============================================================================

/// Live subscribers of one dashboard.
pub struct DashboardFeed {
    /// Connected clients: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
    /// Authenticated user behind each connection: `client_id` -> `user_id`.
    pub users: HashMap<Uuid, Uuid>,
}

impl DashboardFeed {
    #[must_use]
    pub fn new() -> Self {
        Self { clients: HashMap::new(), users: HashMap::new() }
    }
}

impl Default for DashboardFeed {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; all inner fields are Arc-wrapped or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub feeds: Arc<RwLock<HashMap<Uuid, DashboardFeed>>>,
    pub rate_limiter: RateLimiter,
    /// `None` when mail delivery is not configured.
    pub mailer: Option<Mailer>,
    pub cookie_secure: bool,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, mailer: Option<Mailer>, cookie_secure: bool) -> Self {
        Self {
            pool,
            feeds: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter: RateLimiter::new(),
            mailer,
            cookie_secure,
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
