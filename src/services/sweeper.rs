//! Housekeeping sweeper: periodic cleanup of expiring rows.
//!
//! DESIGN
//! ======
//! A background task runs one sweep, then sleeps `SWEEP_INTERVAL_SECS`
//! (default 300) before the next. Each sweep:
//! - flips pending invites past `expires_at` to `expired`;
//! - deletes expired sessions and websocket tickets;
//! - deletes login codes that are consumed or expired;
//! - prunes idle rate-limit windows.
//!
//! Every step is independent; one failing query is logged and the rest
//! still run.

use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::env_parse;
use crate::state::AppState;

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Rows touched by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub invites_expired: u64,
    pub sessions_deleted: u64,
    pub tickets_deleted: u64,
    pub codes_deleted: u64,
}

impl SweepReport {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.invites_expired + self.sessions_deleted + self.tickets_deleted + self.codes_deleted
    }
}

/// Spawn the background sweeper. Returns a handle for shutdown.
pub fn spawn_sweeper(state: AppState) -> JoinHandle<()> {
    let interval_secs = env_parse("SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS).max(1);
    info!(interval_secs, "housekeeping sweeper configured");
    tokio::spawn(async move {
        loop {
            let report = sweep_once(&state).await;
            if report.total() > 0 {
                info!(
                    invites_expired = report.invites_expired,
                    sessions_deleted = report.sessions_deleted,
                    tickets_deleted = report.tickets_deleted,
                    codes_deleted = report.codes_deleted,
                    "sweep complete"
                );
            }
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        }
    })
}

/// Run every cleanup step once.
pub async fn sweep_once(state: &AppState) -> SweepReport {
    state.rate_limiter.prune();
    SweepReport {
        invites_expired: run_step(&state.pool, "invites", EXPIRE_INVITES).await,
        sessions_deleted: run_step(&state.pool, "sessions", DELETE_SESSIONS).await,
        tickets_deleted: run_step(&state.pool, "ws_tickets", DELETE_TICKETS).await,
        codes_deleted: run_step(&state.pool, "login_codes", DELETE_CODES).await,
    }
}

const EXPIRE_INVITES: &str =
    "UPDATE dashboard_invites SET status = 'expired' WHERE status = 'pending' AND expires_at <= now()";
const DELETE_SESSIONS: &str = "DELETE FROM sessions WHERE expires_at <= now()";
const DELETE_TICKETS: &str = "DELETE FROM ws_tickets WHERE expires_at <= now()";
const DELETE_CODES: &str = "DELETE FROM email_login_codes WHERE consumed_at IS NOT NULL OR expires_at <= now()";

async fn run_step(pool: &PgPool, step: &'static str, sql: &'static str) -> u64 {
    match sqlx::query(sql).execute(pool).await {
        Ok(result) => result.rows_affected(),
        Err(e) => {
            warn!(error = %e, step, "sweep step failed");
            0
        }
    }
}

#[cfg(test)]
#[path = "sweeper_test.rs"]
mod tests;
