//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API and the websocket change feed under a
//! single Axum router. Every `/api` route except sign-in and the websocket
//! upgrade requires a session (cookie or bearer token).

pub mod auth;
pub mod chat;
pub mod dashboards;
pub mod error;
pub mod invites;
pub mod profiles;
pub mod timers;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router: API routes, websocket, health check.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/email/request-code", post(auth::request_email_code))
        .route("/api/auth/email/verify-code", post(auth::verify_email_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/dashboards", get(dashboards::list_dashboards).post(dashboards::create_dashboard))
        .route("/api/dashboards/join", post(dashboards::join_dashboard))
        .route(
            "/api/dashboards/{id}",
            get(dashboards::get_dashboard)
                .patch(dashboards::rename_dashboard)
                .delete(dashboards::delete_dashboard),
        )
        .route("/api/dashboards/{id}/overview", get(dashboards::get_overview))
        .route("/api/dashboards/{id}/leave", post(dashboards::leave_dashboard))
        .route("/api/dashboards/{id}/members", get(dashboards::list_members))
        .route("/api/dashboards/{id}/members/{user_id}", delete(dashboards::remove_member))
        .route("/api/dashboards/{id}/widgets", get(dashboards::list_widgets))
        .route(
            "/api/dashboards/{id}/invites",
            get(invites::list_pending_invites).post(invites::send_invite),
        )
        .route("/api/dashboards/{id}/invites/{invite_id}", delete(invites::cancel_invite))
        .route("/api/dashboards/{id}/chat", get(chat::list_messages).post(chat::send_message))
        .route("/api/dashboards/{id}/chat/read", post(chat::mark_read))
        .route("/api/dashboards/{id}/chat/unread", get(chat::unread_count))
        .route("/api/chat/{message_id}", delete(chat::delete_message))
        .route("/api/invites", get(invites::list_my_invites))
        .route("/api/invites/{invite_id}/accept", post(invites::accept_invite))
        .route("/api/invites/{invite_id}/decline", post(invites::decline_invite))
        .route("/api/widgets/{id}/timer", get(timers::get_timer))
        .route("/api/widgets/{id}/timers", get(timers::list_timers))
        .route("/api/widgets/{id}/timer/start", post(timers::start_timer))
        .route("/api/widgets/{id}/timer/pause", post(timers::pause_timer))
        .route("/api/widgets/{id}/timer/stop", post(timers::stop_timer))
        .route("/api/widgets/{id}/session", get(timers::get_today_session))
        .route("/api/widgets/{id}/note", put(timers::update_note))
        .route("/api/widgets/{id}/notes", get(timers::team_notes))
        .route("/api/widgets/{id}/leaderboard", get(timers::leaderboard))
        .route("/api/profile", get(profiles::my_profile).patch(profiles::update_profile))
        .route("/api/profile/theme", put(profiles::update_theme))
        .route("/api/profile/stats", get(profiles::my_stats))
        .route("/api/profile/activity", get(profiles::my_activity))
        .route("/api/profile/page", get(profiles::my_profile_page))
        .route("/api/users/{id}/profile", get(profiles::user_profile))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
