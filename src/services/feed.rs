//! Live change feed: per-dashboard websocket fan-out.
//!
//! DESIGN
//! ======
//! Each dashboard with at least one subscriber has a `DashboardFeed` in
//! `AppState::feeds`. Other services never touch it; routes publish after a
//! mutation commits. Delivery is best-effort: a subscriber whose bounded
//! channel is full misses the frame and catches up on its next fetch.
//!
//! Changes made over HTTP go to every subscriber. Changes made over the
//! websocket pass the originating `client_id` as `exclude`, since that client
//! already received the result as its reply.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use super::chat::ChatMessage;
use super::timer::{TimerTransition, TimerView};
use crate::frame::{Data, Frame};
use crate::state::{AppState, DashboardFeed};

pub const TIMER_CHANGED: &str = "timer:changed";
pub const CHAT_MESSAGE: &str = "chat:message";
pub const CHAT_DELETE: &str = "chat:delete";
pub const MEMBERS_CHANGED: &str = "members:changed";
pub const DASHBOARD_DELETED: &str = "dashboard:deleted";

/// What happened to a dashboard's membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberChange {
    Joined,
    Left,
    Removed,
}

// =============================================================================
// SUBSCRIPTIONS
// =============================================================================

/// Register a websocket client on a dashboard's feed. Membership must already
/// be checked by the caller.
pub async fn subscribe(state: &AppState, dashboard_id: Uuid, user_id: Uuid, client_id: Uuid, tx: mpsc::Sender<Frame>) {
    let mut feeds = state.feeds.write().await;
    let feed = feeds.entry(dashboard_id).or_insert_with(DashboardFeed::new);
    feed.clients.insert(client_id, tx);
    feed.users.insert(client_id, user_id);
    info!(%dashboard_id, %client_id, clients = feed.clients.len(), "client subscribed to dashboard");
}

/// Remove a client. Evicts the feed when its last subscriber leaves.
pub async fn unsubscribe(state: &AppState, dashboard_id: Uuid, client_id: Uuid) {
    let mut feeds = state.feeds.write().await;
    let Some(feed) = feeds.get_mut(&dashboard_id) else {
        return;
    };
    feed.clients.remove(&client_id);
    feed.users.remove(&client_id);
    info!(%dashboard_id, %client_id, remaining = feed.clients.len(), "client unsubscribed from dashboard");

    if feed.clients.is_empty() {
        feeds.remove(&dashboard_id);
    }
}

/// Drop every connection of `user_id` from a dashboard feed, e.g. after the
/// user left or was removed.
pub async fn drop_user(state: &AppState, dashboard_id: Uuid, user_id: Uuid) {
    let mut feeds = state.feeds.write().await;
    let Some(feed) = feeds.get_mut(&dashboard_id) else {
        return;
    };
    let clients: Vec<Uuid> = feed
        .users
        .iter()
        .filter(|(_, uid)| **uid == user_id)
        .map(|(cid, _)| *cid)
        .collect();
    for client_id in &clients {
        feed.clients.remove(client_id);
        feed.users.remove(client_id);
    }
    if feed.clients.is_empty() {
        feeds.remove(&dashboard_id);
    }
}

/// Tell subscribers the dashboard is gone, then evict its feed.
pub async fn close_feed(state: &AppState, dashboard_id: Uuid) {
    let frame = Frame::request(DASHBOARD_DELETED, Data::new())
        .with_dashboard_id(dashboard_id)
        .with_data("dashboard_id", dashboard_id.to_string());
    broadcast(state, dashboard_id, &frame, None).await;
    state.feeds.write().await.remove(&dashboard_id);
}

pub async fn subscriber_count(state: &AppState, dashboard_id: Uuid) -> usize {
    state
        .feeds
        .read()
        .await
        .get(&dashboard_id)
        .map_or(0, |feed| feed.clients.len())
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Send a frame to every subscriber of a dashboard, optionally excluding one.
pub async fn broadcast(state: &AppState, dashboard_id: Uuid, frame: &Frame, exclude: Option<Uuid>) {
    let feeds = state.feeds.read().await;
    let Some(feed) = feeds.get(&dashboard_id) else {
        return;
    };

    for (client_id, tx) in &feed.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = tx.try_send(frame.clone());
    }
}

fn event(syscall: &str, dashboard_id: Uuid, actor: Uuid, key: &str, payload: &impl Serialize) -> Option<Frame> {
    match serde_json::to_value(payload) {
        Ok(value) => Some(
            Frame::request(syscall, Data::new())
                .with_dashboard_id(dashboard_id)
                .with_from(actor.to_string())
                .with_data(key, value),
        ),
        Err(e) => {
            warn!(error = %e, %syscall, "failed to encode feed event");
            None
        }
    }
}

pub async fn publish_timer(state: &AppState, timer: &TimerView, exclude: Option<Uuid>) {
    if let Some(frame) = event(TIMER_CHANGED, timer.dashboard_id, timer.state.user_id, "timer", timer) {
        broadcast(state, timer.dashboard_id, &frame, exclude).await;
    }
}

/// Publish the changed timer and every timer a start paused as a side effect.
pub async fn publish_transition(state: &AppState, transition: &TimerTransition, exclude: Option<Uuid>) {
    for paused in &transition.paused {
        publish_timer(state, paused, None).await;
    }
    publish_timer(state, &transition.timer, exclude).await;
}

pub async fn publish_chat_message(state: &AppState, message: &ChatMessage, exclude: Option<Uuid>) {
    if let Some(frame) = event(CHAT_MESSAGE, message.dashboard_id, message.user_id, "message", message) {
        broadcast(state, message.dashboard_id, &frame, exclude).await;
    }
}

pub async fn publish_chat_delete(state: &AppState, dashboard_id: Uuid, message_id: Uuid, actor: Uuid) {
    let frame = Frame::request(CHAT_DELETE, Data::new())
        .with_dashboard_id(dashboard_id)
        .with_from(actor.to_string())
        .with_data("message_id", message_id.to_string());
    broadcast(state, dashboard_id, &frame, None).await;
}

pub async fn publish_members_changed(state: &AppState, dashboard_id: Uuid, user_id: Uuid, change: MemberChange) {
    if let Some(frame) = event(MEMBERS_CHANGED, dashboard_id, user_id, "change", &change) {
        let frame = frame.with_data("user_id", user_id.to_string());
        broadcast(state, dashboard_id, &frame, None).await;
    }
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
