//! WebSocket handler: dashboard change feed plus realtime chat and timers.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Feed frames from the subscribed dashboard → forward to client
//!
//! Handler functions call services and return an `Outcome`. The dispatch
//! layer owns all outbound concerns: the reply to the sender and the feed
//! event for peers. Peers never see an event twice; the sender learns the
//! result from its reply.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (requires a one-time `ticket`) → send `session:connected`
//! 2. `dashboard:subscribe` → member check → join the dashboard feed
//! 3. Client sends frames → dispatch → handler returns Outcome
//! 4. Close → leave the feed

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, Frame, Status};
use crate::services::chat::{self, ChatMessage};
use crate::services::timer::{self, TimerTransition};
use crate::services::{dashboard, feed, overview, session};
use crate::state::AppState;

const CLIENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// OUTCOME
// =============================================================================

/// Change that peers on the dashboard feed should hear about.
enum Event {
    Timer(TimerTransition),
    Chat(ChatMessage),
}

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what; handlers never send frames directly.
enum Outcome {
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
    /// Reply to sender, publish the event to every other subscriber.
    ReplyAndPublish { reply: Data, event: Event },
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let user_id = match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(uid)) => uid,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user_id))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user_id: Uuid) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for feed frames from the subscribed dashboard.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(CLIENT_CHANNEL_CAPACITY);

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("user_id", user_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, %user_id, "ws: client connected");

    let mut current_dashboard: Option<Uuid> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies =
                            process_inbound_text(&state, &mut current_dashboard, client_id, user_id, &client_tx, &text).await;
                        for frame in replies {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(dashboard_id) = current_dashboard {
        feed::unsubscribe(&state, dashboard_id, client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive dispatch and fan-out
/// without a live connection.
async fn process_inbound_text(
    state: &AppState,
    current_dashboard: &mut Option<Uuid>,
    client_id: Uuid,
    user_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the authenticated user_id as `from`.
    req.from = Some(user_id.to_string());
    info!(%client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "dashboard" => handle_dashboard(state, current_dashboard, client_id, user_id, client_tx, &req).await,
        "chat" => handle_chat(state, *current_dashboard, user_id, &req).await,
        "timer" => handle_timer(state, user_id, &req).await,
        other => Err(req.error(format!("unknown prefix: {other}"))),
    };

    apply_outcome(state, client_id, &req, result).await
}

/// Turn a handler result into sender frames and feed events.
async fn apply_outcome(state: &AppState, client_id: Uuid, req: &Frame, result: Result<Outcome, Frame>) -> Vec<Frame> {
    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::ReplyAndPublish { reply, event }) => {
            match &event {
                Event::Timer(transition) => feed::publish_transition(state, transition, Some(client_id)).await,
                Event::Chat(message) => feed::publish_chat_message(state, message, Some(client_id)).await,
            }
            vec![req.done_with(reply)]
        }
        Err(err_frame) => vec![err_frame],
    }
}

fn data_of(key: &str, value: &impl Serialize) -> Result<Data, String> {
    let value = serde_json::to_value(value).map_err(|e| format!("encode failed: {e}"))?;
    let mut data = Data::new();
    data.insert(key.into(), value);
    Ok(data)
}

// =============================================================================
// DASHBOARD HANDLERS
// =============================================================================

async fn handle_dashboard(
    state: &AppState,
    current_dashboard: &mut Option<Uuid>,
    client_id: Uuid,
    user_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    match req.op() {
        "subscribe" => {
            let Some(dashboard_id) = req.dashboard_id.or_else(|| req.data_uuid("dashboard_id")) else {
                return Err(req.error("dashboard_id required"));
            };

            let overview = overview::dashboard_overview(&state.pool, dashboard_id, user_id)
                .await
                .map_err(|e| req.error_from(&e))?;

            // Replace any previous subscription.
            if let Some(old) = current_dashboard.take() {
                feed::unsubscribe(state, old, client_id).await;
            }
            feed::subscribe(state, dashboard_id, user_id, client_id, client_tx.clone()).await;
            *current_dashboard = Some(dashboard_id);

            let mut reply = data_of("overview", &overview).map_err(|e| req.error(e))?;
            let online = feed::subscriber_count(state, dashboard_id).await;
            reply.insert("online".into(), serde_json::json!(online));
            Ok(Outcome::Reply(reply))
        }
        "unsubscribe" => {
            if let Some(old) = current_dashboard.take() {
                feed::unsubscribe(state, old, client_id).await;
            }
            Ok(Outcome::Done)
        }
        "members" => {
            let Some(dashboard_id) = req.dashboard_id.or(*current_dashboard) else {
                return Err(req.error("dashboard_id required"));
            };
            let members = dashboard::list_members(&state.pool, dashboard_id, user_id)
                .await
                .map_err(|e| req.error_from(&e))?;
            data_of("members", &members).map(Outcome::Reply).map_err(|e| req.error(e))
        }
        op => Err(req.error(format!("unknown dashboard op: {op}"))),
    }
}

// =============================================================================
// CHAT HANDLERS
// =============================================================================

async fn handle_chat(
    state: &AppState,
    current_dashboard: Option<Uuid>,
    user_id: Uuid,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(dashboard_id) = req.dashboard_id.or(current_dashboard) else {
        return Err(req.error("dashboard_id required"));
    };

    match req.op() {
        "send" => {
            let text = req.data_str("message").unwrap_or_default();
            let message = chat::send_message(&state.pool, dashboard_id, user_id, text)
                .await
                .map_err(|e| req.error_from(&e))?;
            let reply = data_of("message", &message).map_err(|e| req.error(e))?;
            Ok(Outcome::ReplyAndPublish { reply, event: Event::Chat(message) })
        }
        "read" => {
            chat::mark_read(&state.pool, dashboard_id, user_id)
                .await
                .map_err(|e| req.error_from(&e))?;
            Ok(Outcome::Done)
        }
        op => Err(req.error(format!("unknown chat op: {op}"))),
    }
}

// =============================================================================
// TIMER HANDLERS
// =============================================================================

async fn handle_timer(state: &AppState, user_id: Uuid, req: &Frame) -> Result<Outcome, Frame> {
    let op = req.op();
    if !matches!(op, "start" | "pause" | "stop") {
        return Err(req.error(format!("unknown timer op: {op}")));
    }
    let Some(widget_id) = req.data_uuid("widget_id") else {
        return Err(req.error("widget_id required"));
    };

    let result = match op {
        "start" => timer::start_timer(&state.pool, widget_id, user_id).await,
        "pause" => timer::pause_timer(&state.pool, widget_id, user_id).await,
        _ => timer::stop_timer(&state.pool, widget_id, user_id, req.data_str("note")).await,
    };
    let transition = result.map_err(|e| req.error_from(&e))?;
    let reply = data_of("timer", &transition).map_err(|e| req.error(e))?;
    Ok(Outcome::ReplyAndPublish { reply, event: Event::Timer(transition) })
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data_str("code").unwrap_or("-");
        let message = frame.data_str("message").unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
