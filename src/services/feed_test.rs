use super::*;
use crate::frame::Status;
use crate::services::timer::TimerState;
use crate::state::test_helpers;
use time::OffsetDateTime;
use tokio::time::{Duration, timeout};

async fn assert_channel_has_frame(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("channel closed")
}

async fn assert_channel_empty(rx: &mut mpsc::Receiver<Frame>) {
    assert!(
        timeout(Duration::from_millis(80), rx.recv()).await.is_err(),
        "expected channel to remain empty"
    );
}

fn running_view(dashboard_id: Uuid, user_id: Uuid) -> TimerView {
    let now = OffsetDateTime::now_utc();
    let mut state = TimerState::idle(Uuid::new_v4(), user_id, now);
    state.start(now);
    TimerView::new(dashboard_id, state, now)
}

#[tokio::test]
async fn broadcast_sends_to_all_except_excluded_client() {
    let state = test_helpers::test_app_state();
    let dashboard_id = Uuid::new_v4();
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let mut rx_a = test_helpers::subscribe_client(&state, dashboard_id, a, Uuid::new_v4()).await;
    let mut rx_b = test_helpers::subscribe_client(&state, dashboard_id, b, Uuid::new_v4()).await;
    let mut rx_c = test_helpers::subscribe_client(&state, dashboard_id, c, Uuid::new_v4()).await;

    let frame = Frame::request("chat:message", Data::new()).with_dashboard_id(dashboard_id);
    broadcast(&state, dashboard_id, &frame, Some(a)).await;

    assert_channel_empty(&mut rx_a).await;
    assert_eq!(assert_channel_has_frame(&mut rx_b).await.id, frame.id);
    assert_eq!(assert_channel_has_frame(&mut rx_c).await.id, frame.id);
}

#[tokio::test]
async fn broadcast_to_unknown_dashboard_is_noop() {
    let state = test_helpers::test_app_state();
    let frame = Frame::request("chat:message", Data::new());
    broadcast(&state, Uuid::new_v4(), &frame, None).await;
    assert!(state.feeds.read().await.is_empty());
}

#[tokio::test]
async fn broadcast_skips_full_channels() {
    let state = test_helpers::test_app_state();
    let dashboard_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(1);
    subscribe(&state, dashboard_id, Uuid::new_v4(), Uuid::new_v4(), tx).await;

    let first = Frame::request("chat:message", Data::new());
    let second = Frame::request("chat:message", Data::new());
    broadcast(&state, dashboard_id, &first, None).await;
    broadcast(&state, dashboard_id, &second, None).await;

    assert_eq!(assert_channel_has_frame(&mut rx).await.id, first.id);
    assert_channel_empty(&mut rx).await;
}

#[tokio::test]
async fn unsubscribe_evicts_empty_feed() {
    let state = test_helpers::test_app_state();
    let dashboard_id = Uuid::new_v4();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    let _rx_a = test_helpers::subscribe_client(&state, dashboard_id, a, Uuid::new_v4()).await;
    let _rx_b = test_helpers::subscribe_client(&state, dashboard_id, b, Uuid::new_v4()).await;

    unsubscribe(&state, dashboard_id, a).await;
    assert_eq!(subscriber_count(&state, dashboard_id).await, 1);
    unsubscribe(&state, dashboard_id, b).await;
    assert_eq!(subscriber_count(&state, dashboard_id).await, 0);
    assert!(!state.feeds.read().await.contains_key(&dashboard_id));
}

#[tokio::test]
async fn drop_user_removes_all_their_connections() {
    let state = test_helpers::test_app_state();
    let dashboard_id = Uuid::new_v4();
    let leaving = Uuid::new_v4();
    let _r1 = test_helpers::subscribe_client(&state, dashboard_id, Uuid::new_v4(), leaving).await;
    let _r2 = test_helpers::subscribe_client(&state, dashboard_id, Uuid::new_v4(), leaving).await;
    let _r3 = test_helpers::subscribe_client(&state, dashboard_id, Uuid::new_v4(), Uuid::new_v4()).await;

    drop_user(&state, dashboard_id, leaving).await;
    assert_eq!(subscriber_count(&state, dashboard_id).await, 1);
}

#[tokio::test]
async fn close_feed_notifies_then_evicts() {
    let state = test_helpers::test_app_state();
    let dashboard_id = Uuid::new_v4();
    let mut rx = test_helpers::subscribe_client(&state, dashboard_id, Uuid::new_v4(), Uuid::new_v4()).await;

    close_feed(&state, dashboard_id).await;

    let frame = assert_channel_has_frame(&mut rx).await;
    assert_eq!(frame.syscall, DASHBOARD_DELETED);
    assert_eq!(frame.dashboard_id, Some(dashboard_id));
    assert_eq!(subscriber_count(&state, dashboard_id).await, 0);
}

#[tokio::test]
async fn publish_timer_carries_view_and_actor() {
    let state = test_helpers::test_app_state();
    let dashboard_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let mut rx = test_helpers::subscribe_client(&state, dashboard_id, Uuid::new_v4(), Uuid::new_v4()).await;

    publish_timer(&state, &running_view(dashboard_id, user_id), None).await;

    let frame = assert_channel_has_frame(&mut rx).await;
    assert_eq!(frame.syscall, TIMER_CHANGED);
    assert_eq!(frame.status, Status::Request);
    assert_eq!(frame.from.as_deref(), Some(user_id.to_string().as_str()));
    assert_eq!(frame.data["timer"]["status"], "running");
}

#[tokio::test]
async fn publish_transition_routes_paused_timers_to_their_dashboards() {
    let state = test_helpers::test_app_state();
    let (here, elsewhere) = (Uuid::new_v4(), Uuid::new_v4());
    let user_id = Uuid::new_v4();
    let origin = Uuid::new_v4();
    let mut rx_origin = test_helpers::subscribe_client(&state, here, origin, user_id).await;
    let mut rx_other = test_helpers::subscribe_client(&state, elsewhere, Uuid::new_v4(), Uuid::new_v4()).await;

    let mut paused = running_view(elsewhere, user_id);
    paused.state.pause(OffsetDateTime::now_utc()).unwrap();
    let transition = TimerTransition { timer: running_view(here, user_id), paused: vec![paused], session: None };

    publish_transition(&state, &transition, Some(origin)).await;

    assert_channel_empty(&mut rx_origin).await;
    let frame = assert_channel_has_frame(&mut rx_other).await;
    assert_eq!(frame.dashboard_id, Some(elsewhere));
    assert_eq!(frame.data["timer"]["status"], "paused");
}

#[tokio::test]
async fn members_changed_names_user_and_change() {
    let state = test_helpers::test_app_state();
    let dashboard_id = Uuid::new_v4();
    let joined = Uuid::new_v4();
    let mut rx = test_helpers::subscribe_client(&state, dashboard_id, Uuid::new_v4(), Uuid::new_v4()).await;

    publish_members_changed(&state, dashboard_id, joined, MemberChange::Joined).await;

    let frame = assert_channel_has_frame(&mut rx).await;
    assert_eq!(frame.syscall, MEMBERS_CHANGED);
    assert_eq!(frame.data_str("change"), Some("joined"));
    assert_eq!(frame.data_uuid("user_id"), Some(joined));
}

#[tokio::test]
async fn chat_delete_carries_message_id() {
    let state = test_helpers::test_app_state();
    let dashboard_id = Uuid::new_v4();
    let message_id = Uuid::new_v4();
    let mut rx = test_helpers::subscribe_client(&state, dashboard_id, Uuid::new_v4(), Uuid::new_v4()).await;

    publish_chat_delete(&state, dashboard_id, message_id, Uuid::new_v4()).await;

    let frame = assert_channel_has_frame(&mut rx).await;
    assert_eq!(frame.syscall, CHAT_DELETE);
    assert_eq!(frame.data_uuid("message_id"), Some(message_id));
}
