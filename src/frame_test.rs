use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("dashboard:subscribe", Data::new());
    assert_eq!(frame.syscall, "dashboard:subscribe");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.dashboard_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let dashboard_id = Uuid::new_v4();
    let req = Frame::request("chat:send", Data::new()).with_dashboard_id(dashboard_id);
    let done = req.done();

    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.dashboard_id, Some(dashboard_id));
    assert_eq!(done.syscall, "chat:send");
    assert_eq!(done.status, Status::Done);
    assert!(done.data.is_empty());
}

#[test]
fn done_with_carries_payload() {
    let req = Frame::request("timer:start", Data::new());
    let mut data = Data::new();
    data.insert("status".into(), serde_json::json!("running"));
    let done = req.done_with(data);

    assert_eq!(done.status, Status::Done);
    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.data_str("status"), Some("running"));
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("timer:pause", Data::new());
    assert_eq!(frame.prefix(), "timer");
    assert_eq!(frame.op(), "pause");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn data_uuid_parses_strings_only() {
    let id = Uuid::new_v4();
    let frame = Frame::request("timer:start", Data::new())
        .with_data("widget_id", id.to_string())
        .with_data("bad", "not-a-uuid")
        .with_data("number", 7);

    assert_eq!(frame.data_uuid("widget_id"), Some(id));
    assert_eq!(frame.data_uuid("bad"), None);
    assert_eq!(frame.data_uuid("number"), None);
    assert_eq!(frame.data_uuid("missing"), None);
}

#[test]
fn json_round_trip() {
    let dashboard_id = Uuid::new_v4();
    let original = Frame::request("chat:send", Data::new())
        .with_dashboard_id(dashboard_id)
        .with_from("test-user")
        .with_data("message", "hello");

    let json = serde_json::to_string(&original).expect("serialize");
    let restored: Frame = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(restored.id, original.id);
    assert_eq!(restored.dashboard_id, Some(dashboard_id));
    assert_eq!(restored.syscall, "chat:send");
    assert_eq!(restored.from.as_deref(), Some("test-user"));
    assert_eq!(restored.data_str("message"), Some("hello"));
}

#[test]
fn minimal_client_frame_deserializes() {
    let raw = format!(
        r#"{{"id":"{}","parent_id":null,"ts":0,"syscall":"dashboard:unsubscribe","status":"request"}}"#,
        Uuid::new_v4()
    );
    let frame: Frame = serde_json::from_str(&raw).expect("deserialize");
    assert!(frame.data.is_empty());
    assert!(frame.from.is_none());
    assert!(frame.dashboard_id.is_none());
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not found")]
    struct NotFound;

    impl ErrorCode for NotFound {
        fn error_code(&self) -> &'static str {
            "E_NOT_FOUND"
        }
    }

    let req = Frame::request("timer:stop", Data::new());
    let err = req.error_from(&NotFound);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data_str("code"), Some("E_NOT_FOUND"));
    assert_eq!(err.data_str("message"), Some("not found"));
    assert_eq!(
        err.data
            .get("retryable")
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
}
