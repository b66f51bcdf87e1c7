use super::format::{incoming_messages, status_line};
use super::types::*;
use hermes_core::event::{ConnectionState, ConnectionUpdate, DisconnectReason};
use serde_json::json;

#[test]
fn test_status_lines() {
    let open = ConnectionUpdate {
        state: ConnectionState::Open,
        reason: None,
    };
    assert!(status_line(&open).unwrap().contains("connected"));

    let closed = ConnectionUpdate {
        state: ConnectionState::Closed,
        reason: Some(DisconnectReason::ConnectionLost),
    };
    assert!(status_line(&closed).unwrap().contains("connection lost"));

    let connecting = ConnectionUpdate {
        state: ConnectionState::Connecting,
        reason: None,
    };
    assert!(status_line(&connecting).is_none());
}

#[test]
fn test_incoming_direct_message() {
    let payload = json!({
        "messages": [{
            "key": {"remoteJid": "5511@s.whatsapp.net", "id": "m1", "fromMe": false},
            "pushName": "Ana",
            "message": {"conversation": "hello"}
        }],
        "type": "notify"
    });
    assert_eq!(incoming_messages(&payload), vec!["💬 Ana:\nhello"]);
}

#[test]
fn test_incoming_group_message_names_group() {
    let payload = json!({
        "messages": [{
            "key": {"remoteJid": "g1@g.us", "id": "m1", "participant": "77@s.whatsapp.net"},
            "message": {"extendedTextMessage": {"text": "hi all"}}
        }]
    });
    assert_eq!(
        incoming_messages(&payload),
        vec!["💬 77@s.whatsapp.net in g1@g.us:\nhi all"]
    );
}

#[test]
fn test_own_and_textless_messages_are_skipped() {
    let payload = json!({
        "messages": [
            {"key": {"remoteJid": "a@s.whatsapp.net", "id": "1", "fromMe": true},
             "message": {"conversation": "mine"}},
            {"key": {"remoteJid": "a@s.whatsapp.net", "id": "2"},
             "message": {"audioMessage": {}}}
        ]
    });
    assert!(incoming_messages(&payload).is_empty());
    assert!(incoming_messages(&json!({"unexpected": true})).is_empty());
}

#[test]
fn test_get_me_response() {
    let resp: TgResponse<TgUser> = serde_json::from_str(
        r#"{"ok": true, "result": {"id": 1, "is_bot": true, "first_name": "Hermes", "username": "hermes_bot"}}"#,
    )
    .unwrap();
    assert!(resp.ok);
    assert_eq!(resp.result.unwrap().username.as_deref(), Some("hermes_bot"));

    let rejected: TgResponse<TgUser> =
        serde_json::from_str(r#"{"ok": false, "description": "Unauthorized"}"#).unwrap();
    assert!(rejected.result.is_none());
    assert_eq!(rejected.description.as_deref(), Some("Unauthorized"));
}
