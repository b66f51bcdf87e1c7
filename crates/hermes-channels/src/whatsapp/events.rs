//! Library event translation.

use super::qr::generate_qr_terminal;
use super::ClientSlot;
use crate::connection::SocketEvent;
use hermes_core::event::{DisconnectReason, MessageKey, ProtocolEvent};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use wacore::types::events::Event;
use whatsapp_rust::client::Client;

pub(super) async fn handle_event(
    event: Event,
    client: Arc<Client>,
    tx: &mpsc::Sender<SocketEvent>,
    slot: &ClientSlot,
    print_qr: bool,
) {
    let translated = match event {
        Event::PairingQrCode { code, .. } => {
            info!("whatsapp QR code generated (scan to pair)");
            if print_qr {
                match generate_qr_terminal(&code) {
                    Ok(art) => println!("\n{art}"),
                    Err(e) => warn!("failed to render QR code: {e}"),
                }
            }
            vec![SocketEvent::Qr(code)]
        }
        Event::PairSuccess(_) => {
            info!("whatsapp pairing successful");
            vec![SocketEvent::CredsUpdated]
        }
        Event::Connected(_) => {
            info!("whatsapp connected");
            *slot.lock().await = Some(client);
            vec![SocketEvent::Open]
        }
        Event::Disconnected(_) => {
            warn!("whatsapp disconnected");
            *slot.lock().await = None;
            vec![SocketEvent::Close(DisconnectReason::ConnectionLost)]
        }
        Event::StreamReplaced(_) => {
            warn!("whatsapp session opened elsewhere");
            *slot.lock().await = None;
            vec![SocketEvent::Close(DisconnectReason::ConnectionReplaced)]
        }
        Event::LoggedOut(_) => {
            warn!("whatsapp logged out, session invalidated");
            *slot.lock().await = None;
            vec![SocketEvent::Close(DisconnectReason::LoggedOut)]
        }
        Event::Message(msg, info) => {
            let key = MessageKey {
                remote_jid: info.source.chat.to_string(),
                id: info.id.clone(),
                from_me: info.source.is_from_me,
                participant: info
                    .source
                    .is_group
                    .then(|| info.source.sender.to_string()),
            };
            let sender = info.source.sender.to_string();
            let content = message_content(&msg);
            let timestamp = chrono::Utc::now().timestamp();
            debug!("whatsapp message {} in {}", key.id, key.remote_jid);
            message_events(key, &sender, &info.push_name, timestamp, content)
                .into_iter()
                .map(SocketEvent::Data)
                .collect()
        }
        _ => Vec::new(),
    };

    for event in translated {
        if tx.send(event).await.is_err() {
            debug!("whatsapp event receiver dropped");
            return;
        }
    }
}

/// Message content as the store keeps it: the text-bearing parts of the
/// protocol message, with device-sent / ephemeral / view-once wrappers removed.
fn message_content(msg: &waproto::whatsapp::Message) -> Value {
    let inner = msg
        .device_sent_message
        .as_ref()
        .and_then(|d| d.message.as_deref())
        .or_else(|| {
            msg.ephemeral_message
                .as_ref()
                .and_then(|e| e.message.as_deref())
        })
        .or_else(|| {
            msg.view_once_message
                .as_ref()
                .and_then(|v| v.message.as_deref())
        })
        .unwrap_or(msg);

    if let Some(text) = inner.conversation.as_deref() {
        return json!({ "conversation": text });
    }
    if let Some(text) = inner
        .extended_text_message
        .as_ref()
        .and_then(|e| e.text.as_deref())
    {
        return json!({ "extendedTextMessage": { "text": text } });
    }
    if let Some(img) = inner.image_message.as_ref() {
        return json!({ "imageMessage": { "caption": img.caption, "mimetype": img.mimetype } });
    }
    if inner.audio_message.is_some() {
        return json!({ "audioMessage": {} });
    }
    json!({})
}

/// The protocol events one incoming message produces: the message upsert,
/// plus a contact upsert carrying the sender's push name.
pub(super) fn message_events(
    key: MessageKey,
    sender: &str,
    push_name: &str,
    timestamp: i64,
    content: Value,
) -> Vec<ProtocolEvent> {
    let from_me = key.from_me;
    let mut record = json!({
        "key": key,
        "messageTimestamp": timestamp,
        "message": content,
    });
    if !push_name.is_empty() {
        record["pushName"] = Value::String(push_name.to_string());
    }

    let mut events = vec![ProtocolEvent::new(
        "messages.upsert",
        json!({ "messages": [record], "type": "notify" }),
    )];
    if !push_name.is_empty() && !from_me {
        events.push(ProtocolEvent::new(
            "contacts.upsert",
            json!([{ "id": sender, "notify": push_name }]),
        ));
    }
    events
}
