//! Text rendering for mirrored events.

use hermes_core::event::{ConnectionState, ConnectionUpdate};
use hermes_store::{message_text, StoredMessage};
use serde_json::Value;

/// One line per noteworthy state change; transient states are not mirrored.
pub(crate) fn status_line(update: &ConnectionUpdate) -> Option<String> {
    match (update.state, &update.reason) {
        (ConnectionState::Open, _) => Some("✅ WhatsApp connected".to_string()),
        (ConnectionState::Closed, Some(reason)) => Some(format!("⚠️ WhatsApp closed: {reason}")),
        (ConnectionState::Closed, None) => Some("⚠️ WhatsApp closed".to_string()),
        (ConnectionState::ShuttingDown, _) => Some("🛑 Hermes shutting down".to_string()),
        _ => None,
    }
}

/// Mirror lines for the incoming text messages in a `messages.upsert` payload.
///
/// Own messages and messages without text are skipped.
pub(crate) fn incoming_messages(payload: &Value) -> Vec<String> {
    let records = payload
        .get("messages")
        .and_then(Value::as_array)
        .or_else(|| payload.as_array());
    let Some(records) = records else {
        return Vec::new();
    };

    records
        .iter()
        .filter_map(|record| {
            let message = StoredMessage::from_value(record)?;
            if message.key.from_me {
                return None;
            }
            let text = message.message.as_ref().and_then(message_text)?;
            let from = message.push_name.as_deref().unwrap_or(message.sender());
            Some(if message.key.remote_jid.ends_with("@g.us") {
                format!("💬 {from} in {}:\n{text}", message.key.remote_jid)
            } else {
                format!("💬 {from}:\n{text}")
            })
        })
        .collect()
}
