//! Event-name subscription table and the bus binding.

use super::state::{str_field, Record};
use super::{EntityKind, Store};
use hermes_core::error::HermesError;
use hermes_core::event::{BusEvent, ProtocolEvent};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Handler = fn(&Store, &Value) -> Result<(), HermesError>;

/// Fixed mapping from protocol event name to its translation.
const HANDLERS: &[(&str, Handler)] = &[
    ("contacts.set", contacts_upsert as Handler),
    ("contacts.upsert", contacts_upsert as Handler),
    ("contacts.update", contacts_update as Handler),
    ("contacts.delete", contacts_delete as Handler),
    ("chats.set", chats_upsert as Handler),
    ("chats.upsert", chats_upsert as Handler),
    ("chats.update", chats_update as Handler),
    ("chats.delete", chats_delete as Handler),
    ("messages.set", messages_upsert as Handler),
    ("messages.upsert", messages_upsert as Handler),
    ("messages.update", messages_update as Handler),
    ("messages.delete", messages_delete as Handler),
    ("presence.update", presence_update as Handler),
    ("groups.upsert", groups_upsert as Handler),
    ("groups.update", groups_update as Handler),
    ("group-participants.update", participants_update as Handler),
    ("call", call as Handler),
];

/// Names the store reacts to.
pub fn subscribed_events() -> impl Iterator<Item = &'static str> {
    HANDLERS.iter().map(|(name, _)| *name)
}

impl Store {
    /// Consume protocol events from the bus until it closes.
    ///
    /// Events on the bus are applied in emission order; each runs inside its
    /// own error boundary.
    pub fn bind(&self, mut events: broadcast::Receiver<BusEvent>) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(BusEvent::Protocol(event)) => store.apply_event(&event),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("store: lagged behind the event bus, {n} events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!("store: event bus closed, unbinding");
        })
    }

    /// Translate one event. Returns `Ok(false)` for names outside the table.
    pub fn handle_event(&self, event: &ProtocolEvent) -> Result<bool, HermesError> {
        let Some((_, handler)) = HANDLERS.iter().find(|(name, _)| *name == event.name) else {
            return Ok(false);
        };
        handler(self, &event.payload)?;
        Ok(true)
    }

    /// [`Store::handle_event`] with failures logged and dropped.
    pub fn apply_event(&self, event: &ProtocolEvent) {
        if let Err(e) = self.handle_event(event) {
            warn!("store: dropping malformed '{}' event: {e}", event.name);
        }
    }
}

/// The record list of a payload: a bare array or an object wrapping one
/// under `field`.
fn records<'a>(payload: &'a Value, field: &str) -> Result<&'a [Value], HermesError> {
    match payload {
        Value::Array(items) => Ok(items),
        Value::Object(obj) => obj
            .get(field)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| HermesError::Store(format!("expected '{field}' array in payload"))),
        _ => Err(HermesError::Store(format!(
            "expected array or object with '{field}'"
        ))),
    }
}

fn upsert_all(store: &Store, kind: EntityKind, items: &[Value]) {
    for item in items {
        store.upsert(kind, item.clone());
    }
}

fn contacts_upsert(store: &Store, payload: &Value) -> Result<(), HermesError> {
    upsert_all(store, EntityKind::Contact, records(payload, "contacts")?);
    Ok(())
}

fn contacts_update(store: &Store, payload: &Value) -> Result<(), HermesError> {
    store.update(EntityKind::Contact, records(payload, "contacts")?);
    Ok(())
}

fn contacts_delete(store: &Store, payload: &Value) -> Result<(), HermesError> {
    store.delete(EntityKind::Contact, records(payload, "ids")?);
    Ok(())
}

fn chats_upsert(store: &Store, payload: &Value) -> Result<(), HermesError> {
    upsert_all(store, EntityKind::Chat, records(payload, "chats")?);
    Ok(())
}

fn chats_update(store: &Store, payload: &Value) -> Result<(), HermesError> {
    store.update(EntityKind::Chat, records(payload, "chats")?);
    Ok(())
}

fn chats_delete(store: &Store, payload: &Value) -> Result<(), HermesError> {
    store.delete(EntityKind::Chat, records(payload, "ids")?);
    Ok(())
}

fn messages_upsert(store: &Store, payload: &Value) -> Result<(), HermesError> {
    upsert_all(store, EntityKind::Message, records(payload, "messages")?);
    Ok(())
}

fn messages_update(store: &Store, payload: &Value) -> Result<(), HermesError> {
    store.update(EntityKind::Message, records(payload, "messages")?);
    Ok(())
}

fn messages_delete(store: &Store, payload: &Value) -> Result<(), HermesError> {
    if payload.get("all").and_then(Value::as_bool) == Some(true) {
        let jid = payload
            .get("jid")
            .and_then(Value::as_str)
            .ok_or_else(|| HermesError::Store("messages.delete with all=true needs a jid".into()))?;
        store.clear_messages(jid);
        return Ok(());
    }
    store.delete(EntityKind::Message, records(payload, "keys")?);
    Ok(())
}

fn presence_update(store: &Store, payload: &Value) -> Result<(), HermesError> {
    let chat = payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| HermesError::Store("presence.update without chat id".into()))?;
    let presences = payload
        .get("presences")
        .and_then(Value::as_object)
        .ok_or_else(|| HermesError::Store("presence.update without presences map".into()))?;

    for (participant, record) in presences {
        if let Some(record) = record.as_object() {
            store.set_presence(chat, participant, record.clone());
        }
    }
    Ok(())
}

fn groups_upsert(store: &Store, payload: &Value) -> Result<(), HermesError> {
    for group in records(payload, "groups")? {
        store.set_group_metadata(group.clone());
    }
    Ok(())
}

fn groups_update(store: &Store, payload: &Value) -> Result<(), HermesError> {
    store.update(EntityKind::GroupMetadata, records(payload, "groups")?);
    Ok(())
}

fn participants_update(store: &Store, payload: &Value) -> Result<(), HermesError> {
    let group = payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| HermesError::Store("group-participants.update without group id".into()))?;
    let action = payload
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| HermesError::Store("group-participants.update without action".into()))?;
    let participants: Vec<String> = payload
        .get("participants")
        .and_then(Value::as_array)
        .ok_or_else(|| HermesError::Store("group-participants.update without participants".into()))?
        .iter()
        .filter_map(|p| match p {
            Value::String(id) => Some(id.clone()),
            Value::Object(o) => str_field(o, "id").map(str::to_string),
            _ => None,
        })
        .collect();

    store.update_participants(group, &participants, action);
    Ok(())
}

fn call(store: &Store, payload: &Value) -> Result<(), HermesError> {
    for offer in records(payload, "calls")? {
        let Some(record) = offer.as_object() else {
            continue;
        };
        let Some(peer) = call_peer(record) else {
            debug!("store: skipping call event without peer");
            continue;
        };
        match str_field(record, "status") {
            Some("offer") | Some("ringing") => store.set_call_offer(peer, record.clone()),
            Some("timeout") | Some("reject") | Some("accept") | Some("terminate") => {
                store.clear_call_offer(peer);
            }
            other => debug!("store: ignoring call status {other:?}"),
        }
    }
    Ok(())
}

fn call_peer(record: &Record) -> Option<&str> {
    str_field(record, "from").or_else(|| str_field(record, "chatId"))
}
