//! Raw cache state and the per-field merge rules.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// A partial or complete entity as received from the protocol layer.
pub type Record = Map<String, Value>;

/// Entity families addressed by `upsert` / `update` / `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Contact,
    Chat,
    Message,
    GroupMetadata,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Contact => "contact",
            Self::Chat => "chat",
            Self::Message => "message",
            Self::GroupMetadata => "group metadata",
        };
        f.write_str(s)
    }
}

/// Everything the store owns. Serialized as the body of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    #[serde(default)]
    pub contacts: HashMap<String, Record>,
    #[serde(default)]
    pub chats: HashMap<String, Record>,
    /// chat id -> messages in observation order.
    #[serde(default)]
    pub messages: HashMap<String, MessageList>,
    /// chat id -> participant id -> latest presence.
    #[serde(default)]
    pub presences: HashMap<String, HashMap<String, Record>>,
    #[serde(default)]
    pub group_metadata: HashMap<String, Record>,
    /// peer id -> pending call offer.
    #[serde(default)]
    pub call_offer: HashMap<String, Record>,
    /// Opaque; carried through load/save untouched.
    #[serde(default)]
    pub auth_state: Option<Value>,
}

/// Messages of one chat, keyed by message id, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageList {
    order: Vec<String>,
    by_id: HashMap<String, Record>,
}

impl MessageList {
    /// Insert or merge. A merged message keeps its original position.
    pub fn upsert(&mut self, id: &str, record: &Record) {
        match self.by_id.get_mut(id) {
            Some(existing) => merge_fields(existing, record),
            None => {
                self.order.push(id.to_string());
                self.by_id.insert(id.to_string(), record.clone());
            }
        }
    }

    /// Merge into an existing message; returns false if it is unknown.
    pub fn update(&mut self, id: &str, patch: &Record) -> bool {
        match self.by_id.get_mut(id) {
            Some(existing) => {
                merge_fields(existing, patch);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        if self.by_id.remove(id).is_some() {
            self.order.retain(|m| m != id);
            true
        } else {
            false
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.by_id.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Serialize for MessageList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.order.len()))?;
        for id in &self.order {
            if let Some(record) = self.by_id.get(id) {
                map.serialize_entry(id, record)?;
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MessageList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ListVisitor;

        impl<'de> Visitor<'de> for ListVisitor {
            type Value = MessageList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of message id to message")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<MessageList, A::Error> {
                let mut list = MessageList::default();
                while let Some((id, record)) = access.next_entry::<String, Record>()? {
                    list.upsert(&id, &record);
                }
                Ok(list)
            }
        }

        deserializer.deserialize_map(ListVisitor)
    }
}

/// Per-field last-write-wins merge.
pub fn merge_fields(target: &mut Record, patch: &Record) {
    for (field, value) in patch {
        target.insert(field.clone(), value.clone());
    }
}

/// Non-empty string field.
pub fn str_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Integer field that may arrive as a number or a numeric string.
pub fn int_field(record: &Record, field: &str) -> Option<i64> {
    match record.get(field)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        Value::Object(o) => o.get("low").and_then(Value::as_i64),
        _ => None,
    }
}

/// Truthy flag: `true`, or a non-zero number (pin timestamps).
pub fn flag_field(record: &Record, field: &str) -> bool {
    match record.get(field) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// The `id` of a contact, chat, or group record.
pub fn record_id(record: &Record) -> Option<&str> {
    str_field(record, "id")
}

/// The (chat id, message id) of a message record.
pub fn message_key(record: &Record) -> Option<(&str, &str)> {
    let key = record.get("key").and_then(Value::as_object)?;
    Some((str_field(key, "remoteJid")?, str_field(key, "id")?))
}

/// Delete target for a message: `{key: {...}}` or a bare key object.
pub fn message_target(target: &Value) -> Option<(&str, &str)> {
    let obj = target.as_object()?;
    message_key(obj).or_else(|| Some((str_field(obj, "remoteJid")?, str_field(obj, "id")?)))
}

/// Delete target for a keyed entity: a bare id string or `{id: ...}`.
pub fn id_target(target: &Value) -> Option<&str> {
    match target {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Object(o) => record_id(o),
        _ => None,
    }
}
