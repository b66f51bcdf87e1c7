//! Typed read-only views over cached records.
//!
//! Built leniently: a field with an unexpected type reads as absent, and the
//! full record stays available through `fields`.

use super::state::{flag_field, int_field, message_key, str_field, Record};
use hermes_core::event::MessageKey;
use serde_json::Value;

/// A known peer identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: String,
    /// Name from the address book.
    pub name: Option<String>,
    /// Push name chosen by the peer.
    pub notify: Option<String>,
    pub verified_name: Option<String>,
    pub img_url: Option<String>,
    pub fields: Record,
}

impl Contact {
    pub(crate) fn from_record(id: &str, record: &Record) -> Self {
        Self {
            id: id.to_string(),
            name: str_field(record, "name").map(str::to_string),
            notify: str_field(record, "notify").map(str::to_string),
            verified_name: str_field(record, "verifiedName").map(str::to_string),
            img_url: str_field(record, "imgUrl").map(str::to_string),
            fields: record.clone(),
        }
    }

    /// Best available human-readable name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.notify.as_deref())
            .or(self.verified_name.as_deref())
            .unwrap_or(&self.id)
    }
}

/// A conversation thread.
#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: String,
    pub name: Option<String>,
    pub unread_count: i64,
    /// Seconds since epoch of the last message.
    pub conversation_timestamp: Option<i64>,
    pub pinned: bool,
    pub archived: bool,
    pub fields: Record,
}

impl Chat {
    pub(crate) fn from_record(id: &str, record: &Record) -> Self {
        Self {
            id: id.to_string(),
            name: str_field(record, "name").map(str::to_string),
            unread_count: int_field(record, "unreadCount").unwrap_or(0),
            conversation_timestamp: int_field(record, "conversationTimestamp"),
            pinned: flag_field(record, "pinned") || flag_field(record, "pin"),
            archived: flag_field(record, "archived") || flag_field(record, "archive"),
            fields: record.clone(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.id.ends_with("@g.us")
    }
}

/// One cached chat message.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub key: MessageKey,
    pub push_name: Option<String>,
    /// Seconds since epoch.
    pub timestamp: Option<i64>,
    /// Delivery status (numeric ack level or a status name).
    pub status: Option<Value>,
    /// Content payload as received.
    pub message: Option<Value>,
    pub fields: Record,
}

impl StoredMessage {
    pub(crate) fn from_record(record: &Record) -> Option<Self> {
        let (chat, id) = message_key(record)?;
        let key_obj = record.get("key").and_then(Value::as_object);
        let key = MessageKey {
            remote_jid: chat.to_string(),
            id: id.to_string(),
            from_me: key_obj
                .and_then(|k| k.get("fromMe"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            participant: key_obj
                .and_then(|k| str_field(k, "participant"))
                .map(str::to_string),
        };
        Some(Self {
            key,
            push_name: str_field(record, "pushName").map(str::to_string),
            timestamp: int_field(record, "messageTimestamp"),
            status: record.get("status").cloned(),
            message: record.get("message").cloned(),
            fields: record.clone(),
        })
    }

    /// Typed view of a raw protocol message record (`{key, message, ...}`).
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().and_then(Self::from_record)
    }

    /// The sender: the participant in groups, the chat otherwise.
    pub fn sender(&self) -> &str {
        self.key
            .participant
            .as_deref()
            .unwrap_or(&self.key.remote_jid)
    }

    /// Human-readable body: plain text, extended text, or a media caption.
    ///
    /// Looks through ephemeral / view-once / device-sent wrappers. Records
    /// without a `message` payload fall back to a top-level `text` field.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(message_text)
            .or_else(|| self.fields.get("text").and_then(Value::as_str))
    }
}

/// Extract text from a message content payload.
pub fn message_text(content: &Value) -> Option<&str> {
    let obj = content.as_object()?;

    for wrapper in [
        "ephemeralMessage",
        "viewOnceMessage",
        "viewOnceMessageV2",
        "deviceSentMessage",
    ] {
        if let Some(inner) = obj.get(wrapper).and_then(|w| w.get("message")) {
            return message_text(inner);
        }
    }

    if let Some(text) = obj.get("conversation").and_then(Value::as_str) {
        return Some(text);
    }
    if let Some(text) = obj
        .get("extendedTextMessage")
        .and_then(|e| e.get("text"))
        .and_then(Value::as_str)
    {
        return Some(text);
    }
    ["imageMessage", "videoMessage", "documentMessage"]
        .iter()
        .find_map(|media| {
            obj.get(*media)
                .and_then(|m| m.get("caption"))
                .and_then(Value::as_str)
        })
}

/// One member of a group roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupParticipant {
    pub id: String,
    /// `"admin"`, `"superadmin"`, or `None` for regular members.
    pub admin: Option<String>,
}

/// Group roster and settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMetadata {
    pub id: String,
    pub subject: Option<String>,
    pub owner: Option<String>,
    pub participants: Vec<GroupParticipant>,
    /// Only admins can send messages.
    pub announce: bool,
    /// Only admins can edit group info.
    pub restrict: bool,
    pub fields: Record,
}

impl GroupMetadata {
    pub(crate) fn from_record(id: &str, record: &Record) -> Self {
        let participants = record
            .get("participants")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|p| {
                        let p = p.as_object()?;
                        Some(GroupParticipant {
                            id: str_field(p, "id")?.to_string(),
                            admin: str_field(p, "admin").map(str::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            id: id.to_string(),
            subject: str_field(record, "subject").map(str::to_string),
            owner: str_field(record, "owner").map(str::to_string),
            participants,
            announce: flag_field(record, "announce"),
            restrict: flag_field(record, "restrict"),
            fields: record.clone(),
        }
    }

    pub fn is_admin(&self, participant: &str) -> bool {
        self.participants
            .iter()
            .any(|p| p.id == participant && p.admin.is_some())
    }
}

/// Latest presence of one participant in one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    pub participant: String,
    /// `available`, `unavailable`, `composing`, `recording`, `paused`.
    pub last_known_presence: Option<String>,
    pub last_seen: Option<i64>,
}

impl Presence {
    pub(crate) fn from_record(participant: &str, record: &Record) -> Self {
        Self {
            participant: participant.to_string(),
            last_known_presence: str_field(record, "lastKnownPresence").map(str::to_string),
            last_seen: int_field(record, "lastSeen"),
        }
    }
}

/// A call signal that has not been resolved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOffer {
    pub peer: String,
    pub call_id: Option<String>,
    pub is_video: bool,
    pub is_group: bool,
    pub fields: Record,
}

impl CallOffer {
    pub(crate) fn from_record(peer: &str, record: &Record) -> Self {
        Self {
            peer: peer.to_string(),
            call_id: str_field(record, "id").map(str::to_string),
            is_video: flag_field(record, "isVideo"),
            is_group: flag_field(record, "isGroup"),
            fields: record.clone(),
        }
    }
}
