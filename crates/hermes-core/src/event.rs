//! Protocol event model shared by the connection layer, the store, and the
//! dispatcher.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A named data event emitted by the protocol layer (`"messages.upsert"`,
/// `"contacts.update"`, ...). The payload shape depends on the name and is
/// not trusted to be complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolEvent {
    pub name: String,
    pub payload: Value,
}

impl ProtocolEvent {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Identity of a chat message: the pair (chat id, message id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: String,
    pub id: String,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

impl MessageKey {
    pub fn new(remote_jid: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            remote_jid: remote_jid.into(),
            id: id.into(),
            from_me: false,
            participant: None,
        }
    }
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// The account unlinked this device. Terminal: needs a new pairing.
    LoggedOut,
    ConnectionLost,
    /// Another client took over the session.
    ConnectionReplaced,
    /// The attempt never reached `Open` in time.
    TimedOut,
    Other(String),
}

impl DisconnectReason {
    /// Whether reconnecting is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggedOut => write!(f, "logged out"),
            Self::ConnectionLost => write!(f, "connection lost"),
            Self::ConnectionReplaced => write!(f, "connection replaced"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Lifecycle state of the single logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closed,
    ShuttingDown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::ShuttingDown => "shutting down",
        };
        f.write_str(s)
    }
}

/// A state transition, with the close reason when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUpdate {
    pub state: ConnectionState,
    pub reason: Option<DisconnectReason>,
}

/// Everything published on the in-process event bus.
#[derive(Debug, Clone)]
pub enum BusEvent {
    Protocol(ProtocolEvent),
    Connection(ConnectionUpdate),
    /// Pairing QR payload; rotates every ~20 seconds until scanned.
    Qr(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_logged_out_is_fatal() {
        assert!(DisconnectReason::LoggedOut.is_fatal());
        assert!(!DisconnectReason::ConnectionLost.is_fatal());
        assert!(!DisconnectReason::ConnectionReplaced.is_fatal());
        assert!(!DisconnectReason::TimedOut.is_fatal());
        assert!(!DisconnectReason::Other("stream error".into()).is_fatal());
    }

    #[test]
    fn test_message_key_wire_names() {
        let key: MessageKey =
            serde_json::from_value(serde_json::json!({"remoteJid": "c@g.us", "id": "m1"}))
                .unwrap();
        assert_eq!(key, MessageKey::new("c@g.us", "m1"));
        let back = serde_json::to_value(&key).unwrap();
        assert_eq!(back["remoteJid"], "c@g.us");
        assert_eq!(back["fromMe"], false);
        assert!(back.get("participant").is_none());
    }
}
