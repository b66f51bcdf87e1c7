//! # hermes-store
//!
//! In-memory cache of protocol-observed entities (contacts, chats, messages,
//! presences, group metadata, call offers), kept in sync with the event bus
//! and checkpointed to a JSON file or a SQLite row.

pub mod snapshot;
pub mod store;

pub use snapshot::{FileSnapshot, SnapshotBackend, SqliteSnapshot, StoreSnapshot};
pub use store::{
    message_text, subscribed_events, CallOffer, Chat, Contact, EntityKind, GroupMetadata,
    GroupParticipant, Presence, Store, StoredMessage, SEARCH_LIMIT,
};
