//! The synchronized entity cache.
//!
//! Split into focused submodules:
//! - `state`: raw maps, ordered message lists, merge rules
//! - `entities`: typed read views
//! - `events`: event-name subscription table and `bind`

mod entities;
mod events;
mod state;


pub use entities::{
    message_text, CallOffer, Chat, Contact, GroupMetadata, GroupParticipant, Presence,
    StoredMessage,
};
pub use events::subscribed_events;
pub use state::{EntityKind, MessageList, Record, StoreState};

use crate::snapshot::{SnapshotBackend, StoreSnapshot};
use hermes_core::error::HermesError;
use serde_json::Value;
use state::{id_target, merge_fields, message_key, message_target, record_id};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Upper bound on full-text search results.
pub const SEARCH_LIMIT: usize = 100;

/// In-memory cache of protocol entities with periodic snapshotting.
///
/// Cheap to clone; all clones share one state. Mutation only happens through
/// the methods below.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    state: RwLock<StoreState>,
    backend: Arc<dyn SnapshotBackend>,
    autosave: Mutex<Option<JoinHandle<()>>>,
}

impl Store {
    /// Create an empty store persisting through `backend`.
    pub fn new(backend: Arc<dyn SnapshotBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(StoreState::default()),
                backend,
                autosave: Mutex::new(None),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.inner.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.inner.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // --- Mutations ---

    /// Merge `record` into the entry it identifies, creating it if absent.
    ///
    /// Records without an identifier are logged and dropped. Returns whether
    /// the record was applied.
    pub fn upsert(&self, kind: EntityKind, record: Value) -> bool {
        let Value::Object(record) = record else {
            warn!("store: dropping non-object {kind} upsert");
            return false;
        };

        let mut state = self.write();
        if kind == EntityKind::Message {
            let Some((chat, id)) = message_key(&record) else {
                warn!("store: dropping message upsert without key.remoteJid/key.id");
                return false;
            };
            state
                .messages
                .entry(chat.to_string())
                .or_default()
                .upsert(id, &record);
            return true;
        }

        let Some(id) = record_id(&record) else {
            warn!("store: dropping {kind} upsert without id");
            return false;
        };
        let map = keyed_map(&mut state, kind);
        match map.get_mut(id) {
            Some(existing) => merge_fields(existing, &record),
            None => {
                map.insert(id.to_string(), record.clone());
            }
        }
        true
    }

    /// Apply partial patches to existing entries. Patches for unknown ids are
    /// ignored. Returns how many were applied.
    ///
    /// Message patches use `{key, update: {...}}`; a patch without `update`
    /// merges its own fields.
    pub fn update(&self, kind: EntityKind, patches: &[Value]) -> usize {
        let mut state = self.write();
        let mut applied = 0;

        for patch in patches {
            let Some(patch) = patch.as_object() else {
                debug!("store: skipping non-object {kind} patch");
                continue;
            };

            let hit = if kind == EntityKind::Message {
                let Some((chat, id)) = message_key(patch) else {
                    debug!("store: skipping message patch without key");
                    continue;
                };
                let fields = match patch.get("update").and_then(Value::as_object) {
                    Some(update) => update.clone(),
                    None => {
                        let mut fields = patch.clone();
                        fields.remove("key");
                        fields
                    }
                };
                state
                    .messages
                    .get_mut(chat)
                    .is_some_and(|list| list.update(id, &fields))
            } else {
                let Some(id) = record_id(patch) else {
                    debug!("store: skipping {kind} patch without id");
                    continue;
                };
                match keyed_map(&mut state, kind).get_mut(id) {
                    Some(existing) => {
                        merge_fields(existing, patch);
                        true
                    }
                    None => false,
                }
            };

            if hit {
                applied += 1;
            }
        }
        applied
    }

    /// Remove entries. Targets are ids (or `{id}` objects); for messages they
    /// are message keys. Deleting a chat also drops its messages. Unknown
    /// targets are ignored. Returns how many entries were removed.
    pub fn delete(&self, kind: EntityKind, targets: &[Value]) -> usize {
        let mut state = self.write();
        let mut removed = 0;

        for target in targets {
            if kind == EntityKind::Message {
                let Some((chat, id)) = message_target(target) else {
                    debug!("store: skipping malformed message delete target");
                    continue;
                };
                if state
                    .messages
                    .get_mut(chat)
                    .is_some_and(|list| list.remove(id))
                {
                    removed += 1;
                }
                continue;
            }

            let Some(id) = id_target(target) else {
                debug!("store: skipping malformed {kind} delete target");
                continue;
            };
            if keyed_map(&mut state, kind).remove(id).is_some() {
                removed += 1;
            }
            if kind == EntityKind::Chat {
                state.messages.remove(id);
            }
        }
        removed
    }

    /// Drop every cached message of one chat, keeping the chat itself.
    pub fn clear_messages(&self, chat_id: &str) -> usize {
        self.write()
            .messages
            .remove(chat_id)
            .map_or(0, |list| list.len())
    }

    /// Replace group metadata wholesale.
    pub fn set_group_metadata(&self, record: Value) -> bool {
        let Value::Object(record) = record else {
            return false;
        };
        let Some(id) = record_id(&record).map(str::to_string) else {
            warn!("store: dropping group metadata without id");
            return false;
        };
        self.write().group_metadata.insert(id, record);
        true
    }

    /// Apply a roster change (`add`, `remove`, `promote`, `demote`) to a
    /// cached group. Unknown groups are left alone.
    pub fn update_participants(&self, group_id: &str, participants: &[String], action: &str) -> bool {
        let mut state = self.write();
        let Some(meta) = state.group_metadata.get_mut(group_id) else {
            return false;
        };

        let mut roster: Vec<Value> = meta
            .get("participants")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let is_target = |p: &Value| {
            p.get("id")
                .and_then(Value::as_str)
                .is_some_and(|id| participants.iter().any(|t| t == id))
        };

        match action {
            "add" => {
                for id in participants {
                    let present = roster
                        .iter()
                        .any(|p| p.get("id").and_then(Value::as_str) == Some(id.as_str()));
                    if !present {
                        roster.push(serde_json::json!({ "id": id, "admin": null }));
                    }
                }
            }
            "remove" => roster.retain(|p| !is_target(p)),
            "promote" | "demote" => {
                let admin = if action == "promote" {
                    Value::String("admin".into())
                } else {
                    Value::Null
                };
                for p in roster.iter_mut().filter(|p| is_target(p)) {
                    if let Some(obj) = p.as_object_mut() {
                        obj.insert("admin".into(), admin.clone());
                    }
                }
            }
            other => {
                debug!("store: ignoring unknown participant action '{other}'");
                return false;
            }
        }

        meta.insert("participants".into(), Value::Array(roster));
        true
    }

    /// Overwrite the presence of one participant in one chat.
    pub fn set_presence(&self, chat_id: &str, participant: &str, record: Record) {
        self.write()
            .presences
            .entry(chat_id.to_string())
            .or_default()
            .insert(participant.to_string(), record);
    }

    pub fn set_call_offer(&self, peer: &str, record: Record) {
        self.write().call_offer.insert(peer.to_string(), record);
    }

    pub fn clear_call_offer(&self, peer: &str) -> bool {
        self.write().call_offer.remove(peer).is_some()
    }

    // --- Queries ---

    pub fn get_contact(&self, id: &str) -> Option<Contact> {
        self.read()
            .contacts
            .get(id)
            .map(|r| Contact::from_record(id, r))
    }

    pub fn get_chat(&self, id: &str) -> Option<Chat> {
        self.read().chats.get(id).map(|r| Chat::from_record(id, r))
    }

    /// All chats, most recently active first.
    pub fn list_chats(&self) -> Vec<Chat> {
        let mut chats: Vec<Chat> = self
            .read()
            .chats
            .iter()
            .map(|(id, r)| Chat::from_record(id, r))
            .collect();
        chats.sort_by(|a, b| {
            b.conversation_timestamp
                .cmp(&a.conversation_timestamp)
                .then_with(|| a.id.cmp(&b.id))
        });
        chats
    }

    /// Messages of a chat in observation order.
    pub fn get_messages(&self, chat_id: &str) -> Vec<StoredMessage> {
        self.read()
            .messages
            .get(chat_id)
            .map(|list| list.iter().filter_map(StoredMessage::from_record).collect())
            .unwrap_or_default()
    }

    pub fn get_message(&self, chat_id: &str, message_id: &str) -> Option<StoredMessage> {
        self.read()
            .messages
            .get(chat_id)
            .and_then(|list| list.get(message_id))
            .and_then(StoredMessage::from_record)
    }

    pub fn message_count(&self, chat_id: &str) -> usize {
        self.read().messages.get(chat_id).map_or(0, MessageList::len)
    }

    /// Case-insensitive substring search over message bodies, in one chat or
    /// all of them, bounded to the first [`SEARCH_LIMIT`] matches.
    pub fn search_messages(&self, query: &str, chat_id: Option<&str>) -> Vec<StoredMessage> {
        let needle = query.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let state = self.read();
        let mut chat_ids: Vec<&String> = match chat_id {
            Some(id) => state.messages.keys().filter(|k| k.as_str() == id).collect(),
            None => state.messages.keys().collect(),
        };
        chat_ids.sort();

        chat_ids
            .into_iter()
            .filter_map(|id| state.messages.get(id))
            .flat_map(|list| list.iter())
            .filter_map(StoredMessage::from_record)
            .filter(|m| {
                m.text()
                    .is_some_and(|t| t.to_lowercase().contains(&needle))
            })
            .take(SEARCH_LIMIT)
            .collect()
    }

    pub fn get_group_metadata(&self, id: &str) -> Option<GroupMetadata> {
        self.read()
            .group_metadata
            .get(id)
            .map(|r| GroupMetadata::from_record(id, r))
    }

    pub fn get_presence(&self, chat_id: &str, participant: &str) -> Option<Presence> {
        self.read()
            .presences
            .get(chat_id)
            .and_then(|by_participant| by_participant.get(participant))
            .map(|r| Presence::from_record(participant, r))
    }

    pub fn call_offer(&self, peer: &str) -> Option<CallOffer> {
        self.read()
            .call_offer
            .get(peer)
            .map(|r| CallOffer::from_record(peer, r))
    }

    /// Copy of the full state, stamped with the current time.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            state: self.read().clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    // --- Persistence ---

    /// Restore the last snapshot. Any failure leaves the store empty.
    pub async fn load(&self) {
        match self.inner.backend.load().await {
            Ok(Some(snapshot)) => {
                let chats = snapshot.state.chats.len();
                let contacts = snapshot.state.contacts.len();
                *self.write() = snapshot.state;
                info!(
                    "store restored from {} ({chats} chats, {contacts} contacts)",
                    self.inner.backend.describe()
                );
            }
            Ok(None) => info!(
                "no store snapshot at {}, starting empty",
                self.inner.backend.describe()
            ),
            Err(e) => {
                warn!(
                    "store snapshot at {} unreadable, starting empty: {e}",
                    self.inner.backend.describe()
                );
                *self.write() = StoreState::default();
            }
        }
    }

    /// Persist a snapshot, propagating backend errors.
    pub async fn try_save(&self) -> Result<(), HermesError> {
        let snapshot = self.snapshot();
        self.inner.backend.save(&snapshot).await
    }

    /// Persist a snapshot; failures are logged and the in-memory state stays
    /// authoritative.
    pub async fn save(&self) {
        if let Err(e) = self.try_save().await {
            warn!("store save failed: {e}");
        }
    }

    /// Save every `period`. Replaces any previously running autosave timer.
    pub fn start_autosave(&self, period: Duration) {
        let mut slot = self.inner.autosave.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        let store = self.clone();
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                store.save().await;
            }
        }));
    }

    /// Stop the autosave timer and flush one last time.
    pub async fn cleanup(&self) {
        let handle = self
            .inner
            .autosave
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.save().await;
        info!("store flushed");
    }
}

fn keyed_map(state: &mut StoreState, kind: EntityKind) -> &mut std::collections::HashMap<String, Record> {
    match kind {
        EntityKind::Contact => &mut state.contacts,
        EntityKind::Chat => &mut state.chats,
        EntityKind::GroupMetadata => &mut state.group_metadata,
        // Messages are nested per chat and never reach here.
        EntityKind::Message => &mut state.chats,
    }
}
