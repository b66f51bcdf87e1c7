//! The auth-state handle shared by the connection layer and the protocol
//! storage adapter.
//!
//! All mutation goes through explicit methods; every mutation re-arms one
//! owned debounce timer that writes the whole document when it fires.

#[cfg(test)]
mod tests;

use crate::creds::AuthCreds;
use crate::keys::KeyKind;
use crate::persistence::AuthPersistence;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hermes_core::error::HermesError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Persisted shape: `{ "creds": {...}, "keys": { "<kind>-<id>": "<base64>" } }`.
#[derive(Serialize, Deserialize)]
struct AuthDocument {
    creds: AuthCreds,
    keys: BTreeMap<String, String>,
}

struct AuthData {
    creds: AuthCreds,
    keys: BTreeMap<String, Vec<u8>>,
    loaded: bool,
}

impl AuthData {
    fn fresh() -> Self {
        Self {
            creds: AuthCreds::init(),
            keys: BTreeMap::new(),
            loaded: false,
        }
    }

    fn to_document(&self) -> Result<String, HermesError> {
        let document = AuthDocument {
            creds: self.creds.clone(),
            keys: self
                .keys
                .iter()
                .map(|(id, blob)| (id.clone(), BASE64.encode(blob)))
                .collect(),
        };
        Ok(serde_json::to_string(&document)?)
    }
}

/// Parse and sanity-check a stored document. `None` means corrupt.
fn parse_document(raw: &str) -> Option<(AuthCreds, BTreeMap<String, Vec<u8>>)> {
    let value: Value = serde_json::from_str(raw).ok()?;
    if !value.get("creds").is_some_and(Value::is_object)
        || !value.get("keys").is_some_and(Value::is_object)
    {
        return None;
    }
    let document: AuthDocument = serde_json::from_value(value).ok()?;
    if !document.creds.is_valid() {
        return None;
    }

    let mut keys = BTreeMap::new();
    for (id, encoded) in document.keys {
        keys.insert(id, BASE64.decode(encoded).ok()?);
    }
    Some((document.creds, keys))
}

/// Cloneable handle over one session's credentials and keys.
#[derive(Clone)]
pub struct AuthState {
    inner: Arc<Inner>,
}

struct Inner {
    data: RwLock<AuthData>,
    backend: Arc<dyn AuthPersistence>,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl AuthState {
    pub fn new(backend: Arc<dyn AuthPersistence>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                data: RwLock::new(AuthData::fresh()),
                backend,
                debounce,
                pending: Mutex::new(None),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AuthData> {
        self.inner.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthData> {
        self.inner.data.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Make the stored session current, or start a fresh one.
    ///
    /// A missing or structurally invalid document yields fresh credentials,
    /// written immediately. Once loaded, later calls return the in-memory
    /// state without touching the backend. Only a backend read failure is
    /// an error.
    pub async fn load(&self) -> Result<AuthCreds, HermesError> {
        if self.read().loaded {
            return Ok(self.creds());
        }

        let raw = self.inner.backend.read().await?;
        let restored = match raw.as_deref() {
            Some(raw) => {
                let parsed = parse_document(raw);
                if parsed.is_none() {
                    warn!(
                        "auth: stored session at {} is corrupt, starting fresh",
                        self.inner.backend.describe()
                    );
                }
                parsed
            }
            None => None,
        };

        match restored {
            Some((creds, keys)) => {
                let count = keys.len();
                let mut data = self.write();
                data.creds = creds;
                data.keys = keys;
                data.loaded = true;
                info!(
                    "auth: session restored from {} ({count} keys)",
                    self.inner.backend.describe()
                );
            }
            None => {
                {
                    let mut data = self.write();
                    *data = AuthData::fresh();
                    data.loaded = true;
                }
                info!("auth: no usable session, generated fresh credentials");
                self.flush().await;
            }
        }
        Ok(self.creds())
    }

    /// Whether the backend holds a session document.
    pub async fn has_session(&self) -> Result<bool, HermesError> {
        Ok(self.inner.backend.read().await?.is_some())
    }

    pub fn creds(&self) -> AuthCreds {
        self.read().creds.clone()
    }

    /// Mutate the credentials and schedule a save.
    pub fn update_creds<F>(&self, f: F)
    where
        F: FnOnce(&mut AuthCreds),
    {
        f(&mut self.write().creds);
        self.save_creds();
    }

    /// Schedule a debounced write of the current state.
    ///
    /// Re-arms the timer: a burst of calls within the window produces a
    /// single write carrying the latest state.
    pub fn save_creds(&self) {
        let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let state = self.clone();
        let delay = self.inner.debounce;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.write_document().await;
        }));
    }

    /// Write now, cancelling any pending debounced write.
    pub async fn flush(&self) {
        self.cancel_pending();
        self.write_document().await;
    }

    /// Delete the persisted session and reset to fresh, unsaved credentials.
    ///
    /// Safe to call when no session exists.
    pub async fn clear(&self) {
        self.cancel_pending();
        *self.write() = AuthData::fresh();
        match self.inner.backend.remove().await {
            Ok(()) => info!("auth: session at {} cleared", self.inner.backend.describe()),
            Err(e) => warn!("auth: failed to clear session: {e}"),
        }
    }

    fn cancel_pending(&self) {
        let pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = pending {
            handle.abort();
        }
    }

    async fn write_document(&self) {
        let document = match self.read().to_document() {
            Ok(document) => document,
            Err(e) => {
                warn!("auth: failed to serialize session: {e}");
                return;
            }
        };
        match self.inner.backend.write(&document).await {
            Ok(()) => debug!("auth: session written to {}", self.inner.backend.describe()),
            Err(e) => warn!("auth: failed to persist session: {e}"),
        }
    }

    // --- Keys ---

    /// Look up several keys; absent ids are left out of the result.
    pub fn get_keys(&self, kind: KeyKind, ids: &[String]) -> HashMap<String, Vec<u8>> {
        let data = self.read();
        ids.iter()
            .filter_map(|id| {
                data.keys
                    .get(&kind.key_id(id))
                    .map(|blob| (id.clone(), blob.clone()))
            })
            .collect()
    }

    pub fn get_key(&self, kind: KeyKind, id: &str) -> Option<Vec<u8>> {
        self.read().keys.get(&kind.key_id(id)).cloned()
    }

    /// Insert or replace keys and schedule a save.
    pub fn set_keys<I>(&self, kind: KeyKind, entries: I)
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        {
            let mut data = self.write();
            for (id, blob) in entries {
                data.keys.insert(kind.key_id(&id), blob);
            }
        }
        self.save_creds();
    }

    pub fn set_key(&self, kind: KeyKind, id: &str, blob: Vec<u8>) {
        self.set_keys(kind, [(id.to_string(), blob)]);
    }

    /// Remove keys and schedule a save. Returns how many existed.
    pub fn delete_keys(&self, kind: KeyKind, ids: &[String]) -> usize {
        let removed = {
            let mut data = self.write();
            ids.iter()
                .filter(|id| data.keys.remove(&kind.key_id(id)).is_some())
                .count()
        };
        if removed > 0 {
            self.save_creds();
        }
        removed
    }

    /// All keys of one kind, ordered by id.
    pub fn list_keys(&self, kind: KeyKind) -> Vec<(String, Vec<u8>)> {
        self.read()
            .keys
            .iter()
            .filter_map(|(flat, blob)| kind.strip(flat).map(|id| (id.to_string(), blob.clone())))
            .collect()
    }

    /// Drop every key, keeping the credentials.
    pub fn clear_keys(&self) {
        self.write().keys.clear();
        self.save_creds();
    }

    pub fn key_count(&self) -> usize {
        self.read().keys.len()
    }
}
