//! Session storage for `whatsapp-rust` on top of the auth key store.
//!
//! Implements the library's `Backend` traits (SignalStore + AppSyncStore +
//! ProtocolStore + DeviceStore) as typed views over [`AuthState`] keys, so
//! the whole session is persisted as one auth document by whichever
//! backend the auth state uses.

mod app_sync_store;
mod device_store;
mod protocol_store;
mod signal_store;


use hermes_auth::{AuthState, KeyKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wacore::store::error::StoreError;

type Result<T> = wacore::store::error::Result<T>;

/// WhatsApp session store backed by [`AuthState`].
pub struct AuthBackedStore {
    auth: AuthState,
}

impl AuthBackedStore {
    pub fn new(auth: AuthState) -> Self {
        Self { auth }
    }

    fn get_json<T: DeserializeOwned>(&self, kind: KeyKind, id: &str) -> Result<Option<T>> {
        match self.auth.get_key(kind, id) {
            Some(raw) => serde_json::from_slice(&raw)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, kind: KeyKind, id: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.auth.set_key(kind, id, raw);
        Ok(())
    }

    fn delete(&self, kind: KeyKind, id: &str) {
        self.auth.delete_keys(kind, &[id.to_string()]);
    }
}

/// Lowercase hex, for byte-string ids.
fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Id of an entry scoped to a parent (`{scope}:{id}`).
fn scoped(scope: &str, id: &str) -> String {
    format!("{scope}:{id}")
}
