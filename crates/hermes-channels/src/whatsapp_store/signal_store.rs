//! Identities, sessions, prekeys, signed prekeys, and sender keys.

use async_trait::async_trait;
use hermes_auth::KeyKind;
use wacore::store::traits::SignalStore;

use super::{AuthBackedStore, Result};

#[async_trait]
impl SignalStore for AuthBackedStore {
    async fn put_identity(&self, address: &str, key: [u8; 32]) -> Result<()> {
        self.auth.set_key(KeyKind::Identity, address, key.to_vec());
        Ok(())
    }

    async fn load_identity(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.auth.get_key(KeyKind::Identity, address))
    }

    async fn delete_identity(&self, address: &str) -> Result<()> {
        self.delete(KeyKind::Identity, address);
        Ok(())
    }

    async fn get_session(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.auth.get_key(KeyKind::Session, address))
    }

    async fn put_session(&self, address: &str, session: &[u8]) -> Result<()> {
        self.auth.set_key(KeyKind::Session, address, session.to_vec());
        Ok(())
    }

    async fn delete_session(&self, address: &str) -> Result<()> {
        self.delete(KeyKind::Session, address);
        Ok(())
    }

    // Upload state is tracked by the library; only the record is kept.
    async fn store_prekey(&self, id: u32, record: &[u8], _uploaded: bool) -> Result<()> {
        self.auth.set_key(KeyKind::PreKey, &id.to_string(), record.to_vec());
        Ok(())
    }

    async fn load_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        Ok(self.auth.get_key(KeyKind::PreKey, &id.to_string()))
    }

    async fn remove_prekey(&self, id: u32) -> Result<()> {
        self.delete(KeyKind::PreKey, &id.to_string());
        Ok(())
    }

    async fn store_signed_prekey(&self, id: u32, record: &[u8]) -> Result<()> {
        self.auth
            .set_key(KeyKind::SignedPreKey, &id.to_string(), record.to_vec());
        Ok(())
    }

    async fn load_signed_prekey(&self, id: u32) -> Result<Option<Vec<u8>>> {
        Ok(self.auth.get_key(KeyKind::SignedPreKey, &id.to_string()))
    }

    async fn load_all_signed_prekeys(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        Ok(self
            .auth
            .list_keys(KeyKind::SignedPreKey)
            .into_iter()
            .filter_map(|(id, record)| id.parse::<u32>().ok().map(|id| (id, record)))
            .collect())
    }

    async fn remove_signed_prekey(&self, id: u32) -> Result<()> {
        self.delete(KeyKind::SignedPreKey, &id.to_string());
        Ok(())
    }

    async fn put_sender_key(&self, address: &str, record: &[u8]) -> Result<()> {
        self.auth.set_key(KeyKind::SenderKey, address, record.to_vec());
        Ok(())
    }

    async fn get_sender_key(&self, address: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.auth.get_key(KeyKind::SenderKey, address))
    }

    async fn delete_sender_key(&self, address: &str) -> Result<()> {
        self.delete(KeyKind::SenderKey, address);
        Ok(())
    }
}
