//! App-state sync keys, collection versions, and mutation MACs.

use async_trait::async_trait;
use hermes_auth::KeyKind;
use serde::{Deserialize, Serialize};
use wacore::appstate::hash::HashState;
use wacore::appstate::processor::AppStateMutationMAC;
use wacore::store::traits::{AppStateSyncKey, AppSyncStore};

use super::{hex, scoped, AuthBackedStore, Result};

#[derive(Serialize, Deserialize)]
struct SyncKeyRecord {
    key_data: Vec<u8>,
    timestamp: i64,
    #[serde(default)]
    fingerprint: Vec<u8>,
}

#[async_trait]
impl AppSyncStore for AuthBackedStore {
    async fn get_sync_key(&self, key_id: &[u8]) -> Result<Option<AppStateSyncKey>> {
        let record: Option<SyncKeyRecord> =
            self.get_json(KeyKind::AppStateSyncKey, &hex(key_id))?;
        Ok(record.map(|r| AppStateSyncKey {
            key_data: r.key_data,
            timestamp: r.timestamp,
            fingerprint: r.fingerprint,
        }))
    }

    async fn set_sync_key(&self, key_id: &[u8], key: AppStateSyncKey) -> Result<()> {
        let record = SyncKeyRecord {
            key_data: key.key_data,
            timestamp: key.timestamp,
            fingerprint: key.fingerprint,
        };
        self.put_json(KeyKind::AppStateSyncKey, &hex(key_id), &record)
    }

    async fn get_version(&self, name: &str) -> Result<HashState> {
        Ok(self
            .get_json(KeyKind::AppStateVersion, name)?
            .unwrap_or_default())
    }

    async fn set_version(&self, name: &str, state: HashState) -> Result<()> {
        self.put_json(KeyKind::AppStateVersion, name, &state)
    }

    async fn put_mutation_macs(
        &self,
        name: &str,
        _version: u64,
        mutations: &[AppStateMutationMAC],
    ) -> Result<()> {
        self.auth.set_keys(
            KeyKind::AppStateMac,
            mutations
                .iter()
                .map(|m| (scoped(name, &hex(&m.index_mac)), m.value_mac.clone())),
        );
        Ok(())
    }

    async fn get_mutation_mac(&self, name: &str, index_mac: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self
            .auth
            .get_key(KeyKind::AppStateMac, &scoped(name, &hex(index_mac))))
    }

    async fn delete_mutation_macs(&self, name: &str, index_macs: &[Vec<u8>]) -> Result<()> {
        let ids: Vec<String> = index_macs
            .iter()
            .map(|mac| scoped(name, &hex(mac)))
            .collect();
        self.auth.delete_keys(KeyKind::AppStateMac, &ids);
        Ok(())
    }
}
