//! SKDM recipients, LID/PN mappings, base keys, device lists, and
//! forget-sender-key marks.

use async_trait::async_trait;
use hermes_auth::KeyKind;
use serde::{Deserialize, Serialize};
use wacore::store::error::StoreError;
use wacore::store::traits::{DeviceListRecord, LidPnMappingEntry, ProtocolStore};

use super::{scoped, AuthBackedStore, Result};

#[derive(Serialize, Deserialize)]
struct LidRecord {
    phone_number: String,
    created_at: i64,
    updated_at: i64,
    learning_source: String,
}

impl LidRecord {
    fn into_entry(self, lid: String) -> LidPnMappingEntry {
        LidPnMappingEntry {
            lid,
            phone_number: self.phone_number,
            created_at: self.created_at,
            updated_at: self.updated_at,
            learning_source: self.learning_source,
        }
    }
}

impl AuthBackedStore {
    /// A JSON string set stored under one id; missing reads as empty.
    fn get_set(&self, kind: KeyKind, id: &str) -> Result<Vec<String>> {
        Ok(self.get_json(kind, id)?.unwrap_or_default())
    }

    fn add_to_set(&self, kind: KeyKind, id: &str, members: &[String]) -> Result<()> {
        let mut set = self.get_set(kind, id)?;
        for member in members {
            if !set.contains(member) {
                set.push(member.clone());
            }
        }
        self.put_json(kind, id, &set)
    }

    fn lid_entries(&self) -> Result<Vec<LidPnMappingEntry>> {
        self.auth
            .list_keys(KeyKind::LidMapping)
            .into_iter()
            .map(|(lid, raw)| {
                serde_json::from_slice::<LidRecord>(&raw)
                    .map(|record| record.into_entry(lid))
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl ProtocolStore for AuthBackedStore {
    async fn get_skdm_recipients(&self, group_jid: &str) -> Result<Vec<String>> {
        self.get_set(KeyKind::Skdm, group_jid)
    }

    async fn add_skdm_recipients(&self, group_jid: &str, device_jids: &[String]) -> Result<()> {
        self.add_to_set(KeyKind::Skdm, group_jid, device_jids)
    }

    async fn clear_skdm_recipients(&self, group_jid: &str) -> Result<()> {
        self.delete(KeyKind::Skdm, group_jid);
        Ok(())
    }

    async fn get_lid_mapping(&self, lid: &str) -> Result<Option<LidPnMappingEntry>> {
        let record: Option<LidRecord> = self.get_json(KeyKind::LidMapping, lid)?;
        Ok(record.map(|r| r.into_entry(lid.to_string())))
    }

    async fn get_pn_mapping(&self, phone: &str) -> Result<Option<LidPnMappingEntry>> {
        Ok(self
            .lid_entries()?
            .into_iter()
            .find(|entry| entry.phone_number == phone))
    }

    async fn put_lid_mapping(&self, entry: &LidPnMappingEntry) -> Result<()> {
        let record = LidRecord {
            phone_number: entry.phone_number.clone(),
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            learning_source: entry.learning_source.clone(),
        };
        self.put_json(KeyKind::LidMapping, &entry.lid, &record)
    }

    async fn get_all_lid_mappings(&self) -> Result<Vec<LidPnMappingEntry>> {
        self.lid_entries()
    }

    async fn save_base_key(&self, address: &str, message_id: &str, base_key: &[u8]) -> Result<()> {
        self.auth.set_key(
            KeyKind::BaseKey,
            &scoped(address, message_id),
            base_key.to_vec(),
        );
        Ok(())
    }

    async fn has_same_base_key(
        &self,
        address: &str,
        message_id: &str,
        current_base_key: &[u8],
    ) -> Result<bool> {
        Ok(self
            .auth
            .get_key(KeyKind::BaseKey, &scoped(address, message_id))
            .is_some_and(|stored| stored == current_base_key))
    }

    async fn delete_base_key(&self, address: &str, message_id: &str) -> Result<()> {
        self.delete(KeyKind::BaseKey, &scoped(address, message_id));
        Ok(())
    }

    async fn update_device_list(&self, record: DeviceListRecord) -> Result<()> {
        let user = record.user.clone();
        self.put_json(KeyKind::DeviceList, &user, &record)
    }

    async fn get_devices(&self, user: &str) -> Result<Option<DeviceListRecord>> {
        self.get_json(KeyKind::DeviceList, user)
    }

    async fn mark_forget_sender_key(&self, group_jid: &str, participant: &str) -> Result<()> {
        self.add_to_set(
            KeyKind::ForgetSenderKey,
            group_jid,
            &[participant.to_string()],
        )
    }

    async fn consume_forget_marks(&self, group_jid: &str) -> Result<Vec<String>> {
        let marks = self.get_set(KeyKind::ForgetSenderKey, group_jid)?;
        self.delete(KeyKind::ForgetSenderKey, group_jid);
        Ok(marks)
    }
}
