//! Device identity, kept in the credentials as a bincode blob.

use async_trait::async_trait;
use wacore::store::error::StoreError;
use wacore::store::traits::DeviceStore;
use wacore::store::Device;

use super::{AuthBackedStore, Result};

#[async_trait]
impl DeviceStore for AuthBackedStore {
    async fn save(&self, device: &Device) -> Result<()> {
        // Device's key serde needs a binary format; serde_json can't read it back.
        let data =
            bincode::serialize(device).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.auth.update_creds(|creds| creds.set_device_blob(&data));
        Ok(())
    }

    async fn load(&self) -> Result<Option<Device>> {
        match self.auth.creds().device_blob() {
            Some(data) => {
                let device = bincode::deserialize(&data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(device))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.auth.creds().device.is_some())
    }

    async fn create(&self) -> Result<i32> {
        // Single device per session; the data arrives through save().
        Ok(1)
    }
}
