use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Registration ids are 14-bit and never zero.
const MAX_REGISTRATION_ID: u16 = 16380;

/// Session identity and pairing status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCreds {
    pub registration_id: u16,
    /// Base64, 32 bytes.
    pub adv_secret_key: String,
    /// Whether the device completed pairing.
    #[serde(default)]
    pub registered: bool,
    /// Own account JID once paired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Opaque protocol device record, base64.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Milliseconds since epoch.
    #[serde(default)]
    pub created_at: i64,
}

impl AuthCreds {
    /// A fresh, unpaired credential set.
    pub fn init() -> Self {
        let mut rng = rand::thread_rng();
        let secret: [u8; 32] = rng.gen();
        Self {
            registration_id: rng.gen_range(1..=MAX_REGISTRATION_ID),
            adv_secret_key: BASE64.encode(secret),
            registered: false,
            me: None,
            platform: None,
            device: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Decoded protocol device record, if any.
    pub fn device_blob(&self) -> Option<Vec<u8>> {
        self.device.as_deref().and_then(|d| BASE64.decode(d).ok())
    }

    pub fn set_device_blob(&mut self, blob: &[u8]) {
        self.device = Some(BASE64.encode(blob));
    }

    /// Minimal structural sanity.
    pub(crate) fn is_valid(&self) -> bool {
        self.registration_id != 0
            && BASE64
                .decode(&self.adv_secret_key)
                .is_ok_and(|secret| secret.len() == 32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_valid_and_unique() {
        let a = AuthCreds::init();
        let b = AuthCreds::init();
        assert!(a.is_valid());
        assert!(a.registration_id >= 1 && a.registration_id <= MAX_REGISTRATION_ID);
        assert!(!a.registered);
        assert_ne!(a.adv_secret_key, b.adv_secret_key);
    }

    #[test]
    fn test_device_blob_round_trip() {
        let mut creds = AuthCreds::init();
        assert!(creds.device_blob().is_none());
        creds.set_device_blob(&[1, 2, 3]);
        assert_eq!(creds.device_blob(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_bad_secret_is_invalid() {
        let mut creds = AuthCreds::init();
        creds.adv_secret_key = "short".into();
        assert!(!creds.is_valid());
    }
}
