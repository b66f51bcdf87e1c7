use super::defaults::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// WhatsApp connection config.
///
/// Pairing is done by scanning a QR code (like WhatsApp Web); the session
/// lives in the auth store selected by `[persistence]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Key of the auth document; one per paired account.
    #[serde(default = "default_session_id")]
    pub session_id: String,
    /// Name shown under "Linked devices" on the phone.
    #[serde(default = "default_device_name")]
    pub device_name: String,
    /// Fixed delay before every reconnect attempt.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    /// How long a connection attempt may take to reach `Open`.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl WhatsAppConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            session_id: default_session_id(),
            device_name: default_device_name(),
            reconnect_delay_secs: default_reconnect_delay(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Telegram mirror config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Prefer `HERMES_TELEGRAM_BOT_TOKEN` over putting the token in the file.
    #[serde(default)]
    pub bot_token: String,
    /// Chat that receives mirrored activity.
    #[serde(default)]
    pub chat_id: i64,
    /// Forward incoming WhatsApp messages.
    #[serde(default = "default_true")]
    pub mirror_messages: bool,
    /// Forward connection status changes and QR codes.
    #[serde(default = "default_true")]
    pub mirror_status: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: 0,
            mirror_messages: true,
            mirror_status: true,
        }
    }
}
