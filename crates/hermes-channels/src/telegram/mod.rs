//! Telegram mirror: forwards userbot activity to one Telegram chat.
//!
//! Reads the event bus and relays connection status changes, pairing QR
//! codes (as PNG photos), and incoming WhatsApp messages through the Bot
//! API. Every failure is logged and skipped; the mirror never affects the
//! WhatsApp side.
//! Docs: <https://core.telegram.org/bots/api>

mod format;
pub(crate) mod send;
pub(crate) mod types;

#[cfg(test)]
mod tests;

use crate::whatsapp::generate_qr_image;
use format::{incoming_messages, status_line};
use hermes_core::config::TelegramConfig;
use hermes_core::error::HermesError;
use hermes_core::event::BusEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::{TgResponse, TgUser};

const QR_CAPTION: &str = "Scan with WhatsApp (Linked devices) to pair Hermes";

/// Telegram Bot API client bound to the mirror chat.
pub struct TelegramMirror {
    config: TelegramConfig,
    client: reqwest::Client,
    base_url: String,
}

impl TelegramMirror {
    pub fn new(config: TelegramConfig) -> Self {
        let base_url = format!("https://api.telegram.org/bot{}", config.bot_token);
        Self {
            config,
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Check the token with `getMe`, returning the bot's username.
    pub async fn verify(&self) -> Result<String, HermesError> {
        let resp: TgResponse<TgUser> = self
            .client
            .get(format!("{}/getMe", self.base_url))
            .send()
            .await
            .map_err(|e| HermesError::Channel(format!("telegram getMe failed: {e}")))?
            .json()
            .await
            .map_err(|e| HermesError::Channel(format!("telegram getMe parse failed: {e}")))?;

        match resp.result {
            Some(user) if resp.ok => Ok(user.username.unwrap_or(user.first_name)),
            _ => Err(HermesError::Channel(format!(
                "telegram getMe rejected: {}",
                resp.description.unwrap_or_default()
            ))),
        }
    }

    /// Consume the bus until it closes.
    pub fn spawn(self, events: broadcast::Receiver<BusEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    async fn run(self, mut events: broadcast::Receiver<BusEvent>) {
        info!("telegram mirror started (chat {})", self.config.chat_id);
        loop {
            match events.recv().await {
                Ok(event) => self.forward(&event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("telegram mirror lagged, {skipped} events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("telegram mirror stopped");
    }

    async fn forward(&self, event: &BusEvent) {
        let chat_id = self.config.chat_id;
        match event {
            BusEvent::Connection(update) if self.config.mirror_status => {
                if let Some(line) = status_line(update) {
                    if let Err(e) = self.send_text(chat_id, &line).await {
                        warn!("telegram mirror: status send failed: {e}");
                    }
                }
            }
            BusEvent::Qr(code) if self.config.mirror_status => {
                let sent = match generate_qr_image(code) {
                    Ok(png) => self.send_photo_bytes(chat_id, &png, QR_CAPTION).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    warn!("telegram mirror: QR send failed: {e}");
                }
            }
            BusEvent::Protocol(event)
                if self.config.mirror_messages && event.name == "messages.upsert" =>
            {
                for text in incoming_messages(&event.payload) {
                    if let Err(e) = self.send_text(chat_id, &text).await {
                        warn!("telegram mirror: message send failed: {e}");
                    }
                }
            }
            _ => {}
        }
    }
}
