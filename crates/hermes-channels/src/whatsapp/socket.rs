use super::send::{parse_jid, retry_send, MAX_TEXT_LEN};
use super::ClientSlot;
use crate::connection::Socket;
use async_trait::async_trait;
use hermes_core::{error::HermesError, message::split_message};
use tracing::{debug, info};

/// Outbound half of a WhatsApp connection.
pub struct WhatsAppSocket {
    client: ClientSlot,
}

impl WhatsAppSocket {
    pub(crate) fn new(client: ClientSlot) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Socket for WhatsAppSocket {
    /// Long text is sent as several messages; the id of the last is returned.
    async fn send_text(&self, to: &str, text: &str) -> Result<String, HermesError> {
        let client = self
            .client
            .lock()
            .await
            .clone()
            .ok_or_else(|| HermesError::Channel("whatsapp client not connected".into()))?;
        let jid = parse_jid(to)?;

        let mut last_id = String::new();
        for chunk in split_message(text, MAX_TEXT_LEN) {
            let msg = waproto::whatsapp::Message {
                conversation: Some(chunk.to_string()),
                ..Default::default()
            };
            last_id = retry_send(&client, &jid, msg).await?;
        }
        Ok(last_id)
    }

    // The client marks itself available as part of its connect handshake;
    // this only checks there is a client to speak for.
    async fn announce_presence(&self) -> Result<(), HermesError> {
        if self.client.lock().await.is_none() {
            return Err(HermesError::Channel("whatsapp client not connected".into()));
        }
        debug!("whatsapp presence: available");
        Ok(())
    }

    async fn close(&self) {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            client.disconnect().await;
            info!("whatsapp client disconnected");
        }
    }
}
