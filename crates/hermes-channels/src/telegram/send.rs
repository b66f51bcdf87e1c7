//! Message sending: text and photos.

use super::TelegramMirror;
use hermes_core::error::HermesError;
use hermes_core::message::split_message;
use tracing::warn;

/// Bot API text limit.
const MAX_TEXT_LEN: usize = 4096;

impl TelegramMirror {
    /// Send a text message, retrying a chunk as plain text when Telegram
    /// rejects its Markdown.
    pub(crate) async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), HermesError> {
        let url = format!("{}/sendMessage", self.base_url);

        for chunk in split_message(text, MAX_TEXT_LEN) {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
                "parse_mode": "Markdown",
            });

            let resp = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| HermesError::Channel(format!("telegram send failed: {e}")))?;

            let status = resp.status();
            if status.is_success() {
                continue;
            }

            let error_text = resp.text().await.unwrap_or_default();
            if !error_text.contains("can't parse entities") {
                return Err(HermesError::Channel(format!(
                    "telegram send failed ({status}): {error_text}"
                )));
            }

            warn!("markdown parse failed, retrying as plain text: {error_text}");
            let plain_body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            let plain_resp = self
                .client
                .post(&url)
                .json(&plain_body)
                .send()
                .await
                .map_err(|e| HermesError::Channel(format!("telegram send (plain) failed: {e}")))?;
            if !plain_resp.status().is_success() {
                let plain_err = plain_resp.text().await.unwrap_or_default();
                return Err(HermesError::Channel(format!(
                    "telegram send (plain fallback) failed: {plain_err}"
                )));
            }
        }

        Ok(())
    }

    /// Send a PNG with a caption.
    pub(crate) async fn send_photo_bytes(
        &self,
        chat_id: i64,
        image: &[u8],
        caption: &str,
    ) -> Result<(), HermesError> {
        let url = format!("{}/sendPhoto", self.base_url);

        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("qr.png")
            .mime_str("image/png")
            .map_err(|e| HermesError::Channel(format!("mime error: {e}")))?;

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", part);

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| HermesError::Channel(format!("telegram sendPhoto failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(HermesError::Channel(format!(
                "telegram sendPhoto failed ({status}): {error_text}"
            )));
        }

        Ok(())
    }
}
