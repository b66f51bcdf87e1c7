//! Outbound text with chunking and retry.

use hermes_core::error::HermesError;
use tracing::{error, warn};
use wacore_binary::jid::Jid;
use whatsapp_rust::client::Client;

/// WhatsApp rejects longer text bodies.
pub(super) const MAX_TEXT_LEN: usize = 4096;

/// Backoff between send attempts: 500ms, 1s, 2s.
pub(super) const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// Send one message, retrying with backoff. Returns the message id.
pub(super) async fn retry_send(
    client: &Client,
    jid: &Jid,
    msg: waproto::whatsapp::Message,
) -> Result<String, HermesError> {
    let mut last_err = None;

    for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
        match client.send_message(jid.clone(), msg.clone()).await {
            Ok(msg_id) => return Ok(msg_id),
            Err(e) => {
                let attempt_num = attempt + 1;
                if attempt_num < RETRY_DELAYS_MS.len() {
                    warn!(
                        "whatsapp send attempt {attempt_num}/{} failed: {e}, retrying in {delay_ms}ms",
                        RETRY_DELAYS_MS.len()
                    );
                    tokio::time::sleep(std::time::Duration::from_millis(*delay_ms)).await;
                } else {
                    error!(
                        "whatsapp send attempt {attempt_num}/{} failed: {e}, giving up",
                        RETRY_DELAYS_MS.len()
                    );
                }
                last_err = Some(e.to_string());
            }
        }
    }

    Err(HermesError::Channel(format!(
        "whatsapp send failed after {} attempts: {}",
        RETRY_DELAYS_MS.len(),
        last_err.unwrap_or_default()
    )))
}

/// Parse a chat address, accepting a bare phone number for 1:1 chats.
pub(super) fn parse_jid(to: &str) -> Result<Jid, HermesError> {
    let full = if to.contains('@') {
        to.to_string()
    } else {
        format!("{}@s.whatsapp.net", to.trim_start_matches('+'))
    };
    full.parse()
        .map_err(|e| HermesError::Channel(format!("invalid whatsapp JID '{to}': {e}")))
}
