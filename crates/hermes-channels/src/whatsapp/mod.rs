//! WhatsApp socket adapter over `whatsapp-rust`.
//!
//! Each connection attempt builds a fresh bot whose session storage is the
//! shared [`AuthState`], so credentials and keys live in one auth document.
//! Library events are translated into [`SocketEvent`]s.

mod events;
mod qr;
mod send;
mod socket;


pub use qr::{generate_qr_image, generate_qr_terminal};
pub use socket::WhatsAppSocket;

use crate::connection::{SocketConnection, SocketEvent, SocketFactory};
use crate::whatsapp_store::AuthBackedStore;
use async_trait::async_trait;
use hermes_auth::AuthState;
use hermes_core::{config::WhatsAppConfig, error::HermesError};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use whatsapp_rust::bot::Bot;
use whatsapp_rust::client::Client;
use whatsapp_rust_tokio_transport::TokioWebSocketTransportFactory;
use whatsapp_rust_ureq_http_client::UreqHttpClient;

/// Client slot shared by the event handler and the socket.
pub(crate) type ClientSlot = Arc<Mutex<Option<Arc<Client>>>>;

/// Builds WhatsApp connections.
pub struct WhatsAppFactory {
    config: WhatsAppConfig,
    /// Render pairing QR codes on stdout.
    print_qr: bool,
}

impl WhatsAppFactory {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            print_qr: true,
        }
    }

    pub fn with_terminal_qr(mut self, enabled: bool) -> Self {
        self.print_qr = enabled;
        self
    }
}

#[async_trait]
impl SocketFactory for WhatsAppFactory {
    async fn connect(&self, auth: AuthState) -> Result<SocketConnection, HermesError> {
        let (tx, rx) = mpsc::channel::<SocketEvent>(256);
        let client_slot: ClientSlot = Arc::new(Mutex::new(None));
        let backend = Arc::new(AuthBackedStore::new(auth));

        info!(
            "whatsapp connecting (session: {}, device: {})",
            self.config.session_id, self.config.device_name
        );

        let slot_for_event = client_slot.clone();
        let print_qr = self.print_qr;

        let mut bot = Bot::builder()
            .with_backend(backend)
            .with_transport_factory(TokioWebSocketTransportFactory::new())
            .with_http_client(UreqHttpClient::new())
            .with_device_props(
                Some(self.config.device_name.clone()),
                None,
                Some(waproto::whatsapp::device_props::PlatformType::Desktop),
            )
            .on_event(move |event, client| {
                let tx = tx.clone();
                let slot = slot_for_event.clone();
                async move {
                    events::handle_event(event, client, &tx, &slot, print_qr).await;
                }
            })
            .build()
            .await
            .map_err(|e| HermesError::Connection(format!("whatsapp bot build failed: {e}")))?;

        *client_slot.lock().await = Some(bot.client());

        let _handle = bot
            .run()
            .await
            .map_err(|e| HermesError::Connection(format!("whatsapp bot run failed: {e}")))?;

        Ok(SocketConnection {
            socket: Arc::new(WhatsAppSocket::new(client_slot)),
            events: rx,
        })
    }
}
