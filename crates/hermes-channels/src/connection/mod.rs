//! Lifecycle of the single logical protocol connection.
//!
//! The protocol library sits behind [`SocketFactory`] / [`Socket`]; the
//! [`ConnectionManager`] drives the state machine and re-publishes socket
//! events on the in-process bus.

mod manager;

#[cfg(test)]
mod tests;

pub use manager::{ConnectionHandle, ConnectionManager, ConnectionOutcome};

use async_trait::async_trait;
use hermes_auth::AuthState;
use hermes_core::error::HermesError;
use hermes_core::event::{DisconnectReason, ProtocolEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What an open socket reports.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Open,
    Close(DisconnectReason),
    /// Pairing QR payload.
    Qr(String),
    /// Credentials changed and should be persisted.
    CredsUpdated,
    Data(ProtocolEvent),
}

/// A live connection: the outbound half plus its event stream.
pub struct SocketConnection {
    pub socket: Arc<dyn Socket>,
    pub events: mpsc::Receiver<SocketEvent>,
}

/// Outbound side of one connection attempt.
#[async_trait]
pub trait Socket: Send + Sync {
    /// Send text to a chat, returning the protocol message id.
    async fn send_text(&self, to: &str, text: &str) -> Result<String, HermesError>;

    /// Mark the account as available.
    async fn announce_presence(&self) -> Result<(), HermesError>;

    /// Tear the connection down. Must be safe to call more than once.
    async fn close(&self);
}

/// Opens sockets using the given credentials.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    async fn connect(&self, auth: AuthState) -> Result<SocketConnection, HermesError>;
}
