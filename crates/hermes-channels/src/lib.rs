//! # hermes-channels
//!
//! The connection lifecycle and everything that talks to the outside world:
//! the WhatsApp socket adapter, its session storage over the auth key store,
//! and the optional Telegram mirror.

pub mod connection;
pub mod telegram;
pub mod whatsapp;
pub mod whatsapp_store;

pub use connection::{
    ConnectionHandle, ConnectionManager, ConnectionOutcome, Socket, SocketConnection, SocketEvent,
    SocketFactory,
};
pub use telegram::TelegramMirror;
pub use whatsapp::WhatsAppFactory;
pub use whatsapp_store::AuthBackedStore;
