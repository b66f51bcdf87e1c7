//! # hermes-auth
//!
//! Credentials and per-peer key material for the WhatsApp session, held in
//! memory and written to a file or a SQLite row behind a debounce timer.

pub mod creds;
pub mod keys;
pub mod persistence;
pub mod state;

pub use creds::AuthCreds;
pub use keys::KeyKind;
pub use persistence::{open_pool, AuthPersistence, FileAuthStore, SqliteAuthStore};
pub use state::AuthState;
