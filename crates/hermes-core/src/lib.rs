//! # hermes-core
//!
//! Core types, traits, configuration, and error handling for the Hermes userbot.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod traits;

pub use config::shellexpand;
