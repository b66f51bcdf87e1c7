//! Telegram Bot API deserialization types.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct TgResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TgUser {
    pub first_name: String,
    pub username: Option<String>,
}
