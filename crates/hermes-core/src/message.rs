use serde::{Deserialize, Serialize};
use std::time::Instant;

/// An outgoing message handed to the connection layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A parsed command addressed to a module.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Chat the command was sent in; replies go here.
    pub chat: String,
    pub sender: String,
    pub message_id: String,
    pub from_me: bool,
    /// Command name as matched, lowercase.
    pub command: String,
    /// Everything after the command word, trimmed.
    pub args: String,
    /// When the dispatcher picked the message up.
    pub received_at: Instant,
}

/// Split a long message into chunks that respect a platform length limit.
///
/// Prefers breaking after a newline; never splits inside a UTF-8 character.
pub fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            // Limit smaller than one character: emit the character alone.
            end = start + text[start..].chars().next().map_or(1, char::len_utf8);
        }
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}
