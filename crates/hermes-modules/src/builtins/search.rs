use async_trait::async_trait;
use hermes_core::error::HermesError;
use hermes_core::message::{Invocation, OutgoingMessage};
use hermes_core::traits::Module;
use hermes_store::Store;

/// How many matches a search reply lists.
pub const SEARCH_SHOWN: usize = 10;

/// Longest excerpt quoted per match, in characters.
const EXCERPT_CHARS: usize = 120;

/// Full-text search over the current chat's cached messages.
pub struct SearchModule {
    store: Store,
}

impl SearchModule {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn sender_name(&self, jid: &str) -> String {
        self.store
            .get_contact(jid)
            .map(|c| c.display_name().to_string())
            .unwrap_or_else(|| jid.split('@').next().unwrap_or(jid).to_string())
    }
}

#[async_trait]
impl Module for SearchModule {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Find messages in this chat containing the text"
    }

    fn usage(&self) -> &str {
        "<text>"
    }

    fn aliases(&self) -> &[&str] {
        &["find"]
    }

    async fn handle(
        &self,
        invocation: &Invocation,
    ) -> Result<Option<OutgoingMessage>, HermesError> {
        let query = invocation.args.as_str();
        if query.is_empty() {
            return Ok(Some(OutgoingMessage::text("Usage: search <text>")));
        }

        // The command message itself always matches.
        let matches: Vec<_> = self
            .store
            .search_messages(query, Some(&invocation.chat))
            .into_iter()
            .filter(|m| m.key.id != invocation.message_id)
            .collect();

        if matches.is_empty() {
            return Ok(Some(OutgoingMessage::text(format!(
                "No messages found for \"{query}\""
            ))));
        }

        let mut reply = format!("🔍 {} match(es) for \"{query}\"", matches.len());
        if matches.len() > SEARCH_SHOWN {
            reply.push_str(&format!(", showing the first {SEARCH_SHOWN}"));
        }
        reply.push('\n');
        for message in matches.iter().take(SEARCH_SHOWN) {
            let who = if message.key.from_me {
                "me".to_string()
            } else {
                self.sender_name(message.sender())
            };
            let excerpt: String = message.text().unwrap_or("").chars().take(EXCERPT_CHARS).collect();
            reply.push_str(&format!("\n• {who}: {excerpt}"));
        }
        Ok(Some(OutgoingMessage::text(reply)))
    }
}
