//! Feeds new chat messages from the bus to the module registry.

use crate::command::parse_command;
use crate::registry::ModuleRegistry;
use hermes_core::config::ModulesConfig;
use hermes_core::error::HermesError;
use hermes_core::event::{BusEvent, ProtocolEvent};
use hermes_core::message::{Invocation, OutgoingMessage};
use hermes_core::traits::MessageSender;
use hermes_store::StoredMessage;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Routes `messages.upsert` commands to modules and sends their replies.
pub struct Dispatcher {
    registry: Arc<ModuleRegistry>,
    sender: Arc<dyn MessageSender>,
    config: ModulesConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        sender: Arc<dyn MessageSender>,
        config: ModulesConfig,
    ) -> Self {
        Self {
            registry,
            sender,
            config,
        }
    }

    /// Consume the bus until it closes.
    pub fn spawn(self, events: broadcast::Receiver<BusEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    async fn run(self, mut events: broadcast::Receiver<BusEvent>) {
        info!(
            "dispatcher listening (prefix '{}', {} modules)",
            self.config.prefix,
            self.registry.len()
        );
        loop {
            match events.recv().await {
                Ok(BusEvent::Protocol(event)) => {
                    self.dispatch(&event).await;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("dispatcher lagged, {skipped} events skipped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("dispatcher stopped");
    }

    /// Run every command in a `messages.upsert` event. Returns how many
    /// modules were invoked.
    ///
    /// History syncs (`type: "append"`) are not commands and are ignored.
    pub async fn dispatch(&self, event: &ProtocolEvent) -> usize {
        if event.name != "messages.upsert" {
            return 0;
        }
        if event.payload.get("type").and_then(Value::as_str) == Some("append") {
            return 0;
        }
        let records = event
            .payload
            .get("messages")
            .and_then(Value::as_array)
            .or_else(|| event.payload.as_array());
        let Some(records) = records else {
            warn!("dispatcher: malformed messages.upsert payload");
            return 0;
        };

        let mut invoked = 0;
        for message in records.iter().filter_map(StoredMessage::from_value) {
            if self.invoke(&message).await {
                invoked += 1;
            }
        }
        invoked
    }

    async fn invoke(&self, message: &StoredMessage) -> bool {
        let received_at = Instant::now();
        let Some(text) = message.text() else {
            return false;
        };
        let Some((command, args)) = parse_command(text, &self.config.prefix) else {
            return false;
        };
        let Some(module) = self.registry.get(&command) else {
            debug!("unknown command '{command}'");
            return false;
        };
        if !self.is_authorized(message) {
            debug!("ignoring '{command}' from unauthorized {}", message.sender());
            return false;
        }

        let invocation = Invocation {
            chat: message.key.remote_jid.clone(),
            sender: message.sender().to_string(),
            message_id: message.key.id.clone(),
            from_me: message.key.from_me,
            command,
            args,
            received_at,
        };
        info!(
            "running {} for {} in {}",
            module.name(),
            invocation.sender,
            invocation.chat
        );

        let reply = match module.handle(&invocation).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("module {} failed: {e}", module.name());
                Some(OutgoingMessage::text(format!(
                    "❌ {} failed: {e}",
                    module.name()
                )))
            }
        };
        if let Some(reply) = reply {
            self.reply(&invocation.chat, reply).await;
        }
        true
    }

    /// Send now, or queue for the next open connection if it is down.
    async fn reply(&self, chat: &str, reply: OutgoingMessage) {
        let e = match self.sender.send_message(chat, reply.clone()).await {
            Ok(_) => return,
            Err(e) => e,
        };
        if matches!(e, HermesError::Connection(_)) && self.sender.queue_message(chat, reply) {
            info!("reply to {chat} queued ({e})");
        } else {
            warn!("failed to reply to {chat}: {e}");
        }
    }

    /// Own messages always pass. With `self_only`, others need to be in
    /// `allowed_users` (matched by phone number).
    fn is_authorized(&self, message: &StoredMessage) -> bool {
        if message.key.from_me || !self.config.self_only {
            return true;
        }
        let phone = user_part(message.sender());
        self.config
            .allowed_users
            .iter()
            .any(|allowed| user_part(allowed) == phone)
    }
}

/// `5511999@s.whatsapp.net` and `5511999:3@s.whatsapp.net` → `5511999`.
fn user_part(jid: &str) -> &str {
    let user = jid.split('@').next().unwrap_or(jid);
    let user = user.split(':').next().unwrap_or(user);
    user.trim_start_matches('+')
}
