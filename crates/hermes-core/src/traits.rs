use crate::{
    error::HermesError,
    message::{Invocation, OutgoingMessage},
};
use async_trait::async_trait;

/// Outbound send contract exposed to command modules.
///
/// Implemented by the connection handle; `send_message` fails with
/// [`HermesError::Connection`] when no connection is open.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send `message` to a chat JID, returning the protocol message id.
    async fn send_message(&self, to: &str, message: OutgoingMessage)
        -> Result<String, HermesError>;

    /// Hold `message` until the connection next opens. Returns `false` when
    /// this sender has no queue.
    fn queue_message(&self, _to: &str, _message: OutgoingMessage) -> bool {
        false
    }
}

/// A chat command.
///
/// Registered under its name plus any aliases; the dispatcher invokes
/// `handle` for every message whose first word matches.
#[async_trait]
pub trait Module: Send + Sync {
    /// Primary command name, lowercase, without prefix.
    fn name(&self) -> &str;

    /// One-line summary shown by `help`.
    fn description(&self) -> &str;

    /// Argument synopsis, e.g. `<text>`.
    fn usage(&self) -> &str {
        ""
    }

    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// Run the command. `Ok(None)` means nothing to reply.
    async fn handle(&self, invocation: &Invocation)
        -> Result<Option<OutgoingMessage>, HermesError>;
}
