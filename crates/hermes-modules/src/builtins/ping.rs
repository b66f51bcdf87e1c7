use async_trait::async_trait;
use hermes_core::error::HermesError;
use hermes_core::message::{Invocation, OutgoingMessage};
use hermes_core::traits::Module;

/// Liveness check; replies with the handling time.
pub struct PingModule;

#[async_trait]
impl Module for PingModule {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Check that the bot is alive"
    }

    async fn handle(
        &self,
        invocation: &Invocation,
    ) -> Result<Option<OutgoingMessage>, HermesError> {
        let elapsed = invocation.received_at.elapsed().as_millis();
        Ok(Some(OutgoingMessage::text(format!("🏓 pong ({elapsed} ms)"))))
    }
}
