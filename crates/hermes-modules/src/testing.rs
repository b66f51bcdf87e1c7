//! Shared fakes for the crate's tests.

use async_trait::async_trait;
use hermes_core::error::HermesError;
use hermes_core::message::Invocation;
use hermes_store::{SnapshotBackend, Store, StoreSnapshot};
use std::sync::Arc;
use std::time::Instant;

struct NoSnapshot;

#[async_trait]
impl SnapshotBackend for NoSnapshot {
    fn describe(&self) -> String {
        "none".into()
    }

    async fn load(&self) -> Result<Option<StoreSnapshot>, HermesError> {
        Ok(None)
    }

    async fn save(&self, _snapshot: &StoreSnapshot) -> Result<(), HermesError> {
        Ok(())
    }
}

pub(crate) fn store() -> Store {
    Store::new(Arc::new(NoSnapshot))
}

pub(crate) fn invocation(chat: &str, command: &str, args: &str) -> Invocation {
    Invocation {
        chat: chat.to_string(),
        sender: chat.to_string(),
        message_id: "CMD".to_string(),
        from_me: true,
        command: command.to_string(),
        args: args.to_string(),
        received_at: Instant::now(),
    }
}
