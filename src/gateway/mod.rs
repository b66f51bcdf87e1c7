//! Gateway: wires the store, auth state, connection and modules together
//! and runs them until shutdown.

mod backends;

pub use backends::Backends;

use hermes_auth::AuthState;
use hermes_channels::{ConnectionManager, ConnectionOutcome, TelegramMirror, WhatsAppFactory};
use hermes_core::config::Config;
use hermes_modules::{Dispatcher, ModuleRegistry};
use hermes_store::Store;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Capacity of the in-process event bus.
const BUS_CAPACITY: usize = 1024;

pub struct Gateway {
    config: Config,
    terminal_qr: bool,
}

impl Gateway {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            terminal_qr: true,
        }
    }

    pub fn with_terminal_qr(mut self, enabled: bool) -> Self {
        self.terminal_qr = enabled;
        self
    }

    /// Run until Ctrl-C or logout.
    pub async fn run(self) -> anyhow::Result<ConnectionOutcome> {
        let cfg = &self.config;
        let backends = Backends::open(cfg).await?;
        info!(
            "persistence: {} (auth at {})",
            cfg.persistence.backend.display_name(),
            backends.auth_location
        );

        let auth = AuthState::new(backends.auth, cfg.persistence.creds_debounce());
        let store = Store::new(backends.snapshot);
        store.load().await;
        store.start_autosave(cfg.persistence.store_flush_interval());

        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        let store_task = store.bind(bus.subscribe());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let factory = Arc::new(
            WhatsAppFactory::new(cfg.whatsapp.clone()).with_terminal_qr(self.terminal_qr),
        );
        let manager =
            ConnectionManager::new(factory, auth, bus.clone(), &cfg.whatsapp, shutdown_rx);
        let connection = manager.handle();

        let registry = ModuleRegistry::with_builtins(store.clone(), &cfg.modules)?;
        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            Arc::new(connection),
            cfg.modules.clone(),
        );
        let dispatch_task = dispatcher.spawn(bus.subscribe());

        let mirror_task = if cfg.telegram.enabled {
            let mirror = TelegramMirror::new(cfg.telegram.clone());
            match mirror.verify().await {
                Ok(bot) => info!("telegram mirror active as @{bot}"),
                Err(e) => warn!("telegram mirror: {e}"),
            }
            Some(mirror.spawn(bus.subscribe()))
        } else {
            None
        };

        let run = manager.run();
        tokio::pin!(run);
        let outcome = tokio::select! {
            outcome = &mut run => outcome,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("failed to listen for Ctrl-C, shutting down: {e}");
                }
                info!("received shutdown signal");
                let _ = shutdown_tx.send(true);
                run.await
            }
        };

        // Shutdown and logout both end the connection; stop the consumers
        // before the final store flush.
        dispatch_task.abort();
        if let Some(task) = mirror_task {
            task.abort();
        }
        store_task.abort();
        store.cleanup().await;

        info!("hermes stopped ({outcome:?})");
        Ok(outcome)
    }
}
