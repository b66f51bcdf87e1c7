//! Connection state machine: connect, observe, reconnect, shut down.

use super::{Socket, SocketConnection, SocketEvent, SocketFactory};
use async_trait::async_trait;
use hermes_auth::AuthState;
use hermes_core::config::WhatsAppConfig;
use hermes_core::error::HermesError;
use hermes_core::event::{BusEvent, ConnectionState, ConnectionUpdate, DisconnectReason};
use hermes_core::message::OutgoingMessage;
use hermes_core::traits::MessageSender;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How [`ConnectionManager::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Operator-requested shutdown.
    ShutDown,
    /// The session was unlinked; credentials have been cleared.
    LoggedOut,
}

/// How one connection attempt ended.
enum Attempt {
    Closed(DisconnectReason),
    Shutdown,
}

/// State shared between the manager and its handles.
struct Shared {
    state: watch::Sender<ConnectionState>,
    socket: Mutex<Option<Arc<dyn Socket>>>,
    queue: Mutex<VecDeque<(String, OutgoingMessage)>>,
}

impl Shared {
    fn current_socket(&self) -> Option<Arc<dyn Socket>> {
        self.socket.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_socket(&self, socket: Option<Arc<dyn Socket>>) {
        *self.socket.lock().unwrap_or_else(|e| e.into_inner()) = socket;
    }
}

/// Owns the connection lifecycle. Consumed by [`ConnectionManager::run`].
pub struct ConnectionManager {
    factory: Arc<dyn SocketFactory>,
    auth: AuthState,
    bus: broadcast::Sender<BusEvent>,
    shutdown: watch::Receiver<bool>,
    reconnect_delay: Duration,
    connect_timeout: Duration,
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        factory: Arc<dyn SocketFactory>,
        auth: AuthState,
        bus: broadcast::Sender<BusEvent>,
        config: &WhatsAppConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            factory,
            auth,
            bus,
            shutdown,
            reconnect_delay: config.reconnect_delay(),
            connect_timeout: config.connect_timeout(),
            shared: Arc::new(Shared {
                state,
                socket: Mutex::new(None),
                queue: Mutex::new(VecDeque::new()),
            }),
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            shared: self.shared.clone(),
        }
    }

    /// Run until shutdown or logout.
    ///
    /// Every non-fatal close, including an attempt that never opens within
    /// the timeout, is followed by exactly one reconnect after the fixed
    /// delay. Shutdown cancels a pending reconnect.
    pub async fn run(self) -> ConnectionOutcome {
        let mut shutdown = self.shutdown.clone();

        loop {
            if *shutdown.borrow() {
                return self.finish_shutdown().await;
            }

            let reason = match self.attempt().await {
                Attempt::Closed(reason) => reason,
                Attempt::Shutdown => return self.finish_shutdown().await,
            };
            self.set_state(ConnectionState::Closed, Some(reason.clone()));

            if reason.is_fatal() {
                error!("whatsapp session {reason}: clearing credentials, pair again to continue");
                self.auth.clear().await;
                return ConnectionOutcome::LoggedOut;
            }

            info!(
                "whatsapp connection closed ({reason}), reconnecting in {}s",
                self.reconnect_delay.as_secs()
            );
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = wait_for_shutdown(&mut shutdown) => {
                    debug!("pending reconnect cancelled by shutdown");
                    return self.finish_shutdown().await;
                }
            }
        }
    }

    /// One pass through Connecting (and Open, if reached).
    async fn attempt(&self) -> Attempt {
        let mut shutdown = self.shutdown.clone();
        self.set_state(ConnectionState::Connecting, None);

        if let Err(e) = self.auth.load().await {
            warn!("failed to load credentials: {e}");
            return Attempt::Closed(DisconnectReason::Other(e.to_string()));
        }

        // Covers both the connect call and the wait for Open.
        let deadline = Instant::now() + self.connect_timeout;

        let connected = tokio::select! {
            result = self.factory.connect(self.auth.clone()) => result,
            _ = tokio::time::sleep_until(deadline) => {
                warn!(
                    "whatsapp connect did not complete within {}s",
                    self.connect_timeout.as_secs()
                );
                return Attempt::Closed(DisconnectReason::TimedOut);
            }
            _ = wait_for_shutdown(&mut shutdown) => return Attempt::Shutdown,
        };
        let SocketConnection { socket, mut events } = match connected {
            Ok(connection) => connection,
            Err(e) => {
                warn!("whatsapp connect failed: {e}");
                return Attempt::Closed(DisconnectReason::Other(e.to_string()));
            }
        };

        let mut open = false;

        let outcome = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(SocketEvent::Open) => {
                        open = true;
                        self.on_open(&socket).await;
                    }
                    Some(SocketEvent::Close(reason)) => break Attempt::Closed(reason),
                    Some(SocketEvent::Qr(code)) => {
                        let _ = self.bus.send(BusEvent::Qr(code));
                    }
                    Some(SocketEvent::CredsUpdated) => self.auth.save_creds(),
                    Some(SocketEvent::Data(event)) => {
                        let _ = self.bus.send(BusEvent::Protocol(event));
                    }
                    None => break Attempt::Closed(DisconnectReason::ConnectionLost),
                },
                _ = tokio::time::sleep_until(deadline), if !open => {
                    warn!(
                        "whatsapp connection not open after {}s",
                        self.connect_timeout.as_secs()
                    );
                    break Attempt::Closed(DisconnectReason::TimedOut);
                }
                _ = wait_for_shutdown(&mut shutdown) => break Attempt::Shutdown,
            }
        };

        self.shared.set_socket(None);
        socket.close().await;
        outcome
    }

    /// Post-connect actions: presence, then the pending outbound queue.
    async fn on_open(&self, socket: &Arc<dyn Socket>) {
        self.shared.set_socket(Some(socket.clone()));
        self.set_state(ConnectionState::Open, None);

        if let Err(e) = socket.announce_presence().await {
            warn!("failed to announce presence: {e}");
        }

        let pending: Vec<(String, OutgoingMessage)> = self
            .shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        if !pending.is_empty() {
            info!("delivering {} queued messages", pending.len());
        }
        for (to, message) in pending {
            if let Err(e) = socket.send_text(&to, &message.text).await {
                warn!("failed to deliver queued message to {to}: {e}");
            }
        }
    }

    async fn finish_shutdown(&self) -> ConnectionOutcome {
        self.set_state(ConnectionState::ShuttingDown, None);
        if let Some(socket) = self.shared.current_socket() {
            socket.close().await;
        }
        self.shared.set_socket(None);
        self.auth.flush().await;
        info!("connection manager stopped");
        ConnectionOutcome::ShutDown
    }

    fn set_state(&self, state: ConnectionState, reason: Option<DisconnectReason>) {
        self.shared.state.send_replace(state);
        debug!("connection state: {state}");
        // No subscribers is fine.
        let _ = self
            .bus
            .send(BusEvent::Connection(ConnectionUpdate { state, reason }));
    }
}

/// Resolves once shutdown is requested or the signal's owner is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Cheap, cloneable view of the connection for senders and status checks.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn queued(&self) -> usize {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl MessageSender for ConnectionHandle {
    async fn send_message(
        &self,
        to: &str,
        message: OutgoingMessage,
    ) -> Result<String, HermesError> {
        let state = self.state();
        if state != ConnectionState::Open {
            return Err(HermesError::Connection(format!(
                "cannot send while connection is {state}"
            )));
        }
        let socket = self
            .shared
            .current_socket()
            .ok_or_else(|| HermesError::Connection("no open socket".into()))?;
        socket.send_text(to, &message.text).await
    }

    fn queue_message(&self, to: &str, message: OutgoingMessage) -> bool {
        self.shared
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back((to.to_string(), message));
        true
    }
}
