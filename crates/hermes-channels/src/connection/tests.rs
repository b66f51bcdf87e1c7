use super::*;
use async_trait::async_trait;
use hermes_auth::AuthPersistence;
use hermes_core::config::WhatsAppConfig;
use hermes_core::event::{BusEvent, ConnectionState, DisconnectReason, ProtocolEvent};
use hermes_core::message::OutgoingMessage;
use hermes_core::traits::MessageSender;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

#[derive(Default)]
struct CountingAuthBackend {
    document: Mutex<Option<String>>,
    removes: AtomicUsize,
}

#[async_trait]
impl AuthPersistence for CountingAuthBackend {
    fn describe(&self) -> String {
        "test".into()
    }

    async fn read(&self) -> Result<Option<String>, HermesError> {
        Ok(self.document.lock().unwrap().clone())
    }

    async fn write(&self, document: &str) -> Result<(), HermesError> {
        *self.document.lock().unwrap() = Some(document.to_string());
        Ok(())
    }

    async fn remove(&self) -> Result<(), HermesError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        *self.document.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
struct FakeSocket {
    sent: Mutex<Vec<(String, String)>>,
    presence: AtomicUsize,
    closes: AtomicUsize,
}

#[async_trait]
impl Socket for FakeSocket {
    async fn send_text(&self, to: &str, text: &str) -> Result<String, HermesError> {
        let mut sent = self.sent.lock().unwrap();
        sent.push((to.to_string(), text.to_string()));
        Ok(format!("MSG{}", sent.len()))
    }

    async fn announce_presence(&self) -> Result<(), HermesError> {
        self.presence.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Each `connect` plays the next script of events, then stays silent.
#[derive(Default)]
struct ScriptedFactory {
    scripts: Mutex<VecDeque<Vec<SocketEvent>>>,
    sockets: Mutex<Vec<Arc<FakeSocket>>>,
    // Keeps event channels open so silence is not read as a drop.
    senders: Mutex<Vec<tokio::sync::mpsc::Sender<SocketEvent>>>,
    connects: AtomicUsize,
    // The next `connect` call never returns.
    stall_next: AtomicBool,
}

impl ScriptedFactory {
    fn new(scripts: Vec<Vec<SocketEvent>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        })
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    fn socket(&self, index: usize) -> Arc<FakeSocket> {
        self.sockets.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl SocketFactory for ScriptedFactory {
    async fn connect(&self, _auth: AuthState) -> Result<SocketConnection, HermesError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.stall_next.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        for event in script {
            tx.try_send(event).unwrap();
        }
        self.senders.lock().unwrap().push(tx);

        let socket = Arc::new(FakeSocket::default());
        self.sockets.lock().unwrap().push(socket.clone());
        Ok(SocketConnection {
            socket,
            events: rx,
        })
    }
}

struct Harness {
    factory: Arc<ScriptedFactory>,
    auth_backend: Arc<CountingAuthBackend>,
    handle: ConnectionHandle,
    bus: broadcast::Receiver<BusEvent>,
    shutdown: watch::Sender<bool>,
    run: tokio::task::JoinHandle<ConnectionOutcome>,
}

fn start(scripts: Vec<Vec<SocketEvent>>) -> Harness {
    start_with(ScriptedFactory::new(scripts))
}

fn start_with(factory: Arc<ScriptedFactory>) -> Harness {
    let auth_backend = Arc::new(CountingAuthBackend::default());
    let auth = AuthState::new(auth_backend.clone(), Duration::from_secs(3));
    let (bus_tx, bus) = broadcast::channel(64);
    let (shutdown, shutdown_rx) = watch::channel(false);

    let manager = ConnectionManager::new(
        factory.clone(),
        auth,
        bus_tx,
        &WhatsAppConfig::default(),
        shutdown_rx,
    );
    let handle = manager.handle();
    let run = tokio::spawn(manager.run());

    Harness {
        factory,
        auth_backend,
        handle,
        bus,
        shutdown,
        run,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_logged_out_clears_auth_once_and_never_reconnects() {
    let h = start(vec![vec![
        SocketEvent::Open,
        SocketEvent::Close(DisconnectReason::LoggedOut),
    ]]);

    let outcome = h.run.await.unwrap();
    assert_eq!(outcome, ConnectionOutcome::LoggedOut);
    assert_eq!(h.auth_backend.removes.load(Ordering::SeqCst), 1);
    assert!(h.auth_backend.document.lock().unwrap().is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.factory.connects(), 1);
    assert_eq!(h.handle.state(), ConnectionState::Closed);
    assert_eq!(h.factory.socket(0).closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_fatal_close_reconnects_after_fixed_delay() {
    let h = start(vec![
        vec![SocketEvent::Close(DisconnectReason::ConnectionLost)],
        vec![SocketEvent::Open],
    ]);

    settle().await;
    assert_eq!(h.factory.connects(), 1);
    assert_eq!(h.handle.state(), ConnectionState::Closed);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(h.factory.connects(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.factory.connects(), 2);
    assert_eq!(h.handle.state(), ConnectionState::Open);
    assert_eq!(h.factory.socket(1).presence.load(Ordering::SeqCst), 1);

    h.shutdown.send(true).unwrap();
    assert_eq!(h.run.await.unwrap(), ConnectionOutcome::ShutDown);
    assert_eq!(h.auth_backend.removes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_open_timeout_is_treated_as_close() {
    let h = start(vec![vec![], vec![SocketEvent::Open]]);

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(h.factory.connects(), 1);
    assert_eq!(h.handle.state(), ConnectionState::Connecting);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.handle.state(), ConnectionState::Closed);
    assert_eq!(h.factory.socket(0).closes.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.factory.connects(), 2);
    assert_eq!(h.handle.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_connect_that_never_returns_times_out() {
    let factory = ScriptedFactory::new(vec![vec![SocketEvent::Open]]);
    factory.stall_next.store(true, Ordering::SeqCst);
    let h = start_with(factory);

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(h.factory.connects(), 1);
    assert_eq!(h.handle.state(), ConnectionState::Connecting);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(h.handle.state(), ConnectionState::Closed);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.factory.connects(), 2);
    assert_eq!(h.handle.state(), ConnectionState::Open);
    assert_eq!(h.auth_backend.removes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_open_connection_does_not_time_out() {
    let h = start(vec![vec![SocketEvent::Open]]);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.factory.connects(), 1);
    assert_eq!(h.handle.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_reconnect() {
    let h = start(vec![vec![SocketEvent::Close(DisconnectReason::ConnectionReplaced)]]);

    tokio::time::sleep(Duration::from_secs(1)).await;
    h.shutdown.send(true).unwrap();
    assert_eq!(h.run.await.unwrap(), ConnectionOutcome::ShutDown);
    assert_eq!(h.handle.state(), ConnectionState::ShuttingDown);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.factory.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_open_closes_socket_and_flushes_auth() {
    let h = start(vec![vec![SocketEvent::Open, SocketEvent::CredsUpdated]]);
    settle().await;
    assert_eq!(h.handle.state(), ConnectionState::Open);

    h.shutdown.send(true).unwrap();
    assert_eq!(h.run.await.unwrap(), ConnectionOutcome::ShutDown);
    assert!(h.factory.socket(0).closes.load(Ordering::SeqCst) >= 1);
    assert!(h.auth_backend.document.lock().unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_send_requires_open_connection() {
    let h = start(vec![vec![]]);
    settle().await;

    let err = h
        .handle
        .send_message("123@s.whatsapp.net", OutgoingMessage::text("hi"))
        .await;
    assert!(err.is_err());
    h.shutdown.send(true).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_send_goes_through_open_socket() {
    let h = start(vec![vec![SocketEvent::Open]]);
    settle().await;

    let id = h
        .handle
        .send_message("123@s.whatsapp.net", OutgoingMessage::text("hi"))
        .await
        .unwrap();
    assert_eq!(id, "MSG1");
    assert_eq!(
        h.factory.socket(0).sent.lock().unwrap()[0],
        ("123@s.whatsapp.net".to_string(), "hi".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_queued_messages_flush_on_open() {
    let factory_events = vec![
        vec![SocketEvent::Close(DisconnectReason::ConnectionLost)],
        vec![SocketEvent::Open],
    ];
    let h = start(factory_events);
    h.handle
        .queue_message("a@s.whatsapp.net", OutgoingMessage::text("queued"));
    assert_eq!(h.handle.queued(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(h.handle.queued(), 0);
    let sent = h.factory.socket(1).sent.lock().unwrap().clone();
    assert_eq!(sent, vec![("a@s.whatsapp.net".to_string(), "queued".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_events_are_republished_on_bus() {
    let mut h = start(vec![vec![
        SocketEvent::Qr("2@abc".into()),
        SocketEvent::Open,
        SocketEvent::Data(ProtocolEvent::new("chats.upsert", serde_json::json!([]))),
    ]]);
    settle().await;

    let mut saw_qr = false;
    let mut saw_data = false;
    let mut states = Vec::new();
    while let Ok(event) = h.bus.try_recv() {
        match event {
            BusEvent::Qr(code) => saw_qr = code == "2@abc",
            BusEvent::Protocol(event) => saw_data = event.name == "chats.upsert",
            BusEvent::Connection(update) => states.push(update.state),
        }
    }
    assert!(saw_qr);
    assert!(saw_data);
    assert_eq!(states, vec![ConnectionState::Connecting, ConnectionState::Open]);
}
