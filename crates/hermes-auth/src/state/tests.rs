use super::*;
use crate::persistence::{FileAuthStore, SqliteAuthStore};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Backend that keeps the document in memory and records every write.
#[derive(Default)]
struct MemoryBackend {
    document: Mutex<Option<String>>,
    writes: Mutex<Vec<String>>,
    removes: Mutex<usize>,
    fail_writes: bool,
}

impl MemoryBackend {
    fn with_document(document: &str) -> Self {
        Self {
            document: Mutex::new(Some(document.to_string())),
            ..Default::default()
        }
    }

    fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    fn last_write(&self) -> Value {
        let writes = self.writes.lock().unwrap();
        serde_json::from_str(writes.last().unwrap()).unwrap()
    }
}

#[async_trait]
impl AuthPersistence for MemoryBackend {
    fn describe(&self) -> String {
        "memory".into()
    }

    async fn read(&self) -> Result<Option<String>, HermesError> {
        Ok(self.document.lock().unwrap().clone())
    }

    async fn write(&self, document: &str) -> Result<(), HermesError> {
        if self.fail_writes {
            return Err(HermesError::Auth("backend offline".into()));
        }
        self.writes.lock().unwrap().push(document.to_string());
        *self.document.lock().unwrap() = Some(document.to_string());
        Ok(())
    }

    async fn remove(&self) -> Result<(), HermesError> {
        *self.removes.lock().unwrap() += 1;
        *self.document.lock().unwrap() = None;
        Ok(())
    }
}

const DEBOUNCE: Duration = Duration::from_secs(3);

fn auth_with(backend: Arc<MemoryBackend>) -> AuthState {
    AuthState::new(backend, DEBOUNCE)
}

#[tokio::test]
async fn test_load_empty_backend_creates_and_persists_creds() {
    let backend = Arc::new(MemoryBackend::default());
    let creds = auth_with(backend.clone()).load().await.unwrap();
    assert_eq!(backend.write_count(), 1);
    assert!(backend.last_write()["keys"].is_object());

    // A new handle over the same backend stands in for a new process.
    let again = auth_with(backend.clone()).load().await.unwrap();
    assert_eq!(again, creds);
    assert_eq!(backend.write_count(), 1);
}

#[tokio::test]
async fn test_load_is_idempotent_in_process() {
    let backend = Arc::new(MemoryBackend::default());
    let auth = auth_with(backend.clone());
    auth.load().await.unwrap();
    auth.set_key(KeyKind::PreKey, "1", vec![9]);

    // Reloading must not replace unflushed in-memory keys with the stored copy.
    auth.load().await.unwrap();
    assert_eq!(auth.get_key(KeyKind::PreKey, "1"), Some(vec![9]));
}

#[tokio::test]
async fn test_corrupt_document_is_replaced() {
    for stored in [
        "not json at all",
        r#"{"creds": {"registrationId": 1}}"#,
        r#"{"creds": null, "keys": {}}"#,
        r#"{"creds": {"registrationId": 0, "advSecretKey": ""}, "keys": {}}"#,
    ] {
        let backend = Arc::new(MemoryBackend::with_document(stored));
        let creds = auth_with(backend.clone()).load().await.unwrap();
        assert!(creds.is_valid(), "fresh creds for {stored}");
        assert_eq!(backend.write_count(), 1);
        assert_eq!(
            backend.last_write()["creds"]["registrationId"],
            creds.registration_id
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_save_creds_is_debounced() {
    let backend = Arc::new(MemoryBackend::default());
    let auth = auth_with(backend.clone());
    auth.load().await.unwrap();
    let baseline = backend.write_count();

    auth.update_creds(|c| c.me = Some("first@s.whatsapp.net".into()));
    tokio::time::sleep(Duration::from_secs(1)).await;
    auth.update_creds(|c| c.me = Some("second@s.whatsapp.net".into()));

    // Two seconds after the second call the re-armed timer has not fired.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.write_count(), baseline);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(backend.write_count(), baseline + 1);
    assert_eq!(backend.last_write()["creds"]["me"], "second@s.whatsapp.net");
}

#[tokio::test(start_paused = true)]
async fn test_flush_writes_immediately_and_cancels_timer() {
    let backend = Arc::new(MemoryBackend::default());
    let auth = auth_with(backend.clone());
    auth.load().await.unwrap();
    let baseline = backend.write_count();

    auth.set_key(KeyKind::Session, "peer.0", vec![1, 2]);
    auth.flush().await;
    assert_eq!(backend.write_count(), baseline + 1);

    tokio::time::sleep(DEBOUNCE * 2).await;
    assert_eq!(backend.write_count(), baseline + 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_cancels_pending_write() {
    let backend = Arc::new(MemoryBackend::default());
    let auth = auth_with(backend.clone());
    let before = auth.load().await.unwrap();
    let baseline = backend.write_count();

    auth.set_key(KeyKind::Identity, "peer", vec![7; 32]);
    auth.clear().await;
    tokio::time::sleep(DEBOUNCE * 2).await;

    assert_eq!(backend.write_count(), baseline);
    assert!(backend.document.lock().unwrap().is_none());
    assert_eq!(auth.key_count(), 0);

    // The next load starts a new session.
    let after = auth.load().await.unwrap();
    assert_ne!(after.adv_secret_key, before.adv_secret_key);
}

#[tokio::test]
async fn test_clear_without_session_is_safe() {
    let backend = Arc::new(MemoryBackend::default());
    let auth = auth_with(backend.clone());
    auth.clear().await;
    auth.clear().await;
    assert_eq!(*backend.removes.lock().unwrap(), 2);
    assert!(!auth.has_session().await.unwrap());
}

#[tokio::test]
async fn test_write_failure_keeps_memory_state() {
    let backend = Arc::new(MemoryBackend {
        fail_writes: true,
        ..Default::default()
    });
    let auth = auth_with(backend.clone());
    let creds = auth.load().await.unwrap();
    auth.set_key(KeyKind::PreKey, "5", vec![5]);
    auth.flush().await;

    assert_eq!(auth.creds(), creds);
    assert_eq!(auth.get_key(KeyKind::PreKey, "5"), Some(vec![5]));
}

#[tokio::test]
async fn test_key_operations() {
    let backend = Arc::new(MemoryBackend::default());
    let auth = auth_with(backend.clone());
    auth.load().await.unwrap();

    auth.set_keys(
        KeyKind::PreKey,
        [("1".to_string(), vec![1]), ("2".to_string(), vec![2])],
    );
    auth.set_key(KeyKind::SignedPreKey, "1", vec![10]);

    let found = auth.get_keys(KeyKind::PreKey, &["1".into(), "3".into()]);
    assert_eq!(found.len(), 1);
    assert_eq!(found["1"], vec![1]);

    let listed = auth.list_keys(KeyKind::PreKey);
    assert_eq!(listed, vec![("1".into(), vec![1]), ("2".into(), vec![2])]);
    assert_eq!(auth.list_keys(KeyKind::SignedPreKey).len(), 1);

    assert_eq!(auth.delete_keys(KeyKind::PreKey, &["1".into(), "9".into()]), 1);
    assert!(auth.get_key(KeyKind::PreKey, "1").is_none());

    auth.clear_keys();
    assert_eq!(auth.key_count(), 0);
}

#[tokio::test]
async fn test_keys_survive_restart() {
    let backend = Arc::new(MemoryBackend::default());
    let auth = auth_with(backend.clone());
    auth.load().await.unwrap();
    auth.set_key(KeyKind::SenderKey, "group::me", vec![0xde, 0xad]);
    auth.flush().await;

    let restored = auth_with(backend.clone());
    restored.load().await.unwrap();
    assert_eq!(
        restored.get_key(KeyKind::SenderKey, "group::me"),
        Some(vec![0xde, 0xad])
    );
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileAuthStore::for_session(dir.path(), "default"));
    let auth = AuthState::new(store.clone(), DEBOUNCE);
    let creds = auth.load().await.unwrap();
    assert!(dir.path().join("auth").join("default.json").exists());

    let restored = AuthState::new(store.clone(), DEBOUNCE);
    assert_eq!(restored.load().await.unwrap(), creds);

    restored.clear().await;
    assert!(!dir.path().join("auth").join("default.json").exists());
    restored.clear().await;
}

#[tokio::test]
async fn test_sqlite_store_upserts_one_row() {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap();
    let store = Arc::new(SqliteAuthStore::new(pool.clone(), "default").await.unwrap());

    let auth = AuthState::new(store.clone(), DEBOUNCE);
    let creds = auth.load().await.unwrap();
    auth.set_key(KeyKind::Identity, "peer", vec![1; 32]);
    auth.flush().await;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM auth_sessions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    let restored = AuthState::new(store.clone(), DEBOUNCE);
    assert_eq!(restored.load().await.unwrap(), creds);
    assert_eq!(restored.get_key(KeyKind::Identity, "peer"), Some(vec![1; 32]));

    restored.clear().await;
    assert!(!restored.has_session().await.unwrap());
}
