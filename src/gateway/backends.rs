//! Persistence backend selection.

use hermes_auth::{open_pool, AuthPersistence, FileAuthStore, SqliteAuthStore};
use hermes_core::config::{Config, PersistenceBackend};
use hermes_store::{FileSnapshot, SnapshotBackend, SqliteSnapshot};
use std::sync::Arc;

/// The auth document and store snapshot homes for the configured backend.
pub struct Backends {
    pub auth: Arc<dyn AuthPersistence>,
    pub snapshot: Arc<dyn SnapshotBackend>,
    pub auth_location: String,
}

impl Backends {
    /// Open the configured backend. A SQLite database that cannot be opened
    /// is an error; the file backend creates its directories lazily.
    pub async fn open(cfg: &Config) -> anyhow::Result<Self> {
        let session = &cfg.whatsapp.session_id;
        let (auth, snapshot): (Arc<dyn AuthPersistence>, Arc<dyn SnapshotBackend>) =
            match cfg.persistence.backend {
                PersistenceBackend::File => {
                    let data_dir = cfg.hermes.data_path("");
                    (
                        Arc::new(FileAuthStore::for_session(&data_dir, session)),
                        Arc::new(FileSnapshot::new(
                            data_dir.join("store").join(format!("{session}.json")),
                        )),
                    )
                }
                PersistenceBackend::Sqlite => {
                    let pool = open_pool(&cfg.persistence.db_path).await?;
                    (
                        Arc::new(SqliteAuthStore::new(pool.clone(), session.clone()).await?),
                        Arc::new(SqliteSnapshot::new(pool, session.clone()).await?),
                    )
                }
            };
        let auth_location = auth.describe();
        Ok(Self {
            auth,
            snapshot,
            auth_location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path, backend: PersistenceBackend) -> Config {
        let mut cfg = Config::default();
        cfg.hermes.data_dir = dir.display().to_string();
        cfg.persistence.backend = backend;
        cfg.persistence.db_path = dir.join("hermes.db").display().to_string();
        cfg
    }

    #[tokio::test]
    async fn test_file_backend_paths() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(dir.path(), PersistenceBackend::File);
        let backends = Backends::open(&cfg).await.unwrap();

        let session = &cfg.whatsapp.session_id;
        assert!(backends
            .auth_location
            .ends_with(&format!("auth/{session}.json")));
        assert!(backends
            .snapshot
            .describe()
            .ends_with(&format!("store/{session}.json")));
        assert!(backends.auth.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_backend_shares_one_database() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config_in(dir.path(), PersistenceBackend::Sqlite);
        let backends = Backends::open(&cfg).await.unwrap();

        backends.auth.write("{}").await.unwrap();
        assert_eq!(backends.auth.read().await.unwrap().as_deref(), Some("{}"));
        assert!(backends.snapshot.load().await.unwrap().is_none());
        assert!(dir.path().join("hermes.db").exists());
    }

    #[tokio::test]
    async fn test_unopenable_sqlite_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let mut cfg = config_in(dir.path(), PersistenceBackend::Sqlite);
        cfg.persistence.db_path = blocker.join("hermes.db").display().to_string();
        assert!(Backends::open(&cfg).await.is_err());
    }
}
