//! Durable homes for the auth document.

use async_trait::async_trait;
use hermes_core::{error::HermesError, shellexpand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Stores one serialized auth document per session.
#[async_trait]
pub trait AuthPersistence: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// The stored document, or `None` when no session was ever saved.
    async fn read(&self) -> Result<Option<String>, HermesError>;

    /// Insert or replace the document.
    async fn write(&self, document: &str) -> Result<(), HermesError>;

    /// Delete the document. Succeeds when there is nothing to delete.
    async fn remove(&self) -> Result<(), HermesError>;
}

/// `{data_dir}/auth/{session_id}.json`.
pub struct FileAuthStore {
    path: PathBuf,
}

impl FileAuthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_session(data_dir: &Path, session_id: &str) -> Self {
        Self::new(data_dir.join("auth").join(format!("{session_id}.json")))
    }
}

#[async_trait]
impl AuthPersistence for FileAuthStore {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<Option<String>, HermesError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HermesError::Auth(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    async fn write(&self, document: &str) -> Result<(), HermesError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, document).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn remove(&self) -> Result<(), HermesError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// One row of `auth_sessions` per session id.
pub struct SqliteAuthStore {
    pool: SqlitePool,
    session_id: String,
}

impl SqliteAuthStore {
    /// Bind to `pool`, creating the table if needed.
    pub async fn new(pool: SqlitePool, session_id: impl Into<String>) -> Result<Self, HermesError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS auth_sessions (
                session_id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(&pool)
        .await
        .map_err(|e| HermesError::Auth(format!("failed to create auth_sessions: {e}")))?;

        Ok(Self {
            pool,
            session_id: session_id.into(),
        })
    }
}

#[async_trait]
impl AuthPersistence for SqliteAuthStore {
    fn describe(&self) -> String {
        format!("sqlite auth_sessions/{}", self.session_id)
    }

    async fn read(&self) -> Result<Option<String>, HermesError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM auth_sessions WHERE session_id = ?")
                .bind(&self.session_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| HermesError::Auth(format!("failed to read session: {e}")))?;
        Ok(row.map(|(document,)| document))
    }

    async fn write(&self, document: &str) -> Result<(), HermesError> {
        sqlx::query(
            "INSERT INTO auth_sessions (session_id, document, updated_at)
             VALUES (?, ?, datetime('now'))
             ON CONFLICT(session_id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at",
        )
        .bind(&self.session_id)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(|e| HermesError::Auth(format!("failed to write session: {e}")))?;
        Ok(())
    }

    async fn remove(&self) -> Result<(), HermesError> {
        sqlx::query("DELETE FROM auth_sessions WHERE session_id = ?")
            .bind(&self.session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| HermesError::Auth(format!("failed to delete session: {e}")))?;
        Ok(())
    }
}

/// Open (creating if needed) the SQLite database shared by the auth document
/// and the store snapshot.
///
/// Failure here is fatal to startup.
pub async fn open_pool(db_path: &str) -> Result<SqlitePool, HermesError> {
    let db_path = shellexpand(db_path);

    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| HermesError::Config(format!("failed to create data dir: {e}")))?;
    }

    let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
        .map_err(|e| HermesError::Config(format!("invalid db path: {e}")))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(opts)
        .await
        .map_err(|e| HermesError::Config(format!("failed to connect to sqlite: {e}")))?;

    info!("sqlite persistence opened at {db_path}");
    Ok(pool)
}
