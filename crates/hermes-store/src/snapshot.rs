//! Whole-state checkpoints: a JSON file or one SQLite row.

use crate::store::StoreState;
use async_trait::async_trait;
use hermes_core::error::HermesError;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::PathBuf;

/// Serialized form of the whole store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(flatten)]
    pub state: StoreState,
    /// Milliseconds since epoch at capture time.
    #[serde(default)]
    pub timestamp: i64,
}

/// Where snapshots are kept.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// The last saved snapshot, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<StoreSnapshot>, HermesError>;

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), HermesError>;
}

/// Snapshot as a JSON file, replaced atomically on each save.
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl SnapshotBackend for FileSnapshot {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> Result<Option<StoreSnapshot>, HermesError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), HermesError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec(snapshot)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Snapshot as one row of `store_snapshots`, keyed by store id.
pub struct SqliteSnapshot {
    pool: SqlitePool,
    id: String,
}

impl SqliteSnapshot {
    /// Bind to `pool`, creating the table if needed.
    pub async fn new(pool: SqlitePool, id: impl Into<String>) -> Result<Self, HermesError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS store_snapshots (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                saved_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(&pool)
        .await
        .map_err(|e| HermesError::Store(format!("failed to create store_snapshots: {e}")))?;

        Ok(Self {
            pool,
            id: id.into(),
        })
    }
}

#[async_trait]
impl SnapshotBackend for SqliteSnapshot {
    fn describe(&self) -> String {
        format!("sqlite store_snapshots/{}", self.id)
    }

    async fn load(&self) -> Result<Option<StoreSnapshot>, HermesError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM store_snapshots WHERE id = ?")
            .bind(&self.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| HermesError::Store(format!("failed to read snapshot: {e}")))?;

        match row {
            Some((data,)) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), HermesError> {
        let data = serde_json::to_string(snapshot)?;
        sqlx::query(
            "INSERT INTO store_snapshots (id, data, saved_at) VALUES (?, ?, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, saved_at = excluded.saved_at",
        )
        .bind(&self.id)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| HermesError::Store(format!("failed to write snapshot: {e}")))?;
        Ok(())
    }
}
