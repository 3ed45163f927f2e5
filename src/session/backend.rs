//! Durable key/value storage behind the session cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::session::migrations;
use crate::session::slots::{Slot, SlotWrite};

/// Raw slot storage. Values are opaque serialized strings.
#[async_trait]
pub trait SlotBackend: Send + Sync {
    /// Every stored slot. Rows with unknown keys are skipped.
    async fn read_all(&self) -> Result<HashMap<Slot, String>, StoreError>;

    /// Apply a batch of writes atomically: all land or none do.
    async fn apply(&self, writes: &[SlotWrite]) -> Result<(), StoreError>;
}

/// libSQL-backed slot storage, local file or in-memory.
pub struct LibSqlSlotBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    // One batch at a time on the shared connection.
    write_lock: Mutex<()>,
}

impl LibSqlSlotBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Session database opened");
        Ok(backend)
    }

    /// In-memory database, gone when dropped.
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl SlotBackend for LibSqlSlotBackend {
    async fn read_all(&self) -> Result<HashMap<Slot, String>, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT slot, value FROM session_slots", ())
            .await
            .map_err(|e| StoreError::Query(format!("read_all: {e}")))?;

        let mut slots = HashMap::new();
        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => return Err(StoreError::Query(format!("read_all: {e}"))),
            };
            let key: String = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("read_all: {e}")))?;
            let value: String = row
                .get(1)
                .map_err(|e| StoreError::Query(format!("read_all: {e}")))?;
            match Slot::from_key(&key) {
                Some(slot) => {
                    slots.insert(slot, value);
                }
                None => debug!(key = %key, "Skipping unknown session slot"),
            }
        }
        Ok(slots)
    }

    async fn apply(&self, writes: &[SlotWrite]) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        let now = Utc::now().to_rfc3339();

        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| StoreError::Query(format!("begin: {e}")))?;

        for write in writes {
            let result = match write {
                SlotWrite::Put(slot, value) => {
                    tx.execute(
                        "INSERT INTO session_slots (slot, value, updated_at) VALUES (?1, ?2, ?3)
                         ON CONFLICT (slot) DO UPDATE SET value = ?2, updated_at = ?3",
                        params![slot.key(), value.as_str(), now.as_str()],
                    )
                    .await
                }
                SlotWrite::Delete(slot) => {
                    tx.execute(
                        "DELETE FROM session_slots WHERE slot = ?1",
                        params![slot.key()],
                    )
                    .await
                }
            };
            if let Err(e) = result {
                // Dropping the transaction rolls it back.
                return Err(StoreError::Query(format!("apply {write:?}: {e}")));
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Query(format!("commit: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_overwrites_and_delete_removes() {
        let backend = LibSqlSlotBackend::new_memory().await.unwrap();
        backend
            .apply(&[
                SlotWrite::Put(Slot::Identity, "{\"id\":1}".into()),
                SlotWrite::Put(Slot::Credential, "\"t1\"".into()),
            ])
            .await
            .unwrap();
        backend
            .apply(&[SlotWrite::Put(Slot::Credential, "\"t2\"".into())])
            .await
            .unwrap();

        let all = backend.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[&Slot::Credential], "\"t2\"");

        backend
            .apply(&[SlotWrite::Delete(Slot::Credential)])
            .await
            .unwrap();
        let all = backend.read_all().await.unwrap();
        assert!(!all.contains_key(&Slot::Credential));
        assert!(all.contains_key(&Slot::Identity));
    }

    #[tokio::test]
    async fn unknown_rows_are_ignored() {
        let backend = LibSqlSlotBackend::new_memory().await.unwrap();
        backend
            .conn
            .execute(
                "INSERT INTO session_slots (slot, value) VALUES ('legacy', 'x')",
                (),
            )
            .await
            .unwrap();
        assert!(backend.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.db");
        {
            let backend = LibSqlSlotBackend::new_local(&path).await.unwrap();
            backend
                .apply(&[SlotWrite::Put(Slot::Preferences, "{}".into())])
                .await
                .unwrap();
        }
        let backend = LibSqlSlotBackend::new_local(&path).await.unwrap();
        let all = backend.read_all().await.unwrap();
        assert_eq!(all.get(&Slot::Preferences).map(String::as_str), Some("{}"));
    }
}
