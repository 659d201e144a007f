//! Named text slots backing the local cache.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;

/// Slot holding the ordered entry list.
pub const ENTRIES_SLOT: &str = "entries";
/// Slot holding the metadata cache.
pub const METADATA_SLOT: &str = "metadata";

/// `HUB_DB_PATH` value selecting [`MemorySlotStore`].
pub const MEMORY_DB_PATH: &str = ":memory:";

/// Durable key-value store of UTF-8 text blobs.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn read(&self, slot: &str) -> Result<Option<String>, AppError>;
    async fn write(&self, slot: &str, body: &str) -> Result<(), AppError>;
}

/// SQLite-backed slot store.
#[derive(Clone)]
pub struct SqliteSlotStore {
    pool: SqlitePool,
}

impl SqliteSlotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SlotStore for SqliteSlotStore {
    async fn read(&self, slot: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query("SELECT body FROM slots WHERE name = ?")
            .bind(slot)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("body")))
    }

    async fn write(&self, slot: &str, body: &str) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO slots (name, body, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(slot)
        .bind(body)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Process-local slot store, used when no database is wanted.
#[derive(Default)]
pub struct MemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn read(&self, slot: &str) -> Result<Option<String>, AppError> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| AppError::Storage("slot store poisoned".to_string()))?;
        Ok(slots.get(slot).cloned())
    }

    async fn write(&self, slot: &str, body: &str) -> Result<(), AppError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| AppError::Storage("slot store poisoned".to_string()))?;
        slots.insert(slot.to_string(), body.to_string());
        Ok(())
    }
}
