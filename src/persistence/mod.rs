//! Round-trip of entries and metadata through the local slot store.
//!
//! Loading never fails: absent or corrupt slots read as empty. Saving never
//! fails either; errors go to telemetry and the caller carries on.

use std::sync::Arc;

use crate::db::{SlotStore, ENTRIES_SLOT, METADATA_SLOT};
use crate::errors::AppError;
use crate::models::{Entry, MetadataMap};
use crate::telemetry::Telemetry;

pub struct PersistenceAdapter {
    store: Arc<dyn SlotStore>,
    telemetry: Telemetry,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn SlotStore>, telemetry: Telemetry) -> Self {
        Self { store, telemetry }
    }

    /// Load the last saved baseline.
    ///
    /// Metadata whose identifier has no entry is dropped.
    pub async fn load(&self) -> (Vec<Entry>, MetadataMap) {
        let entries: Vec<Entry> = self.read_slot(ENTRIES_SLOT).await.unwrap_or_default();
        let mut metadata: MetadataMap = self.read_slot(METADATA_SLOT).await.unwrap_or_default();
        metadata.retain(|key, record| {
            record.identifier.key() == *key && entries.iter().any(|e| e.identifier.key() == *key)
        });
        tracing::debug!(
            entries = entries.len(),
            metadata = metadata.len(),
            "Loaded local baseline"
        );
        (entries, metadata)
    }

    /// Write both slots. Failures are reported, not returned.
    pub async fn save(&self, entries: &[Entry], metadata: &MetadataMap) {
        self.write_slot(ENTRIES_SLOT, entries).await;
        self.write_slot(METADATA_SLOT, metadata).await;
    }

    async fn read_slot<T: serde::de::DeserializeOwned>(&self, slot: &str) -> Option<T> {
        let body = match self.store.read(slot).await {
            Ok(Some(body)) => body,
            Ok(None) => return None,
            Err(e) => {
                self.report_read_failure(slot, e);
                return None;
            }
        };
        match serde_json::from_str(&body) {
            Ok(value) => Some(value),
            Err(e) => {
                self.report_read_failure(slot, AppError::PersistenceRead(e.to_string()));
                None
            }
        }
    }

    async fn write_slot<T: serde::Serialize + ?Sized>(&self, slot: &str, value: &T) {
        let result = match serde_json::to_string(value) {
            Ok(body) => self.store.write(slot, &body).await,
            Err(e) => Err(AppError::Internal(format!("serialize {}: {}", slot, e))),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist slot {}: {}", slot, e);
            self.telemetry
                .failure(&e, &[("operation", "save".to_string()), ("slot", slot.to_string())]);
        }
    }

    fn report_read_failure(&self, slot: &str, error: AppError) {
        tracing::warn!("Treating slot {} as empty: {}", slot, error);
        self.telemetry
            .failure(&error, &[("operation", "load".to_string()), ("slot", slot.to_string())]);
    }
}
