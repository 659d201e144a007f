//! Remote metadata cache keyed by project identifier.

use chrono::{DateTime, Duration, Utc};

use crate::models::{MetadataMap, MetadataRecord};

/// Disposable enrichment records. Never authoritative for identity.
#[derive(Debug, Clone, Default)]
pub struct MetadataCache {
    records: MetadataMap,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identifier: &str) -> Option<&MetadataRecord> {
        self.records.get(identifier)
    }

    /// Store a complete record, replacing any previous one for its identifier.
    ///
    /// A record whose `fetched_at` is strictly older than the stored one is
    /// discarded and `false` is returned.
    pub fn put(&mut self, record: MetadataRecord) -> bool {
        let key = record.identifier.key();
        if let Some(current) = self.records.get(&key) {
            if record.fetched_at < current.fetched_at {
                tracing::debug!(
                    identifier = %key,
                    incoming = %record.fetched_at,
                    stored = %current.fetched_at,
                    "Discarding late metadata result"
                );
                return false;
            }
        }
        self.records.insert(key, record);
        true
    }

    pub fn evict(&mut self, identifier: &str) -> Option<MetadataRecord> {
        self.records.remove(identifier)
    }

    /// True if the record is absent or older than `max_age`.
    pub fn is_stale(&self, identifier: &str, max_age: Duration) -> bool {
        self.is_stale_at(identifier, max_age, Utc::now())
    }

    pub fn is_stale_at(&self, identifier: &str, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.records.get(identifier) {
            Some(record) => now - record.fetched_at > max_age,
            None => true,
        }
    }

    /// Pull stamps that lie after `now` back to `now`. Returns how many moved.
    ///
    /// Records from a snapshot or a stored slot carry another clock's
    /// stamps; a future one would outrank every later fetch.
    pub fn clamp_fetched_at(&mut self, now: DateTime<Utc>) -> usize {
        let mut clamped = 0;
        for record in self.records.values_mut() {
            if record.fetched_at > now {
                record.fetched_at = now;
                clamped += 1;
            }
        }
        clamped
    }

    /// Drop every record whose key is not accepted by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.records.retain(|key, _| keep(key));
    }

    pub fn records(&self) -> &MetadataMap {
        &self.records
    }

    pub fn replace_all(&mut self, records: MetadataMap) {
        self.records = records;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
