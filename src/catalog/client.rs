//! Retrying, failure-isolating metadata client.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{CatalogTransport, FetchError, FetchErrorKind};
use crate::models::{MetadataMap, MetadataRecord, RepoIdentifier};

/// Bounded exponential backoff for transport failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given 1-based failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Outcome of a batch fetch. Failing identifiers are listed, never thrown.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchBatch {
    pub records: MetadataMap,
    pub failures: BTreeMap<String, FetchErrorKind>,
    pub rate_limited: bool,
}

pub struct RemoteMetadataClient {
    transport: Arc<dyn CatalogTransport>,
    policy: RetryPolicy,
    activity_since: Option<DateTime<Utc>>,
}

impl RemoteMetadataClient {
    pub fn new(transport: Arc<dyn CatalogTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            activity_since: None,
        }
    }

    /// Count commits from `since` instead of over the whole history.
    pub fn with_activity_since(mut self, since: DateTime<Utc>) -> Self {
        self.activity_since = Some(since);
        self
    }

    pub fn transport(&self) -> &Arc<dyn CatalogTransport> {
        &self.transport
    }

    /// Fetch one record, retrying transport failures with backoff.
    ///
    /// The record is stamped with the time of the first attempt so that a
    /// slow result never outranks one requested after it.
    pub async fn fetch_one(&self, identifier: &RepoIdentifier) -> Result<MetadataRecord, FetchError> {
        let requested_at = Utc::now();
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .transport
                .fetch_record(identifier, requested_at, self.activity_since)
                .await
            {
                Ok(record) => return Ok(record),
                Err(err) if err.kind.is_retryable() && attempt < attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::debug!(
                        identifier = %identifier,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying catalog fetch: {}",
                        err.message
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fetch many identifiers sequentially.
    ///
    /// A failure only drops its own identifier. Once the catalog reports a
    /// rate limit, the remaining identifiers are not requested and are
    /// reported as rate limited.
    pub async fn fetch_many(&self, identifiers: &[RepoIdentifier]) -> FetchBatch {
        let mut batch = FetchBatch::default();
        for identifier in identifiers {
            let key = identifier.key();
            if batch.rate_limited {
                batch.failures.insert(key, FetchErrorKind::RateLimited);
                continue;
            }
            match self.fetch_one(identifier).await {
                Ok(record) => {
                    batch.records.insert(key, record);
                }
                Err(err) => {
                    tracing::warn!(identifier = %key, kind = ?err.kind, "Catalog fetch failed: {}", err.message);
                    if err.kind == FetchErrorKind::RateLimited {
                        batch.rate_limited = true;
                    }
                    batch.failures.insert(key, err.kind);
                }
            }
        }
        batch
    }
}
