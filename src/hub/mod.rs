//! The hub: explicit context object that owns the entry store and metadata
//! cache and coordinates persistence, catalog refreshes and snapshots.
//!
//! Handlers never touch the stores directly. Catalog calls run without the
//! state lock held; their results are merged afterwards through
//! [`MetadataCache::put`], which refuses results older than what is stored.

mod window;

pub use window::*;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};

use crate::catalog::{
    CredentialGate, CredentialStatus, FetchError, FetchErrorKind, RemoteMetadataClient,
    ValidationOutcome, VALIDATION_COOLDOWN,
};
use crate::errors::AppError;
use crate::models::{
    DecodedSnapshot, Entry, EntryDraft, EntryPatch, EntryView, HubSummary, HubView,
    MetadataRecord, RepoIdentifier, ShareLink,
};
use crate::persistence::PersistenceAdapter;
use crate::snapshot::{self, InboundLink, InboundOutcome, LinkDecision, MalformedSnapshotError};
use crate::store::{EntryStore, MetadataCache};
use crate::telemetry::Telemetry;

/// Tunables the hub needs from configuration.
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub stale_after: chrono::Duration,
    pub public_url: String,
    pub window: ChallengeWindow,
}

/// Result of a refresh request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub requested: usize,
    pub updated: Vec<String>,
    /// Results that arrived after a newer record was already stored.
    pub discarded: Vec<String>,
    pub failures: BTreeMap<String, FetchErrorKind>,
    pub rate_limited: bool,
}

#[derive(Default)]
struct HubState {
    entries: EntryStore,
    metadata: MetadataCache,
    revision: i64,
    /// Catalog calls are suppressed until this instant after a rate limit.
    throttled_until: Option<Instant>,
}

pub struct Hub {
    state: RwLock<HubState>,
    persistence: PersistenceAdapter,
    client: RemoteMetadataClient,
    credential: Mutex<CredentialGate>,
    telemetry: Telemetry,
    settings: HubSettings,
}

impl Hub {
    pub fn new(
        persistence: PersistenceAdapter,
        client: RemoteMetadataClient,
        telemetry: Telemetry,
        settings: HubSettings,
    ) -> Self {
        let gate = CredentialGate::new(client.transport().has_credential(), VALIDATION_COOLDOWN);
        Self {
            state: RwLock::new(HubState::default()),
            persistence,
            client,
            credential: Mutex::new(gate),
            telemetry,
            settings,
        }
    }

    // ==================== STARTUP ====================

    /// Run inbound link handling once and establish the session baseline.
    ///
    /// A decodable snapshot replaces local state and is persisted as the new
    /// baseline. Anything else falls back to the persisted baseline.
    pub async fn start(&self, inbound: Option<&str>) -> (InboundOutcome, Option<String>) {
        let Some(address) = inbound else {
            self.load_local().await;
            return (InboundOutcome::NoToken, None);
        };
        let link = InboundLink::parse(address);
        let outcome = self.handle_link(&link).await;
        if !matches!(outcome, InboundOutcome::Applied { .. }) {
            self.load_local().await;
        }
        (outcome, Some(link.stripped))
    }

    /// Apply an inbound address during a running session.
    ///
    /// On rejection the current state is kept, which is the local baseline.
    pub async fn import_link(&self, address: &str) -> (InboundOutcome, String) {
        let link = InboundLink::parse(address);
        let outcome = self.handle_link(&link).await;
        (outcome, link.stripped)
    }

    async fn handle_link(&self, link: &InboundLink) -> InboundOutcome {
        match link.decide() {
            LinkDecision::NoToken => InboundOutcome::NoToken,
            LinkDecision::Decoded(decoded) => {
                tracing::debug!(label = ?link.captured_at_label, "Decoded inbound snapshot");
                self.apply_snapshot(decoded).await
            }
            LinkDecision::Rejected(err) => {
                self.report_rejected(&err);
                InboundOutcome::Rejected {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Apply a bare token, as carried in a share link's `snapshot` parameter.
    pub async fn import_token(&self, token: &str) -> Result<InboundOutcome, MalformedSnapshotError> {
        match snapshot::decode(token) {
            Ok(decoded) => Ok(self.apply_snapshot(decoded).await),
            Err(err) => {
                self.report_rejected(&err);
                Err(err)
            }
        }
    }

    fn report_rejected(&self, err: &MalformedSnapshotError) {
        tracing::warn!("Rejected inbound snapshot: {}", err);
        self.telemetry.failure(err, &[("operation", "import".to_string())]);
        self.telemetry.event("snapshot_rejected", &[]);
    }

    async fn load_local(&self) {
        let (entries, metadata) = self.persistence.load().await;
        let mut state = self.state.write().await;
        state.entries.replace_all(entries);
        state.metadata.replace_all(metadata);
        settle_stamps(&mut state.metadata);
        tracing::info!(
            entries = state.entries.len(),
            metadata = state.metadata.len(),
            "Loaded local baseline"
        );
    }

    /// Seed both stores from a decoded snapshot and write it through.
    pub async fn apply_snapshot(&self, decoded: DecodedSnapshot) -> InboundOutcome {
        let mut state = self.state.write().await;
        state.entries.replace_all(decoded.entries);
        state.metadata.replace_all(decoded.metadata);
        let live: BTreeSet<String> = state.entries.identifiers().iter().map(|i| i.key()).collect();
        state.metadata.retain(|key| live.contains(key));
        settle_stamps(&mut state.metadata);
        state.revision += 1;
        self.persist(&state).await;

        let outcome = InboundOutcome::Applied {
            entries: state.entries.len(),
            metadata: state.metadata.len(),
            captured_at: decoded.captured_at,
        };
        tracing::info!(?outcome, "Applied shared snapshot");
        self.telemetry.event(
            "snapshot_applied",
            &[("entries", state.entries.len().to_string())],
        );
        outcome
    }

    /// True when entries exist but nothing has been fetched for them yet.
    pub async fn needs_initial_fetch(&self) -> bool {
        let state = self.state.read().await;
        !state.entries.is_empty() && state.metadata.is_empty()
    }

    // ==================== ENTRY OPERATIONS ====================

    pub async fn add_entry(&self, draft: EntryDraft) -> Result<Entry, AppError> {
        let mut state = self.state.write().await;
        let entry = state.entries.add(draft)?;
        state.revision += 1;
        self.persist(&state).await;

        tracing::info!(id = %entry.id, identifier = %entry.identifier, "Added entry");
        self.telemetry
            .event("entry_added", &[("identifier", entry.identifier.key())]);
        Ok(entry)
    }

    /// Remove an entry. Unknown ids are a no-op.
    ///
    /// Metadata is evicted once no remaining entry tracks the identifier.
    pub async fn remove_entry(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        let Some(removed) = state.entries.remove(id) else {
            return false;
        };
        if !state.entries.contains_identifier(&removed.identifier) {
            state.metadata.evict(&removed.identifier.key());
        }
        state.revision += 1;
        self.persist(&state).await;

        tracing::info!(id = %removed.id, identifier = %removed.identifier, "Removed entry");
        self.telemetry
            .event("entry_removed", &[("identifier", removed.identifier.key())]);
        true
    }

    pub async fn update_entry(&self, id: &str, patch: EntryPatch) -> Result<Entry, AppError> {
        let mut state = self.state.write().await;
        let enriched = state
            .entries
            .get(id)
            .map(|e| state.metadata.get(&e.identifier.key()).is_some())
            .unwrap_or(false);
        let entry = state.entries.update(id, patch, enriched)?;
        state.revision += 1;
        self.persist(&state).await;

        self.telemetry
            .event("entry_updated", &[("identifier", entry.identifier.key())]);
        Ok(entry)
    }

    pub async fn list(&self) -> Vec<Entry> {
        self.state.read().await.entries.list().to_vec()
    }

    pub async fn get_entry(&self, id: &str) -> Option<Entry> {
        self.state.read().await.entries.get(id).cloned()
    }

    pub async fn get_metadata(&self, identifier: &str) -> Option<MetadataRecord> {
        self.state.read().await.metadata.get(identifier).cloned()
    }

    pub async fn revision(&self) -> i64 {
        self.state.read().await.revision
    }

    // ==================== REMOTE METADATA ====================

    /// Refresh metadata for every tracked identifier.
    ///
    /// Without `force`, only stale or missing records are requested.
    pub async fn refresh_all(&self, force: bool) -> RefreshReport {
        let identifiers = {
            let state = self.state.read().await;
            state
                .entries
                .identifiers()
                .into_iter()
                .filter(|id| force || state.metadata.is_stale(&id.key(), self.settings.stale_after))
                .collect::<Vec<_>>()
        };
        self.refresh_identifiers(identifiers).await
    }

    /// Fetch the given identifiers and merge the results.
    pub async fn refresh_identifiers(&self, identifiers: Vec<RepoIdentifier>) -> RefreshReport {
        let mut report = RefreshReport {
            requested: identifiers.len(),
            ..Default::default()
        };
        if identifiers.is_empty() {
            return report;
        }

        if self.is_throttled().await {
            tracing::info!("Skipping catalog refresh while rate limited");
            report.rate_limited = true;
            for id in &identifiers {
                report.failures.insert(id.key(), FetchErrorKind::RateLimited);
            }
            return report;
        }

        let batch = self.client.fetch_many(&identifiers).await;
        for (key, kind) in &batch.failures {
            self.telemetry.failure(
                &FetchError::new(key, *kind, "refresh"),
                &[("operation", "refresh".to_string())],
            );
        }
        report.failures = batch.failures;
        report.rate_limited = batch.rate_limited;

        let mut state = self.state.write().await;
        if batch.rate_limited {
            state.throttled_until = Some(Instant::now() + VALIDATION_COOLDOWN);
        }
        for (key, record) in batch.records {
            // The entry may have been removed while the request was in flight.
            if !state.entries.contains_identifier(&record.identifier) {
                report.discarded.push(key);
                continue;
            }
            if state.metadata.put(record) {
                report.updated.push(key);
            } else {
                report.discarded.push(key);
            }
        }
        if !report.updated.is_empty() {
            state.revision += 1;
            self.persist(&state).await;
        }
        drop(state);

        tracing::info!(
            requested = report.requested,
            updated = report.updated.len(),
            failed = report.failures.len(),
            rate_limited = report.rate_limited,
            "Refresh completed"
        );
        self.telemetry.event(
            "refresh_completed",
            &[
                ("updated", report.updated.len().to_string()),
                ("failed", report.failures.len().to_string()),
            ],
        );
        report
    }

    /// Refresh one tracked identifier and return its stored record.
    pub async fn refresh_one(&self, identifier: RepoIdentifier) -> Result<MetadataRecord, AppError> {
        let key = identifier.key();
        if !self.state.read().await.entries.contains_identifier(&identifier) {
            return Err(AppError::NotFound(format!("{} is not tracked", key)));
        }

        let report = self.refresh_identifiers(vec![identifier]).await;
        if let Some(kind) = report.failures.get(&key) {
            return Err(FetchError::new(&key, *kind, "refresh failed").into());
        }
        self.get_metadata(&key)
            .await
            .ok_or_else(|| AppError::NotFound(format!("{} was removed during refresh", key)))
    }

    async fn is_throttled(&self) -> bool {
        let mut state = self.state.write().await;
        match state.throttled_until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                state.throttled_until = None;
                false
            }
            None => false,
        }
    }

    pub async fn credential_status(&self) -> CredentialStatus {
        self.credential.lock().await.status().clone()
    }

    /// Check the credential against the catalog, at most once per cool-down window.
    pub async fn validate_credential(&self) -> ValidationOutcome {
        let mut gate = self.credential.lock().await;
        if !gate.try_begin(Instant::now()) {
            tracing::debug!("Skipping credential validation, too soon since last attempt");
            return ValidationOutcome {
                status: gate.status().clone(),
                cooling_down: true,
            };
        }

        let result = self.client.transport().viewer_login().await;
        let status = gate.record(result).clone();
        if status == CredentialStatus::Invalid {
            tracing::warn!("Catalog credential rejected, continuing anonymously");
            self.client.transport().clear_credential();
        }
        self.telemetry
            .event("credential_validated", &[("usable", status.is_usable().to_string())]);
        ValidationOutcome {
            status,
            cooling_down: false,
        }
    }

    // ==================== SHARING ====================

    /// Encode the current state into a share link.
    pub async fn generate_share_token(&self) -> Result<ShareLink, AppError> {
        let (token, captured_at) = {
            let state = self.state.read().await;
            snapshot::encode(state.entries.list(), state.metadata.records())
                .map_err(|e| AppError::Internal(e.to_string()))?
        };
        let url = snapshot::share_url(&self.settings.public_url, &token, captured_at)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        self.telemetry
            .event("share_generated", &[("length", token.len().to_string())]);
        Ok(ShareLink {
            token,
            captured_at,
            url,
        })
    }

    // ==================== READ MODEL ====================

    pub async fn view(&self, now: DateTime<Utc>) -> HubView {
        let state = self.state.read().await;
        let metadata = state.metadata.records().clone();
        let entries = state
            .entries
            .list()
            .iter()
            .map(|e| EntryView::new(e.clone(), metadata.get(&e.identifier.key()), now))
            .collect();
        HubView {
            revision_id: state.revision,
            generated_at: now,
            entries,
            summary: summarize(state.entries.len(), &metadata),
            metadata,
            window: self.settings.window.view(now),
        }
    }

    pub fn window(&self) -> &ChallengeWindow {
        &self.settings.window
    }

    async fn persist(&self, state: &HubState) {
        self.persistence
            .save(state.entries.list(), state.metadata.records())
            .await;
    }
}

fn settle_stamps(metadata: &mut MetadataCache) {
    let clamped = metadata.clamp_fetched_at(Utc::now());
    if clamped > 0 {
        tracing::warn!(clamped, "Metadata stamped in the future, treating it as fetched now");
    }
}

fn summarize(entry_count: usize, metadata: &crate::models::MetadataMap) -> HubSummary {
    let mut seen = BTreeSet::new();
    let remote_contributors = metadata
        .values()
        .flat_map(|m| m.contributors.iter())
        .filter(|c| seen.insert(c.to_lowercase()))
        .cloned()
        .collect();
    HubSummary {
        entry_count,
        remote_contributors,
        total_stars: metadata.values().map(|m| m.stargazer_count).sum(),
        total_commits: metadata.values().map(|m| m.commit_count).sum(),
    }
}
