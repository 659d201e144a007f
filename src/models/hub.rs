//! Read-side view handed to the presentation layer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Entry, MetadataMap, MetadataRecord};
use crate::hub::WindowView;

/// An entry joined with the links the dashboard derives from it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub fork_url: String,
    pub compare_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_ago: Option<String>,
}

impl EntryView {
    pub fn new(entry: Entry, metadata: Option<&MetadataRecord>, now: DateTime<Utc>) -> Self {
        Self {
            fork_url: entry.fork_url(),
            compare_url: entry.compare_url(),
            updated_ago: metadata.and_then(|m| m.updated_ago(now)),
            entry,
        }
    }
}

/// Aggregates across all tracked projects.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HubSummary {
    pub entry_count: usize,
    /// Distinct remote contributors. Declared contributors are not merged in.
    pub remote_contributors: Vec<String>,
    pub total_stars: u64,
    /// Commits across all projects since the challenge started.
    pub total_commits: u64,
}

/// The full state as seen by the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubView {
    pub revision_id: i64,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<EntryView>,
    pub metadata: MetadataMap,
    pub window: WindowView,
    pub summary: HubSummary,
}
