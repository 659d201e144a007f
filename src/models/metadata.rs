//! Remote-derived enrichment for a tracked project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RepoIdentifier;

/// Best-known remote facts about a project, keyed by its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub identifier: RepoIdentifier,
    pub resolved_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_description: Option<String>,
    pub owner: String,
    pub remote_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_language: Option<String>,
    #[serde(default)]
    pub stargazer_count: u64,
    #[serde(default)]
    pub fork_count: u64,
    /// Pull requests in any state.
    #[serde(default)]
    pub pull_request_count: u64,
    /// Issues in any state, pull requests excluded.
    #[serde(default)]
    pub issue_count: u64,
    /// Commits on the default branch since the challenge started.
    #[serde(default)]
    pub commit_count: u64,
    /// When the project last changed upstream. Display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
    /// When this record was obtained locally. Drives freshness.
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub contributors: Vec<String>,
}

impl MetadataRecord {
    /// Relative age of the upstream update, e.g. `3h ago`.
    pub fn updated_ago(&self, now: DateTime<Utc>) -> Option<String> {
        self.last_updated_at.map(|at| time_ago(at, now))
    }
}

/// Render the distance between `then` and `now` the way the dashboard does.
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - then).num_hours();
    if hours < 1 {
        return "Just now".to_string();
    }
    if hours < 24 {
        return format!("{}h ago", hours);
    }
    format!("{}d ago", hours / 24)
}
