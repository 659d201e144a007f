//! Entry model: one locally tracked project.

use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Remote catalog key for a project, derived from its URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoIdentifier {
    pub owner: String,
    pub name: String,
}

impl RepoIdentifier {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Derive an identifier from a URL-like string.
    ///
    /// `https://host/owner/name/...`, `host/owner/name` and bare `owner/name`
    /// are accepted. A trailing `.git` on the name is dropped.
    pub fn from_url_like(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() || input.chars().any(char::is_whitespace) {
            return None;
        }

        let segments: Vec<String> = if input.contains("://") {
            let url = Url::parse(input).ok()?;
            url.host_str()?;
            url.path_segments()?
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        } else {
            let first = input.split('/').next().unwrap_or_default();
            if first.contains('.') || first.contains(':') {
                let url = Url::parse(&format!("https://{}", input)).ok()?;
                url.path_segments()?
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            } else {
                input
                    .split('/')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
        };

        let owner = segments.first()?;
        let name = segments.get(1)?;
        let name = name.strip_suffix(".git").unwrap_or(name);
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(owner.as_str(), name))
    }

    /// Cache key, `owner/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Inverse of [`RepoIdentifier::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        let (owner, name) = key.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(owner, name))
    }
}

impl fmt::Display for RepoIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A tracked project as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub identifier: RepoIdentifier,
    pub display_name: String,
    pub description: String,
    pub external_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_url: Option<String>,
    #[serde(default)]
    pub declared_contributors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Link to the fork page of the project, or the URL itself when it has no identifier.
    pub fn fork_url(&self) -> String {
        derived_link(&self.external_url, "fork")
    }

    /// Link to the compare page used to open a pull request.
    pub fn compare_url(&self) -> String {
        derived_link(&self.external_url, "compare")
    }
}

fn derived_link(url: &str, suffix: &str) -> String {
    if url.contains("://") && RepoIdentifier::from_url_like(url).is_some() {
        format!("{}/{}", url.trim_end_matches('/'), suffix)
    } else {
        url.to_string()
    }
}

/// User input for a new entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub display_name: String,
    pub description: String,
    pub external_url: String,
    #[serde(default)]
    pub secondary_url: Option<String>,
    #[serde(default)]
    pub declared_contributors: Vec<String>,
}

/// Partial update of the user-editable fields of an entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub secondary_url: Option<String>,
    #[serde(default)]
    pub declared_contributors: Option<Vec<String>>,
}

/// Trim handles, drop blanks and keep the first spelling of each handle.
pub fn normalize_contributors(handles: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    handles
        .iter()
        .map(|h| h.trim().trim_start_matches('@').to_string())
        .filter(|h| !h.is_empty())
        .filter(|h| seen.insert(h.to_lowercase()))
        .collect()
}
