//! Catalog API access.
//!
//! A [`CatalogTransport`] performs single requests and classifies their
//! outcome; [`RemoteMetadataClient`] layers retries and batch isolation on top.

mod client;
mod credential;
mod github;

pub use client::*;
pub use credential::*;
pub use github::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{MetadataRecord, RepoIdentifier};

/// Classified failure of a catalog request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchErrorKind {
    /// Throttled. Back off; retrying now will not help.
    RateLimited,
    NotFound,
    /// Credential missing, invalid or lacking scope.
    Unauthorized,
    /// Network failure, server error or undecodable body.
    Transport,
}

impl FetchErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, FetchErrorKind::Transport)
    }
}

/// Failure for one identifier (or for the viewer query).
#[derive(Debug, Clone, Error)]
#[error("{identifier}: {kind:?}: {message}")]
pub struct FetchError {
    pub identifier: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(
        identifier: impl Into<String>,
        kind: FetchErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            message: message.into(),
        }
    }
}

/// One request against the catalog API, no retries.
#[async_trait]
pub trait CatalogTransport: Send + Sync {
    /// Fetch a complete record for `identifier`, stamped with `requested_at`.
    ///
    /// Commits are counted from `activity_since`, or over the whole history
    /// when it is `None`.
    async fn fetch_record(
        &self,
        identifier: &RepoIdentifier,
        requested_at: DateTime<Utc>,
        activity_since: Option<DateTime<Utc>>,
    ) -> Result<MetadataRecord, FetchError>;

    /// Login of the credential's owner, or `None` when no credential is set.
    async fn viewer_login(&self) -> Result<Option<String>, FetchError>;

    fn has_credential(&self) -> bool;

    /// Stop attaching the credential to further requests.
    fn clear_credential(&self);
}
