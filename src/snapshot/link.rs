//! Snapshot parameters carried on an address.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Url;
use serde::Serialize;

use super::{decode, MalformedSnapshotError};
use crate::models::DecodedSnapshot;

/// Query parameter holding the encoded payload.
pub const SNAPSHOT_PARAM: &str = "snapshot";
/// Query parameter holding the human-readable capture time.
pub const CAPTURED_AT_PARAM: &str = "snapshotAt";

/// Base used to resolve path-only addresses such as `/?snapshot=...`.
const RELATIVE_BASE: &str = "http://hub.invalid/";

/// An address split into its snapshot parameters and everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundLink {
    pub token: Option<String>,
    pub captured_at_label: Option<String>,
    /// The address with both snapshot parameters removed.
    pub stripped: String,
}

impl InboundLink {
    pub fn parse(address: &str) -> Self {
        let (mut url, relative) = match Url::parse(address) {
            Ok(url) => (url, false),
            Err(_) => match Url::parse(RELATIVE_BASE).and_then(|base| base.join(address)) {
                Ok(url) => (url, true),
                Err(_) => {
                    return Self {
                        token: None,
                        captured_at_label: None,
                        stripped: address.to_string(),
                    }
                }
            },
        };

        let mut token = None;
        let mut captured_at_label = None;
        let mut kept: Vec<(String, String)> = Vec::new();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                SNAPSHOT_PARAM => token = Some(value.into_owned()).filter(|t| !t.is_empty()),
                CAPTURED_AT_PARAM => captured_at_label = Some(value.into_owned()),
                _ => kept.push((key.into_owned(), value.into_owned())),
            }
        }

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }

        let stripped = if relative {
            let mut path = url.path().to_string();
            if let Some(query) = url.query() {
                path.push('?');
                path.push_str(query);
            }
            if let Some(fragment) = url.fragment() {
                path.push('#');
                path.push_str(fragment);
            }
            path
        } else {
            url.to_string()
        };

        Self {
            token,
            captured_at_label,
            stripped,
        }
    }
}

/// Decision taken for an inbound address before anything is applied.
#[derive(Debug)]
pub enum LinkDecision {
    NoToken,
    Decoded(DecodedSnapshot),
    Rejected(MalformedSnapshotError),
}

impl InboundLink {
    pub fn decide(&self) -> LinkDecision {
        match &self.token {
            None => LinkDecision::NoToken,
            Some(token) => match decode(token) {
                Ok(snapshot) => LinkDecision::Decoded(snapshot),
                Err(e) => LinkDecision::Rejected(e),
            },
        }
    }
}

/// What startup (or an import request) did with the inbound address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum InboundOutcome {
    NoToken,
    #[serde(rename_all = "camelCase")]
    Applied {
        entries: usize,
        metadata: usize,
        captured_at: Option<DateTime<Utc>>,
    },
    Rejected { reason: String },
}

/// Build an outbound share address on top of `public_url`.
pub fn share_url(
    public_url: &str,
    token: &str,
    captured_at: DateTime<Utc>,
) -> Result<String, MalformedSnapshotError> {
    let mut url = Url::parse(public_url)
        .map_err(|e| MalformedSnapshotError(format!("invalid public url: {}", e)))?;
    url.query_pairs_mut()
        .append_pair(SNAPSHOT_PARAM, token)
        .append_pair(
            CAPTURED_AT_PARAM,
            &captured_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    Ok(url.to_string())
}
