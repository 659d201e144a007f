//! Shareable snapshot of the whole tracked state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Entry, MetadataRecord};

/// Identifier key to metadata, ordered for stable serialization.
pub type MetadataMap = BTreeMap<String, MetadataRecord>;

/// Wire shape of a snapshot token payload.
///
/// Every field defaults so that tokens produced by older builds still decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub metadata: MetadataMap,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

/// Result of decoding a token, not yet applied to any store.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSnapshot {
    pub entries: Vec<Entry>,
    pub metadata: MetadataMap,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Outbound share link.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLink {
    pub token: String,
    pub captured_at: DateTime<Utc>,
    pub url: String,
}
