//! Snapshot tokens: the whole tracked state as a URL-safe string.
//!
//! The token is base64url (no padding) over JSON. It is neither compressed
//! nor signed; anyone holding a link can read and forge it.

mod link;

pub use link::*;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{DecodedSnapshot, Entry, MetadataMap, RepoIdentifier, Snapshot};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed snapshot: {0}")]
pub struct MalformedSnapshotError(pub String);

/// Encode entries and metadata with a fresh capture time.
pub fn encode(entries: &[Entry], metadata: &MetadataMap) -> Result<(String, DateTime<Utc>), MalformedSnapshotError> {
    let captured_at = Utc::now();
    let token = encode_at(entries, metadata, captured_at)?;
    Ok((token, captured_at))
}

pub fn encode_at(
    entries: &[Entry],
    metadata: &MetadataMap,
    captured_at: DateTime<Utc>,
) -> Result<String, MalformedSnapshotError> {
    let snapshot = Snapshot {
        entries: entries.to_vec(),
        metadata: metadata.clone(),
        captured_at: Some(captured_at),
    };
    let json = serde_json::to_vec(&snapshot).map_err(|e| MalformedSnapshotError(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a token without touching any store.
///
/// Missing fields default to empty, duplicated entry ids keep their first
/// occurrence, and metadata not backed by an entry is dropped.
pub fn decode(token: &str) -> Result<DecodedSnapshot, MalformedSnapshotError> {
    let token = token.trim().trim_end_matches('=');
    if token.is_empty() {
        return Err(MalformedSnapshotError("empty token".to_string()));
    }
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| MalformedSnapshotError(format!("not base64url: {}", e)))?;

    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| MalformedSnapshotError(format!("not JSON: {}", e)))?;
    if !value.is_object() {
        return Err(MalformedSnapshotError("payload is not an object".to_string()));
    }
    let snapshot: Snapshot = serde_json::from_value(value)
        .map_err(|e| MalformedSnapshotError(format!("unexpected shape: {}", e)))?;

    let mut seen = std::collections::HashSet::new();
    let entries: Vec<Entry> = snapshot
        .entries
        .into_iter()
        .filter(|e| seen.insert(e.id.clone()))
        .collect();
    let mut metadata = snapshot.metadata;
    metadata.retain(|key, record| {
        RepoIdentifier::from_key(key).as_ref() == Some(&record.identifier)
            && entries.iter().any(|e| e.identifier == record.identifier)
    });

    Ok(DecodedSnapshot {
        entries,
        metadata,
        captured_at: snapshot.captured_at,
    })
}
