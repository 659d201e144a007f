//! Catalog refresh and credential endpoints.

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::catalog::{CredentialStatus, ValidationOutcome};
use crate::hub::RefreshReport;
use crate::models::{MetadataRecord, RepoIdentifier};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    /// Refetch fresh records too.
    #[serde(default)]
    pub force: bool,
}

/// POST /api/refresh - Refresh stale metadata, or everything with `?force=true`.
///
/// Per-identifier failures are reported in the body, never as an error status.
pub async fn refresh(
    State(state): State<AppState>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<RefreshReport> {
    let report = state.hub.refresh_all(query.force).await;
    success(report, state.hub.revision().await)
}

/// POST /api/metadata/:owner/:name/refresh - Refetch one tracked identifier.
///
/// Unlike the batch refresh, a failure is returned as an error status.
pub async fn refresh_metadata(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> ApiResult<MetadataRecord> {
    match state.hub.refresh_one(RepoIdentifier::new(owner, name)).await {
        Ok(record) => success(record, state.hub.revision().await),
        Err(e) => error(e, state.hub.revision().await),
    }
}

/// GET /api/credential - Current credential status.
pub async fn get_credential(State(state): State<AppState>) -> ApiResult<CredentialStatus> {
    let revision_id = state.hub.revision().await;
    success(state.hub.credential_status().await, revision_id)
}

/// POST /api/credential/validate - Check the credential, at most once per five seconds.
pub async fn validate_credential(State(state): State<AppState>) -> ApiResult<ValidationOutcome> {
    let outcome = state.hub.validate_credential().await;
    success(outcome, state.hub.revision().await)
}
