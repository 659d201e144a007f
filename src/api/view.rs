//! Read-only view endpoints.

use axum::extract::{Path, State};
use chrono::Utc;

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::hub::WindowView;
use crate::models::{HubView, MetadataRecord, RepoIdentifier};
use crate::AppState;

/// GET /api/hub - Entries joined with metadata, the challenge window and the summary.
pub async fn get_hub(State(state): State<AppState>) -> ApiResult<HubView> {
    let view = state.hub.view(Utc::now()).await;
    let revision_id = view.revision_id;
    success(view, revision_id)
}

/// GET /api/metadata/:owner/:name - Cached metadata for one identifier.
pub async fn get_metadata(
    State(state): State<AppState>,
    Path((owner, name)): Path<(String, String)>,
) -> ApiResult<MetadataRecord> {
    let revision_id = state.hub.revision().await;
    let key = RepoIdentifier::new(owner, name).key();

    match state.hub.get_metadata(&key).await {
        Some(record) => success(record, revision_id),
        None => error(
            AppError::NotFound(format!("No metadata cached for {}", key)),
            revision_id,
        ),
    }
}

/// GET /api/window - Challenge window with per-day status.
pub async fn get_window(State(state): State<AppState>) -> ApiResult<WindowView> {
    let revision_id = state.hub.revision().await;
    success(state.hub.window().view(Utc::now()), revision_id)
}
