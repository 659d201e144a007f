//! Entry API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;

use super::{error, json_body, success, ApiResult};
use crate::errors::AppError;
use crate::models::{Entry, EntryDraft, EntryPatch};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedResponse {
    pub id: String,
    pub removed: bool,
}

/// GET /api/entries - List entries in insertion order.
pub async fn list_entries(State(state): State<AppState>) -> ApiResult<Vec<Entry>> {
    let revision_id = state.hub.revision().await;
    success(state.hub.list().await, revision_id)
}

/// GET /api/entries/:id - Get a single entry.
pub async fn get_entry(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Entry> {
    let revision_id = state.hub.revision().await;

    match state.hub.get_entry(&id).await {
        Some(entry) => success(entry, revision_id),
        None => error(
            AppError::NotFound(format!("Entry {} not found", id)),
            revision_id,
        ),
    }
}

/// POST /api/entries - Add an entry and fetch its metadata in the background.
pub async fn add_entry(
    State(state): State<AppState>,
    body: Result<Json<EntryDraft>, JsonRejection>,
) -> ApiResult<Entry> {
    let draft = json_body(body, state.hub.revision().await)?;
    match state.hub.add_entry(draft).await {
        Ok(entry) => {
            let hub = state.hub.clone();
            let identifier = entry.identifier.clone();
            tokio::spawn(async move {
                hub.refresh_identifiers(vec![identifier]).await;
            });

            success(entry, state.hub.revision().await)
        }
        Err(e) => error(e, state.hub.revision().await),
    }
}

/// PUT /api/entries/:id - Update the user-editable fields of an entry.
pub async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<EntryPatch>, JsonRejection>,
) -> ApiResult<Entry> {
    let patch = json_body(body, state.hub.revision().await)?;
    match state.hub.update_entry(&id, patch).await {
        Ok(entry) => success(entry, state.hub.revision().await),
        Err(e) => error(e, state.hub.revision().await),
    }
}

/// DELETE /api/entries/:id - Remove an entry. Unknown ids succeed with `removed: false`.
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<RemovedResponse> {
    let removed = state.hub.remove_entry(&id).await;
    success(RemovedResponse { id, removed }, state.hub.revision().await)
}
