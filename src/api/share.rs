//! Share link endpoints.

use axum::{
    extract::{rejection::JsonRejection, RawQuery, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;

use super::{error, json_body, success, ApiResult};
use crate::errors::AppError;
use crate::models::ShareLink;
use crate::snapshot::InboundOutcome;
use crate::AppState;

/// Header reporting what the import did with the link.
pub const IMPORT_OUTCOME_HEADER: &str = "x-snapshot-outcome";

/// POST /api/share - Encode the current state into a share link.
pub async fn share(State(state): State<AppState>) -> ApiResult<ShareLink> {
    let revision_id = state.hub.revision().await;

    match state.hub.generate_share_token().await {
        Ok(link) => success(link, revision_id),
        Err(e) => error(e, revision_id),
    }
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub token: String,
}

/// POST /api/snapshot - Apply a bare snapshot token.
///
/// An undecodable token leaves state untouched and answers 400.
pub async fn import_snapshot(
    State(state): State<AppState>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> ApiResult<InboundOutcome> {
    let request = json_body(body, state.hub.revision().await)?;
    match state.hub.import_token(&request.token).await {
        Ok(outcome) => success(outcome, state.hub.revision().await),
        Err(e) => error(AppError::from(e), state.hub.revision().await),
    }
}

/// GET /api/import?snapshot=..&snapshotAt=.. - Apply an inbound link.
///
/// The query is read as if it were on the public address. The response
/// redirects there with the snapshot parameters removed, whatever the outcome.
pub async fn import(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    let mut address = state.config.public_url.clone();
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        if let Some(cut) = address.find(['?', '#']) {
            address.truncate(cut);
        }
        address.push('?');
        address.push_str(&query);
    }

    let (outcome, stripped) = state.hub.import_link(&address).await;
    let label = match outcome {
        InboundOutcome::NoToken => "noToken",
        InboundOutcome::Applied { .. } => "applied",
        InboundOutcome::Rejected { .. } => "rejected",
    };

    ([(IMPORT_OUTCOME_HEADER, label)], Redirect::to(&stripped)).into_response()
}
