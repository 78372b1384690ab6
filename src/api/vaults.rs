// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::run_blocking;
use crate::{
    error::{ApiError, ErrorBody},
    models::{DataVaultConfiguration, HistoryEntry, SearchRequest, SearchResults},
    service::parse_body,
    state::AppState,
    storage::HistoryRange,
};

#[utoipa::path(
    post,
    path = "/edvs",
    request_body = DataVaultConfiguration,
    tag = "Vaults",
    responses(
        (status = 201, description = "EDV created", headers(("Location" = String))),
        (status = 400, body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn create_vault(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let service = Arc::clone(&state.service);
    let reference = run_blocking(move || service.create_vault(&body)).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, state.location(&reference))],
    ))
}

/// Reserved. Vault listing is not implemented.
#[utoipa::path(
    get,
    path = "/edvs",
    tag = "Vaults",
    responses((status = 200))
)]
pub async fn list_vaults() -> StatusCode {
    StatusCode::OK
}

/// Reserved. Vault retrieval is not implemented.
#[utoipa::path(
    get,
    path = "/edvs/{edvId}",
    params(("edvId" = String, Path, description = "EDV identifier")),
    tag = "Vaults",
    responses((status = 200))
)]
pub async fn get_vault(Path(_edv_id): Path<String>) -> StatusCode {
    StatusCode::OK
}

#[utoipa::path(
    post,
    path = "/edvs/{edvId}/query",
    params(("edvId" = String, Path, description = "EDV identifier")),
    request_body = SearchRequest,
    tag = "Vaults",
    responses(
        (status = 200, description = "Matching document IDs, or full documents when `returnFullDocuments` is set", body = [String]),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn search_vault(
    State(state): State<AppState>,
    Path(edv_id): Path<String>,
    body: Bytes,
) -> Result<Json<SearchResults>, ApiError> {
    let request: SearchRequest = parse_body(&body)?;
    let service = state.service;
    let results = run_blocking(move || service.search(&edv_id, &request)).await?;
    Ok(Json(results))
}

#[utoipa::path(
    get,
    path = "/edvs/{edvId}/history",
    params(
        ("edvId" = String, Path, description = "EDV identifier"),
        HistoryRange
    ),
    tag = "Vaults",
    responses(
        (status = 200, body = [HistoryEntry]),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn vault_history(
    State(state): State<AppState>,
    Path(edv_id): Path<String>,
    range: Result<Query<HistoryRange>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let Query(range) = range.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let service = state.service;
    let entries = run_blocking(move || service.history_entries(&edv_id, range)).await?;
    Ok(Json(entries))
}
