// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};

use super::run_blocking;
use crate::{
    error::{ApiError, ErrorBody},
    models::EncryptedDocument,
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/edvs/{edvId}/docs",
    params(("edvId" = String, Path, description = "EDV identifier")),
    request_body = EncryptedDocument,
    tag = "Documents",
    responses(
        (status = 201, description = "Document stored", headers(("Location" = String))),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn create_document(
    State(state): State<AppState>,
    Path(edv_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let service = Arc::clone(&state.service);
    let reference = run_blocking(move || service.create_document(&edv_id, &body)).await?;
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, state.location(&reference))],
    ))
}

/// Returns the stored document JSON exactly as persisted.
#[utoipa::path(
    get,
    path = "/edvs/{edvId}/docs/{docId}",
    params(
        ("edvId" = String, Path, description = "EDV identifier"),
        ("docId" = String, Path, description = "Document identifier")
    ),
    tag = "Documents",
    responses(
        (status = 200, body = EncryptedDocument),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_document(
    State(state): State<AppState>,
    Path((edv_id, doc_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let service = Arc::clone(&state.service);
    let bytes = run_blocking(move || service.read_document(&edv_id, &doc_id)).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], bytes))
}

#[utoipa::path(
    post,
    path = "/edvs/{edvId}/docs/{docId}",
    params(
        ("edvId" = String, Path, description = "EDV identifier"),
        ("docId" = String, Path, description = "Document identifier")
    ),
    request_body = EncryptedDocument,
    tag = "Documents",
    responses(
        (status = 204, description = "Document updated"),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn update_document(
    State(state): State<AppState>,
    Path((edv_id, doc_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let service = Arc::clone(&state.service);
    run_blocking(move || service.update_document(&edv_id, &doc_id, &body)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/edvs/{edvId}/docs/{docId}",
    params(
        ("edvId" = String, Path, description = "EDV identifier"),
        ("docId" = String, Path, description = "Document identifier")
    ),
    tag = "Documents",
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn delete_document(
    State(state): State<AppState>,
    Path((edv_id, doc_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let service = state.service;
    run_blocking(move || service.delete_document(&edv_id, &doc_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{contract, LocalStorage, StoragePaths};
    use axum::body::to_bytes;
    use tempfile::TempDir;
    use url::Url;

    fn setup() -> (TempDir, AppState) {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::open(StoragePaths::new(temp.path())).unwrap();
        let state = AppState::new(Arc::new(storage));
        let config = serde_json::to_vec(&contract::vault_config("v1")).unwrap();
        state.service.create_vault(&config).unwrap();
        (temp, state)
    }

    fn doc_body(id: &str) -> Bytes {
        let doc = contract::document(id, "idx1", &[("type", "note")]);
        Bytes::from(serde_json::to_vec(&doc).unwrap())
    }

    fn path(doc_id: &str) -> Path<(String, String)> {
        Path(("v1".to_string(), doc_id.to_string()))
    }

    #[tokio::test]
    async fn create_then_get_returns_stored_json() {
        let (_temp, state) = setup();
        let state = state.with_public_url(Some(Url::parse("https://edv.example.com").unwrap()));

        let response = create_document(State(state.clone()), Path("v1".into()), doc_body("d1"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://edv.example.com/edvs/v1/docs/d1"
        );

        let response = get_document(State(state), path("d1"))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: EncryptedDocument = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc, contract::document("d1", "idx1", &[("type", "note")]));
    }

    #[tokio::test]
    async fn create_in_missing_vault_is_not_found() {
        let (_temp, state) = setup();
        let err = create_document(State(state), Path("nope".into()), doc_body("d1"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_and_delete_return_no_content() {
        let (_temp, state) = setup();
        state
            .service
            .create_document("v1", &doc_body("d1"))
            .unwrap();

        let status = update_document(State(state.clone()), path("d1"), doc_body("d1"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let status = delete_document(State(state.clone()), path("d1"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let err = get_document(State(state), path("d1")).await.err().unwrap();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(
            err.message,
            "Could not find document with ID 'd1' in EDV with ID 'v1'"
        );
    }

    #[tokio::test]
    async fn update_with_mismatched_id_is_bad_request() {
        let (_temp, state) = setup();
        state
            .service
            .create_document("v1", &doc_body("d1"))
            .unwrap();

        let err = update_document(State(state), path("d1"), doc_body("d2"))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
