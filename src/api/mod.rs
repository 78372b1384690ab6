// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{log_errors, ApiError, ErrorBody},
    models::{
        DataVaultConfiguration, EncryptedDocument, HistoryEntry, HistoryOperation,
        IndexedAttribute, IndexedEntry, KeyReference, OneOrMany, SearchRequest,
    },
    state::AppState,
    storage::{EdvResult, StorageKind},
};

pub mod documents;
pub mod health;
pub mod vaults;

/// Run a storage-bound service call on the blocking thread pool.
///
/// Service calls do file or database I/O and may wait on a vault lock, so
/// they never run on a runtime worker.
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> EdvResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| ApiError::internal(format!("Storage task failed: {e}")))?
        .map_err(ApiError::from)
}

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route(
            "/edvs",
            get(vaults::list_vaults).post(vaults::create_vault),
        )
        .route("/edvs/{edv_id}", get(vaults::get_vault))
        .route("/edvs/{edv_id}/query", post(vaults::search_vault))
        .route("/edvs/{edv_id}/history", get(vaults::vault_history))
        .route("/edvs/{edv_id}/docs", post(documents::create_document))
        .route(
            "/edvs/{edv_id}/docs/{doc_id}",
            get(documents::get_document)
                .post(documents::update_document)
                .delete(documents::delete_document),
        )
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(log_errors))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        vaults::create_vault,
        vaults::list_vaults,
        vaults::get_vault,
        vaults::search_vault,
        vaults::vault_history,
        documents::create_document,
        documents::get_document,
        documents::update_document,
        documents::delete_document
    ),
    components(
        schemas(
            DataVaultConfiguration,
            KeyReference,
            OneOrMany,
            EncryptedDocument,
            IndexedEntry,
            IndexedAttribute,
            HistoryEntry,
            HistoryOperation,
            SearchRequest,
            StorageKind,
            ErrorBody,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Vaults", description = "Vault creation, search and history"),
        (name = "Documents", description = "Encrypted document storage")
    )
)]
struct ApiDoc;
