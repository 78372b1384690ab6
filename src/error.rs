// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP error responses and error logging.
//!
//! Every failed request produces a `{"message": ..., "success": false}` body.
//! [`log_errors`] logs each error response once, tagged with the request's
//! correlation ID.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{EdvError, ErrorKind};

/// Header carrying the request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorBody {
    pub message: String,
    pub success: bool,
}

/// Error message attached to the response for [`log_errors`].
#[derive(Debug, Clone)]
struct ErrorMessage(String);

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<EdvError> for ApiError {
    fn from(err: EdvError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::BadRequest => Self::bad_request(message),
            ErrorKind::NotFound => Self::not_found(message),
            ErrorKind::AlreadyExists => Self::conflict(message),
            ErrorKind::Internal => Self::internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            message: self.message.clone(),
            success: false,
        });
        let mut response = (self.status, body).into_response();
        response.extensions_mut().insert(ErrorMessage(self.message));
        response
    }
}

// =============================================================================
// Error Logging Middleware
// =============================================================================

/// Correlation ID of a request: its `x-request-id`, or a fresh UUID.
fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Log every response produced by an [`ApiError`].
pub async fn log_errors(request: Request, next: Next) -> Response {
    let id = correlation_id(request.headers());
    let method = request.method().clone();
    let url = request.uri().clone();

    let response = next.run(request).await;

    if let Some(ErrorMessage(message)) = response.extensions().get::<ErrorMessage>() {
        let status = response.status();
        if status.is_server_error() {
            tracing::error!(
                id = %id,
                url = %url,
                method = %method,
                status = status.as_u16(),
                message = %message,
                "Request failed"
            );
        } else {
            tracing::warn!(
                id = %id,
                url = %url,
                method = %method,
                status = status.as_u16(),
                message = %message,
                "Request failed"
            );
        }
    }
    response
}
