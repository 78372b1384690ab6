// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error type shared by storage providers, repositories and the vault service.
//!
//! The core never speaks HTTP: every error carries an [`ErrorKind`] tag and
//! the API layer maps that tag to a status code.

use std::io;

/// Coarse classification used at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    AlreadyExists,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum EdvError {
    /// Malformed payload, invalid identifier or invalid system file kind.
    #[error("{0}")]
    BadRequest(String),

    /// Vault or document does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Vault or document ID already taken.
    #[error("{0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Persisted state could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] redb::Error),
}

impl EdvError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        EdvError::BadRequest(message.into())
    }

    pub fn missing_vault(vault_id: &str) -> Self {
        EdvError::NotFound(format!("Could not find EDV with ID '{vault_id}'"))
    }

    pub fn missing_document(vault_id: &str, doc_id: &str) -> Self {
        EdvError::NotFound(format!(
            "Could not find document with ID '{doc_id}' in EDV with ID '{vault_id}'"
        ))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EdvError::BadRequest(_) => ErrorKind::BadRequest,
            EdvError::NotFound(_) => ErrorKind::NotFound,
            EdvError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            EdvError::Io(_) | EdvError::Json(_) | EdvError::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for vault operations.
pub type EdvResult<T> = Result<T, EdvError>;
