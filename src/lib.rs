// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EDV Server - Encrypted Data Vault storage service
//!
//! Stores documents that clients encrypt before upload. The server keeps a
//! per-vault history log and an index of client-computed HMAC tags so that
//! clients can run equality searches without revealing plaintext.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `service` - Vault and document lifecycle
//! - `storage` - Storage providers, history and index repositories
//! - `models` - Wire and persistence types

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod service;
pub mod state;
pub mod storage;

use tracing_subscriber::EnvFilter;

use config::{LogFormat, DEFAULT_LOG_FILTER};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.with_target(false).init(),
    }
}
