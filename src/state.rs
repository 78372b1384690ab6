// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use url::Url;

use crate::service::EdvService;
use crate::storage::StorageProvider;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EdvService>,
    /// Base URL prefixed to `Location` headers.
    pub public_url: Option<Url>,
}

impl AppState {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            service: Arc::new(EdvService::new(provider)),
            public_url: None,
        }
    }

    pub fn with_public_url(mut self, public_url: Option<Url>) -> Self {
        self.public_url = public_url;
        self
    }

    /// Absolute `Location` for a provider location reference.
    pub fn location(&self, reference: &str) -> String {
        match &self.public_url {
            Some(base) => format!("{}{reference}", base.as_str().trim_end_matches('/')),
            None => reference.to_string(),
        }
    }
}
