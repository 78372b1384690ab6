// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! History log and sequence counter of a vault.
//!
//! Every mutating document operation bumps `config.sequence` by exactly one
//! and appends a matching [`HistoryEntry`]. The config is written before the
//! history, as two separate provider calls; if the second write fails the
//! vault keeps the bumped sequence without an entry. Callers serialize
//! recording per vault (see [`crate::service::EdvService`]).

use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

use super::super::{EdvResult, StorageProvider, StorageProviderExt, SystemFile};
use crate::models::{DataVaultConfiguration, HistoryEntry, HistoryOperation};

/// Exclusive sequence bounds for history queries.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, IntoParams, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HistoryRange {
    /// Only entries with a sequence strictly greater than this.
    pub after_sequence: Option<u64>,
    /// Only entries with a sequence strictly less than this.
    pub before_sequence: Option<u64>,
}

impl HistoryRange {
    pub fn contains(&self, sequence: u64) -> bool {
        sequence > self.after_sequence.unwrap_or(0)
            && sequence < self.before_sequence.unwrap_or(u64::MAX)
    }

    /// Keep only the entries inside the range, preserving order.
    pub fn filter(&self, entries: Vec<HistoryEntry>) -> Vec<HistoryEntry> {
        entries
            .into_iter()
            .filter(|entry| self.contains(entry.sequence))
            .collect()
    }
}

/// Repository for a vault's history log and sequence counter.
pub struct HistoryRepository<'a> {
    provider: &'a dyn StorageProvider,
}

impl<'a> HistoryRepository<'a> {
    pub fn new(provider: &'a dyn StorageProvider) -> Self {
        Self { provider }
    }

    /// Current value of the vault's sequence counter.
    pub fn sequence(&self, vault_id: &str) -> EdvResult<u64> {
        let config: DataVaultConfiguration = self
            .provider
            .read_system_json(vault_id, SystemFile::Config)?;
        Ok(config.sequence)
    }

    /// Full history log, oldest first.
    pub fn entries(&self, vault_id: &str) -> EdvResult<Vec<HistoryEntry>> {
        self.provider.read_system_json(vault_id, SystemFile::History)
    }

    /// History entries inside `range`.
    pub fn query(&self, vault_id: &str, range: HistoryRange) -> EdvResult<Vec<HistoryEntry>> {
        Ok(range.filter(self.entries(vault_id)?))
    }

    /// Bump the sequence counter and append an entry for `doc_id`.
    pub fn record(
        &self,
        vault_id: &str,
        doc_id: &str,
        operation: HistoryOperation,
    ) -> EdvResult<HistoryEntry> {
        let mut config: DataVaultConfiguration = self
            .provider
            .read_system_json(vault_id, SystemFile::Config)?;
        let mut entries = self.entries(vault_id)?;

        config.sequence += 1;
        let entry = HistoryEntry {
            document_id: doc_id.to_string(),
            sequence: config.sequence,
            operation,
        };
        entries.push(entry.clone());

        self.provider
            .write_system_json(vault_id, SystemFile::Config, &config)?;
        self.provider
            .write_system_json(vault_id, SystemFile::History, &entries)?;

        tracing::debug!(
            vault_id = %vault_id,
            doc_id = %doc_id,
            sequence = entry.sequence,
            operation = %operation,
            "History entry recorded"
        );
        Ok(entry)
    }
}
