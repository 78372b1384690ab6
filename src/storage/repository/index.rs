// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted index maintenance and equality search.
//!
//! The index file holds two maps that are kept inverse to each other:
//! `docIds` (index ID → documents) and `indexIds` (document → index IDs).
//! Deltas are applied per document mutation as a read-modify-write of the
//! whole file.
//!
//! Known behaviour kept as-is:
//! - creating the same document twice appends its ID to `docIds` twice;
//! - updating a document never retracts index IDs it no longer carries.

use tracing::warn;

use super::super::{EdvError, EdvResult, StorageProvider, StorageProviderExt, SystemFile};
use crate::models::{EncryptedDocument, EncryptedIndex, MatchOperator, Subfilter};

// =============================================================================
// Index Deltas
// =============================================================================

impl EncryptedIndex {
    /// Documents tagged by `index_id`, in insertion order.
    pub fn documents_for(&self, index_id: &str) -> &[String] {
        self.doc_ids.get(index_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record a newly created document. Returns `false` if it carries no
    /// index entries.
    pub fn record_created(&mut self, doc: &EncryptedDocument) -> bool {
        if doc.indexed.is_empty() {
            return false;
        }

        let mut index_ids: Vec<String> = Vec::with_capacity(doc.indexed.len());
        for entry in &doc.indexed {
            let index_id = entry.index_id();
            self.doc_ids
                .entry(index_id.to_string())
                .or_default()
                .push(doc.id.clone());
            if !index_ids.iter().any(|id| id == index_id) {
                index_ids.push(index_id.to_string());
            }
        }
        self.index_ids.insert(doc.id.clone(), index_ids);
        true
    }

    /// Record an updated document. Returns `false` if it carries no index
    /// entries.
    pub fn record_updated(&mut self, doc: &EncryptedDocument) -> bool {
        if doc.indexed.is_empty() {
            return false;
        }

        for entry in &doc.indexed {
            let index_id = entry.index_id();

            let docs = self.doc_ids.entry(index_id.to_string()).or_default();
            if !docs.contains(&doc.id) {
                docs.push(doc.id.clone());
            }

            let indexes = self.index_ids.entry(doc.id.clone()).or_default();
            if !indexes.iter().any(|id| id == index_id) {
                indexes.push(index_id.to_string());
            }
        }
        true
    }

    /// Drop every trace of `doc_id`. Returns `false` if it was not indexed.
    pub fn remove_document(&mut self, doc_id: &str) -> bool {
        let Some(index_ids) = self.index_ids.remove(doc_id) else {
            return false;
        };

        for index_id in index_ids {
            if let Some(docs) = self.doc_ids.get_mut(&index_id) {
                docs.retain(|id| id != doc_id);
                if docs.is_empty() {
                    self.doc_ids.remove(&index_id);
                }
            }
        }
        true
    }
}

/// Whether `doc` satisfies every attribute of `subfilter` within `index_id`.
fn matches_subfilter(doc: &EncryptedDocument, index_id: &str, subfilter: &Subfilter) -> bool {
    if subfilter.is_empty() {
        return true;
    }
    let Some(entry) = doc.entry_for(index_id) else {
        return false;
    };
    subfilter.iter().all(|(name, expected)| {
        entry
            .attributes
            .iter()
            .any(|attr| &attr.name == name && &attr.value == expected)
    })
}

// =============================================================================
// IndexRepository
// =============================================================================

/// Repository for a vault's encrypted index.
pub struct IndexRepository<'a> {
    provider: &'a dyn StorageProvider,
}

impl<'a> IndexRepository<'a> {
    pub fn new(provider: &'a dyn StorageProvider) -> Self {
        Self { provider }
    }

    pub fn load(&self, vault_id: &str) -> EdvResult<EncryptedIndex> {
        self.provider.read_system_json(vault_id, SystemFile::Index)
    }

    pub fn save(&self, vault_id: &str, index: &EncryptedIndex) -> EdvResult<()> {
        self.provider
            .write_system_json(vault_id, SystemFile::Index, index)
    }

    /// Apply the index delta of a created document.
    pub fn apply_create(&self, vault_id: &str, doc: &EncryptedDocument) -> EdvResult<()> {
        if doc.indexed.is_empty() {
            return Ok(());
        }
        let mut index = self.load(vault_id)?;
        index.record_created(doc);
        self.save(vault_id, &index)
    }

    /// Apply the index delta of an updated document.
    pub fn apply_update(&self, vault_id: &str, doc: &EncryptedDocument) -> EdvResult<()> {
        if doc.indexed.is_empty() {
            return Ok(());
        }
        let mut index = self.load(vault_id)?;
        index.record_updated(doc);
        self.save(vault_id, &index)
    }

    /// Remove a deleted document from both maps.
    pub fn apply_delete(&self, vault_id: &str, doc_id: &str) -> EdvResult<()> {
        let mut index = self.load(vault_id)?;
        if index.remove_document(doc_id) {
            self.save(vault_id, &index)?;
        }
        Ok(())
    }

    /// Documents recorded under `index_id`.
    pub fn resolve(&self, vault_id: &str, index_id: &str) -> EdvResult<Vec<String>> {
        Ok(self.load(vault_id)?.documents_for(index_id).to_vec())
    }

    /// Documents of `index_id` matching every attribute of `subfilter`.
    ///
    /// Unsupported operators match nothing. Documents that disappeared from
    /// storage or no longer parse are skipped.
    pub fn match_all(
        &self,
        vault_id: &str,
        index_id: &str,
        subfilter: &Subfilter,
        operator: &MatchOperator,
    ) -> EdvResult<Vec<String>> {
        if let MatchOperator::Unsupported(name) = operator {
            warn!(vault_id = %vault_id, operator = %name, "Unsupported search operator");
            return Ok(Vec::new());
        }

        let mut matched: Vec<String> = Vec::new();
        for doc_id in self.resolve(vault_id, index_id)? {
            if matched.contains(&doc_id) {
                continue;
            }

            let doc = match self.provider.load_document(vault_id, &doc_id) {
                Ok(doc) => doc,
                Err(EdvError::NotFound(_)) => {
                    tracing::debug!(vault_id = %vault_id, doc_id = %doc_id, "Indexed document no longer exists");
                    continue;
                }
                Err(EdvError::Json(e)) => {
                    warn!(vault_id = %vault_id, doc_id = %doc_id, error = %e, "Skipping unparseable document");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if matches_subfilter(&doc, index_id, subfilter) {
                matched.push(doc_id);
            }
        }
        Ok(matched)
    }

    /// Deduplicated union of [`Self::match_all`] over each subfilter, in
    /// first-seen order.
    pub fn match_any(
        &self,
        vault_id: &str,
        index_id: &str,
        subfilters: &[Subfilter],
        operator: &MatchOperator,
    ) -> EdvResult<Vec<String>> {
        let mut matched: Vec<String> = Vec::new();
        for subfilter in subfilters {
            for doc_id in self.match_all(vault_id, index_id, subfilter, operator)? {
                if !matched.contains(&doc_id) {
                    matched.push(doc_id);
                }
            }
        }
        Ok(matched)
    }
}
