// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Service
//!
//! Orchestrates vault and document lifecycle on top of a
//! [`StorageProvider`]: parse the request body, persist the document, then
//! record history and update the index, in that order.
//!
//! Mutating operations on one vault are serialized by a per-vault lock held
//! across all three steps. Reads take no lock. Every operation does
//! blocking I/O, so async callers run it on the blocking pool.
//!
//! If history or index maintenance fails after the document write, the
//! document stays persisted; the failure is logged with the stage that
//! failed and returned to the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::models::{
    DataVaultConfiguration, EncryptedDocument, EqualsFilter, HistoryEntry, HistoryOperation,
    SearchRequest, SearchResults,
};
use crate::storage::{
    EdvError, EdvResult, HistoryRange, HistoryRepository, IndexRepository, StorageProvider,
};

/// Parse a JSON request body, mapping failures to a bad request.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> EdvResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| EdvError::bad_request(format!("Error parsing request body: {e}")))
}

// =============================================================================
// Vault Locks
// =============================================================================

/// Registry of per-vault write locks.
///
/// Entries are weak: a vault's lock lives only while some caller holds it,
/// and dead entries are pruned on the next lookup.
#[derive(Debug, Default)]
struct VaultLocks {
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl VaultLocks {
    fn get(&self, vault_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| lock.strong_count() > 0);
        if let Some(lock) = locks.get(vault_id).and_then(Weak::upgrade) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(vault_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    /// Number of registered vaults whose lock is still held somewhere.
    #[cfg(test)]
    fn live(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|lock| lock.strong_count() > 0).count()
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    // The guarded data is `()`, so a panic elsewhere cannot leave it torn.
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// EdvService
// =============================================================================

/// Vault and document operations exposed by the REST API.
#[derive(Debug)]
pub struct EdvService {
    provider: Arc<dyn StorageProvider>,
    locks: VaultLocks,
}

impl EdvService {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            provider,
            locks: VaultLocks::default(),
        }
    }

    pub fn provider(&self) -> &dyn StorageProvider {
        self.provider.as_ref()
    }

    fn history(&self) -> HistoryRepository<'_> {
        HistoryRepository::new(self.provider.as_ref())
    }

    fn index(&self) -> IndexRepository<'_> {
        IndexRepository::new(self.provider.as_ref())
    }

    /// Per-vault write lock. Fails with `NotFound` before registering
    /// anything if the vault does not exist.
    pub(crate) fn lock_vault(&self, vault_id: &str) -> EdvResult<Arc<Mutex<()>>> {
        if !self.provider.vault_exists(vault_id)? {
            return Err(EdvError::missing_vault(vault_id));
        }
        Ok(self.locks.get(vault_id))
    }

    /// Create a vault from a raw configuration body. Returns its location.
    pub fn create_vault(&self, body: &[u8]) -> EdvResult<String> {
        let config: DataVaultConfiguration = parse_body(body)?;
        let location = self.provider.create_vault(config)?;
        info!(location = %location, "EDV created");
        Ok(location)
    }

    /// Store a new document. Returns its location.
    pub fn create_document(&self, vault_id: &str, body: &[u8]) -> EdvResult<String> {
        let doc: EncryptedDocument = parse_body(body)?;

        let lock = self.lock_vault(vault_id)?;
        let _guard = acquire(&lock);

        let location = self.provider.create_document(vault_id, &doc)?;
        self.record(vault_id, &doc.id, HistoryOperation::Created)?;
        self.index()
            .apply_create(vault_id, &doc)
            .inspect_err(|e| log_partial_failure(vault_id, &doc.id, "index", e))?;

        info!(vault_id = %vault_id, doc_id = %doc.id, "Document created");
        Ok(location)
    }

    /// Raw stored JSON of a document.
    pub fn read_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<Vec<u8>> {
        self.provider.read_document(vault_id, doc_id)
    }

    /// Replace a document. An empty body `id` takes the path's `doc_id`;
    /// any other mismatch is rejected.
    pub fn update_document(&self, vault_id: &str, doc_id: &str, body: &[u8]) -> EdvResult<()> {
        let mut doc: EncryptedDocument = parse_body(body)?;
        if doc.id.is_empty() {
            doc.id = doc_id.to_string();
        } else if doc.id != doc_id {
            return Err(EdvError::bad_request(format!(
                "Document ID '{}' does not match '{doc_id}'",
                doc.id
            )));
        }

        let lock = self.lock_vault(vault_id)?;
        let _guard = acquire(&lock);

        self.provider.update_document(vault_id, doc_id, &doc)?;
        self.record(vault_id, doc_id, HistoryOperation::Updated)?;
        self.index()
            .apply_update(vault_id, &doc)
            .inspect_err(|e| log_partial_failure(vault_id, doc_id, "index", e))?;

        info!(vault_id = %vault_id, doc_id = %doc_id, "Document updated");
        Ok(())
    }

    pub fn delete_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<()> {
        let lock = self.lock_vault(vault_id)?;
        let _guard = acquire(&lock);

        self.provider.delete_document(vault_id, doc_id)?;
        self.record(vault_id, doc_id, HistoryOperation::Deleted)?;
        self.index()
            .apply_delete(vault_id, doc_id)
            .inspect_err(|e| log_partial_failure(vault_id, doc_id, "index", e))?;

        info!(vault_id = %vault_id, doc_id = %doc_id, "Document deleted");
        Ok(())
    }

    /// History entries of a vault inside `range`.
    pub fn history_entries(
        &self,
        vault_id: &str,
        range: HistoryRange,
    ) -> EdvResult<Vec<HistoryEntry>> {
        self.history().query(vault_id, range)
    }

    /// Equality search over one index of a vault.
    pub fn search(&self, vault_id: &str, request: &SearchRequest) -> EdvResult<SearchResults> {
        if !self.provider.vault_exists(vault_id)? {
            return Err(EdvError::missing_vault(vault_id));
        }

        let operator = request.operator();
        let index = self.index();
        let ids = match &request.equals {
            EqualsFilter::AllOf(subfilter) => {
                index.match_all(vault_id, &request.index, subfilter, &operator)?
            }
            EqualsFilter::AnyOf(subfilters) => {
                index.match_any(vault_id, &request.index, subfilters, &operator)?
            }
        };

        tracing::debug!(
            vault_id = %vault_id,
            index = %request.index,
            matches = ids.len(),
            "Search completed"
        );

        if !request.return_full_documents {
            return Ok(SearchResults::Ids(ids));
        }

        let mut documents: Vec<serde_json::Value> = Vec::with_capacity(ids.len());
        for doc_id in &ids {
            let bytes = match self.provider.read_document(vault_id, doc_id) {
                Ok(bytes) => bytes,
                Err(EdvError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            documents.push(serde_json::from_slice(&bytes)?);
        }
        Ok(SearchResults::Documents(documents))
    }

    fn record(&self, vault_id: &str, doc_id: &str, operation: HistoryOperation) -> EdvResult<()> {
        self.history()
            .record(vault_id, doc_id, operation)
            .inspect_err(|e| log_partial_failure(vault_id, doc_id, "history", e))?;
        Ok(())
    }
}

fn log_partial_failure(vault_id: &str, doc_id: &str, stage: &str, e: &EdvError) {
    error!(
        vault_id = %vault_id,
        doc_id = %doc_id,
        stage = stage,
        error = %e,
        "Document persisted but vault bookkeeping failed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryOperation;
    use crate::storage::{
        contract, ErrorKind, LocalStorage, RedbStorage, StoragePaths, SystemFile,
    };
    use serde_json::json;
    use std::thread;
    use tempfile::TempDir;

    fn local_service() -> (TempDir, EdvService) {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::open(StoragePaths::new(temp.path())).unwrap();
        (temp, EdvService::new(Arc::new(storage)))
    }

    fn vault_body(id: &str) -> Vec<u8> {
        serde_json::to_vec(&contract::vault_config(id)).unwrap()
    }

    fn doc_body(id: &str, index_id: &str, attrs: &[(&str, &str)]) -> Vec<u8> {
        serde_json::to_vec(&contract::document(id, index_id, attrs)).unwrap()
    }

    fn search(service: &EdvService, vault_id: &str, request: serde_json::Value) -> SearchResults {
        let request: SearchRequest = serde_json::from_value(request).unwrap();
        service.search(vault_id, &request).unwrap()
    }

    #[test]
    fn malformed_bodies_are_bad_requests() {
        let (_temp, service) = local_service();
        let err = service.create_vault(b"{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert!(err.to_string().starts_with("Error parsing request body:"));

        service.create_vault(&vault_body("v1")).unwrap();
        let err = service.create_document("v1", b"[]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn round_trip_scenario() {
        let (_temp, service) = local_service();
        assert_eq!(service.create_vault(&vault_body("v1")).unwrap(), "/edvs/v1");

        let location = service
            .create_document("v1", &doc_body("d1", "idx1", &[("type", "note")]))
            .unwrap();
        assert_eq!(location, "/edvs/v1/docs/d1");

        let query = json!({"index": "idx1", "equals": {"type": "note"}});
        assert_eq!(
            search(&service, "v1", query.clone()),
            SearchResults::Ids(vec!["d1".to_string()])
        );

        service.delete_document("v1", "d1").unwrap();
        assert_eq!(search(&service, "v1", query), SearchResults::Ids(vec![]));

        let ops: Vec<HistoryOperation> = service
            .history_entries("v1", HistoryRange::default())
            .unwrap()
            .into_iter()
            .map(|e| e.operation)
            .collect();
        assert_eq!(ops, vec![HistoryOperation::Created, HistoryOperation::Deleted]);
    }

    #[test]
    fn sequence_counts_every_mutation() {
        let (_temp, service) = local_service();
        service.create_vault(&vault_body("v1")).unwrap();

        service
            .create_document("v1", &doc_body("d1", "idx1", &[]))
            .unwrap();
        service
            .create_document("v1", &doc_body("d2", "idx1", &[]))
            .unwrap();
        service
            .update_document("v1", "d1", &doc_body("d1", "idx2", &[]))
            .unwrap();
        service.delete_document("v1", "d2").unwrap();

        let entries = service
            .history_entries("v1", HistoryRange::default())
            .unwrap();
        let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert_eq!(
            HistoryRepository::new(service.provider())
                .sequence("v1")
                .unwrap(),
            4
        );
    }

    #[test]
    fn failed_operations_do_not_advance_sequence() {
        let (_temp, service) = local_service();
        service.create_vault(&vault_body("v1")).unwrap();
        service
            .create_document("v1", &doc_body("d1", "idx1", &[]))
            .unwrap();

        let err = service
            .create_document("v1", &doc_body("d1", "idx1", &[]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(
            service.delete_document("v1", "ghost").unwrap_err().kind(),
            ErrorKind::NotFound
        );

        let history = HistoryRepository::new(service.provider());
        assert_eq!(history.sequence("v1").unwrap(), 1);
    }

    #[test]
    fn update_id_must_match_path() {
        let (_temp, service) = local_service();
        service.create_vault(&vault_body("v1")).unwrap();
        service
            .create_document("v1", &doc_body("d1", "idx1", &[]))
            .unwrap();

        let err = service
            .update_document("v1", "d1", &doc_body("d2", "idx1", &[]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);

        let mut body = contract::document("", "idx1", &[("type", "memo")]);
        body.sequence = 1;
        service
            .update_document("v1", "d1", &serde_json::to_vec(&body).unwrap())
            .unwrap();
        let stored: EncryptedDocument =
            serde_json::from_slice(&service.read_document("v1", "d1").unwrap()).unwrap();
        assert_eq!(stored.id, "d1");
        assert_eq!(stored.sequence, 1);
    }

    #[test]
    fn search_variants() {
        let (_temp, service) = local_service();
        service.create_vault(&vault_body("v1")).unwrap();
        service
            .create_document("v1", &doc_body("d1", "idx1", &[("type", "note")]))
            .unwrap();
        service
            .create_document("v1", &doc_body("d2", "idx1", &[("type", "memo")]))
            .unwrap();

        let all = search(&service, "v1", json!({"index": "idx1"}));
        assert_eq!(all, SearchResults::Ids(vec!["d1".into(), "d2".into()]));

        let any = search(
            &service,
            "v1",
            json!({"index": "idx1", "equals": [{"type": "memo"}, {"type": "note"}]}),
        );
        assert_eq!(any, SearchResults::Ids(vec!["d2".into(), "d1".into()]));

        let has = search(&service, "v1", json!({"index": "idx1", "has": ["type"]}));
        assert!(has.is_empty());

        let full = search(
            &service,
            "v1",
            json!({"index": "idx1", "equals": {"type": "note"}, "returnFullDocuments": true}),
        );
        match full {
            SearchResults::Documents(docs) => {
                assert_eq!(docs.len(), 1);
                assert_eq!(docs[0]["id"], "d1");
                assert!(docs[0]["jwe"].is_object());
            }
            other => panic!("expected documents, got {other:?}"),
        }
    }

    #[test]
    fn search_on_missing_vault_is_not_found() {
        let (_temp, service) = local_service();
        let request: SearchRequest = serde_json::from_value(json!({"index": "idx1"})).unwrap();
        let err = service.search("nope", &request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn lock_registry_stays_bounded() {
        let (_temp, service) = local_service();
        for i in 0..1000 {
            let vault_id = format!("no-such-vault-{i}");
            let err = service.delete_document(&vault_id, "d1").unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            service
                .create_document(&vault_id, &doc_body("d1", "idx1", &[]))
                .unwrap_err();
        }
        assert_eq!(
            service.delete_document("../escape", "d1").unwrap_err().kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(service.locks.registered(), 0);

        service.create_vault(&vault_body("v1")).unwrap();
        service.create_vault(&vault_body("v2")).unwrap();
        service
            .create_document("v1", &doc_body("d1", "idx1", &[]))
            .unwrap();
        service
            .create_document("v2", &doc_body("d1", "idx1", &[]))
            .unwrap();
        assert_eq!(service.locks.live(), 0);
        assert!(service.locks.registered() <= 1);
    }

    #[test]
    fn lock_is_shared_while_held() {
        let (_temp, service) = local_service();
        service.create_vault(&vault_body("v1")).unwrap();

        let held = service.lock_vault("v1").unwrap();
        let again = service.lock_vault("v1").unwrap();
        assert!(Arc::ptr_eq(&held, &again));
        assert_eq!(service.locks.live(), 1);

        drop(held);
        drop(again);
        assert_eq!(service.locks.live(), 0);
    }

    #[test]
    fn failed_index_write_keeps_document_and_history() {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path());
        let storage = LocalStorage::open(paths.clone()).unwrap();
        let service = EdvService::new(Arc::new(storage));
        service.create_vault(&vault_body("v1")).unwrap();

        let blocker = paths
            .system_file("v1", SystemFile::Index)
            .with_extension("tmp");
        std::fs::create_dir(&blocker).unwrap();

        let err = service
            .create_document("v1", &doc_body("d1", "idx1", &[("type", "note")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);

        assert!(service.provider().document_exists("v1", "d1").unwrap());
        let entries = service
            .history_entries("v1", HistoryRange::default())
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document_id, "d1");
        assert_eq!(entries[0].operation, HistoryOperation::Created);
        assert!(IndexRepository::new(service.provider())
            .resolve("v1", "idx1")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn concurrent_writes_keep_sequence_dense() {
        let temp = TempDir::new().unwrap();
        let storage = RedbStorage::open(temp.path().join("edv.redb")).unwrap();
        let service = Arc::new(EdvService::new(Arc::new(storage)));
        service.create_vault(&vault_body("v1")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    let doc_id = format!("d{i}");
                    service
                        .create_document("v1", &doc_body(&doc_id, "idx1", &[]))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let entries = service
            .history_entries("v1", HistoryRange::default())
            .unwrap();
        let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (1..=8).collect::<Vec<u64>>());

        let indexed = IndexRepository::new(service.provider())
            .resolve("v1", "idx1")
            .unwrap();
        assert_eq!(indexed.len(), 8);
    }
}
