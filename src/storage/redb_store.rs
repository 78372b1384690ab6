// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded vault storage backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `vaults`: vault_id → ()
//! - `documents`: `vault_id/doc_id` → pretty-printed document JSON
//! - `system_files`: `vault_id/kind` → raw system file bytes
//!
//! IDs never contain `/`, so composite keys are unambiguous and all keys of
//! one vault share the `vault_id/` prefix.

use std::path::{Path, PathBuf};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{
    document_location, initial_system_files, prepare_vault_config, validate_id,
    vault_location, EdvError, EdvResult, StorageDescriptor, StorageKind, StorageProvider,
    SystemFile,
};
use crate::models::{DataVaultConfiguration, EncryptedDocument};

// =============================================================================
// Table Definitions
// =============================================================================

const VAULTS: TableDefinition<&str, ()> = TableDefinition::new("vaults");

const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

const SYSTEM_FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("system_files");

/// Key under which the health check writes.
const HEALTH_KEY: &str = ".health_check";

// =============================================================================
// Error Conversions
// =============================================================================

macro_rules! from_redb_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for EdvError {
                fn from(e: $source) -> Self {
                    EdvError::Database(e.into())
                }
            }
        )*
    };
}

from_redb_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

// =============================================================================
// Key Helpers
// =============================================================================

fn document_key(vault_id: &str, doc_id: &str) -> String {
    format!("{vault_id}/{doc_id}")
}

fn system_key(vault_id: &str, kind: SystemFile) -> String {
    format!("{vault_id}/{}", kind.as_str())
}

/// Half-open key range covering every `vault_id/...` key.
///
/// `0` is the byte after `/`, so `vault_id0` bounds the prefix.
fn vault_range(vault_id: &str) -> (String, String) {
    (format!("{vault_id}/"), format!("{vault_id}0"))
}

// =============================================================================
// RedbStorage
// =============================================================================

/// redb-backed [`StorageProvider`]. Each call is one read or write
/// transaction.
pub struct RedbStorage {
    db: Database,
    path: PathBuf,
}

impl std::fmt::Debug for RedbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStorage").field("path", &self.path).finish()
    }
}

impl RedbStorage {
    /// Open (or create) the database at the given path.
    pub fn open(path: impl AsRef<Path>) -> EdvResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(VAULTS)?;
            let _ = write_txn.open_table(DOCUMENTS)?;
            let _ = write_txn.open_table(SYSTEM_FILES)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    fn ensure_vault(&self, vault_id: &str) -> EdvResult<()> {
        if self.vault_exists(vault_id)? {
            Ok(())
        } else {
            Err(EdvError::missing_vault(vault_id))
        }
    }
}

impl StorageProvider for RedbStorage {
    fn descriptor(&self) -> StorageDescriptor {
        StorageDescriptor {
            kind: StorageKind::Redb,
            root: self.path.clone(),
        }
    }

    fn health_check(&self) -> EdvResult<()> {
        let test_data: &[u8] = b"health_check_data";

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SYSTEM_FILES)?;
            table.insert(HEALTH_KEY, test_data)?;
        }
        write_txn.commit()?;

        let read_data = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(SYSTEM_FILES)?;
            let value = table.get(HEALTH_KEY)?.map(|v| v.value().to_vec());
            value
        };

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SYSTEM_FILES)?;
            table.remove(HEALTH_KEY)?;
        }
        write_txn.commit()?;

        if read_data.as_deref() != Some(test_data) {
            return Err(EdvError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Health check data mismatch",
            )));
        }
        Ok(())
    }

    fn create_vault(&self, config: DataVaultConfiguration) -> EdvResult<String> {
        let config = prepare_vault_config(config)?;
        let files = initial_system_files(&config, &self.descriptor())?;

        let write_txn = self.db.begin_write()?;
        {
            let mut vaults = write_txn.open_table(VAULTS)?;
            if vaults.get(config.id.as_str())?.is_some() {
                return Err(EdvError::AlreadyExists(format!(
                    "EDV with ID '{}' already exists",
                    config.id
                )));
            }
            vaults.insert(config.id.as_str(), ())?;

            let mut system = write_txn.open_table(SYSTEM_FILES)?;
            for (kind, bytes) in &files {
                system.insert(system_key(&config.id, *kind).as_str(), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;

        Ok(vault_location(&config.id))
    }

    fn vault_exists(&self, vault_id: &str) -> EdvResult<bool> {
        validate_id("EDV", vault_id)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(VAULTS)?;
        let exists = table.get(vault_id)?.is_some();
        Ok(exists)
    }

    fn create_document(&self, vault_id: &str, doc: &EncryptedDocument) -> EdvResult<String> {
        self.ensure_vault(vault_id)?;
        validate_id("document", &doc.id)?;
        let key = document_key(vault_id, &doc.id);
        let json = serde_json::to_vec_pretty(doc)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            if table.get(key.as_str())?.is_some() {
                return Err(EdvError::AlreadyExists(format!(
                    "Document with ID '{}' already exists in EDV with ID '{vault_id}'",
                    doc.id
                )));
            }
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;

        Ok(document_location(vault_id, &doc.id))
    }

    fn read_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<Vec<u8>> {
        self.ensure_vault(vault_id)?;
        validate_id("document", doc_id)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        let value = table
            .get(document_key(vault_id, doc_id).as_str())?
            .map(|v| v.value().to_vec());
        value.ok_or_else(|| EdvError::missing_document(vault_id, doc_id))
    }

    fn update_document(
        &self,
        vault_id: &str,
        doc_id: &str,
        doc: &EncryptedDocument,
    ) -> EdvResult<()> {
        self.ensure_vault(vault_id)?;
        validate_id("document", doc_id)?;
        let key = document_key(vault_id, doc_id);
        let json = serde_json::to_vec_pretty(doc)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            if table.get(key.as_str())?.is_none() {
                return Err(EdvError::missing_document(vault_id, doc_id));
            }
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<()> {
        self.ensure_vault(vault_id)?;
        validate_id("document", doc_id)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            if table.remove(document_key(vault_id, doc_id).as_str())?.is_none() {
                return Err(EdvError::missing_document(vault_id, doc_id));
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn document_exists(&self, vault_id: &str, doc_id: &str) -> EdvResult<bool> {
        self.ensure_vault(vault_id)?;
        validate_id("document", doc_id)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        let exists = table
            .get(document_key(vault_id, doc_id).as_str())?
            .is_some();
        Ok(exists)
    }

    fn list_documents(&self, vault_id: &str) -> EdvResult<Vec<String>> {
        self.ensure_vault(vault_id)?;
        let (start, end) = vault_range(vault_id);
        let prefix_len = start.len();

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        let mut ids = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (key, _) = entry?;
            ids.push(key.value()[prefix_len..].to_string());
        }
        Ok(ids)
    }

    fn read_system_file(&self, vault_id: &str, kind: SystemFile) -> EdvResult<Vec<u8>> {
        self.ensure_vault(vault_id)?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SYSTEM_FILES)?;
        let value = table
            .get(system_key(vault_id, kind).as_str())?
            .map(|v| v.value().to_vec());
        value.ok_or_else(|| {
            EdvError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("System file '{kind}' missing for EDV with ID '{vault_id}'"),
            ))
        })
    }

    fn write_system_file(&self, vault_id: &str, kind: SystemFile, data: &[u8]) -> EdvResult<()> {
        self.ensure_vault(vault_id)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SYSTEM_FILES)?;
            table.insert(system_key(vault_id, kind).as_str(), data)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_system_file(&self, vault_id: &str, kind: SystemFile) -> EdvResult<()> {
        self.ensure_vault(vault_id)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SYSTEM_FILES)?;
            table.remove(system_key(vault_id, kind).as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
