// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Storage Module
//!
//! Pluggable persistence for encrypted data vaults. A [`StorageProvider`]
//! namespaces documents and four system files per vault; everything above
//! it (history, index, the vault service) only talks to the trait.
//!
//! ## Backends
//!
//! - [`LocalStorage`]: JSON files on the local filesystem (reference backend)
//! - [`RedbStorage`]: a single embedded redb database file
//!
//! ## Local Storage Layout
//!
//! ```text
//! {root}/
//!   edvs/{vault_id}/
//!     config.json     # Vault configuration (holds the sequence counter)
//!     history.json    # Append-only history log
//!     index.json      # Encrypted index maps
//!     storage.json    # Storage descriptor
//!     docs/
//!       {doc_id}.json # Encrypted documents
//! ```
//!
//! ## Concurrency
//!
//! Providers make each single call atomic (temp file + rename, or one redb
//! write transaction) but do not lock across calls. Multi-call sequences
//! are serialized per vault by [`crate::service::EdvService`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{DataVaultConfiguration, EncryptedDocument, EncryptedIndex, HistoryEntry};

pub mod error;
pub mod local;
pub mod paths;
pub mod redb_store;
pub mod repository;

pub use error::{EdvError, EdvResult, ErrorKind};
pub use local::LocalStorage;
pub use paths::StoragePaths;
pub use redb_store::RedbStorage;
pub use repository::{HistoryRange, HistoryRepository, IndexRepository};

/// Longest accepted vault or document identifier, in bytes.
pub const MAX_ID_LEN: usize = 256;

// =============================================================================
// System Files
// =============================================================================

/// Per-vault system files maintained alongside the documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemFile {
    Config,
    History,
    Index,
    StorageDescriptor,
}

impl SystemFile {
    pub const ALL: [SystemFile; 4] = [
        SystemFile::Config,
        SystemFile::History,
        SystemFile::Index,
        SystemFile::StorageDescriptor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SystemFile::Config => "config",
            SystemFile::History => "history",
            SystemFile::Index => "index",
            SystemFile::StorageDescriptor => "storage",
        }
    }

    /// File name used by the local backend.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

impl fmt::Display for SystemFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemFile {
    type Err = EdvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SystemFile::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EdvError::bad_request(format!("Invalid file type '{s}'")))
    }
}

// =============================================================================
// Storage Descriptor
// =============================================================================

/// Backend type recorded in a storage descriptor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Redb,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageKind::Local),
            "redb" => Ok(StorageKind::Redb),
            other => Err(format!("Unknown storage type '{other}'")),
        }
    }
}

/// Which backend (and where) a vault was created with.
///
/// Persisted as the vault's `storage` system file so the provider can be
/// reconstructed without outside configuration.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct StorageDescriptor {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    /// Data directory (local) or database file (redb).
    #[schema(value_type = String)]
    pub root: PathBuf,
}

/// Build a provider from a descriptor.
pub fn open_provider(descriptor: &StorageDescriptor) -> EdvResult<Arc<dyn StorageProvider>> {
    let provider: Arc<dyn StorageProvider> = match descriptor.kind {
        StorageKind::Local => Arc::new(LocalStorage::open(StoragePaths::new(&descriptor.root))?),
        StorageKind::Redb => Arc::new(RedbStorage::open(&descriptor.root)?),
    };
    Ok(provider)
}

// =============================================================================
// Provider Trait
// =============================================================================

/// Backing store for vaults, documents and system files.
///
/// Every method fails with [`EdvError::NotFound`] when the vault namespace
/// does not exist. Documents are stored as pretty-printed JSON and handed
/// back as raw bytes.
pub trait StorageProvider: Send + Sync + fmt::Debug {
    /// Descriptor of this provider instance.
    fn descriptor(&self) -> StorageDescriptor;

    /// Write-read-delete check of the backing store.
    fn health_check(&self) -> EdvResult<()>;

    /// Create the vault namespace and its initial system files.
    ///
    /// Assigns a fresh UUID when `config.id` is empty and resets the
    /// sequence to zero. Returns the vault's location reference.
    fn create_vault(&self, config: DataVaultConfiguration) -> EdvResult<String>;

    fn vault_exists(&self, vault_id: &str) -> EdvResult<bool>;

    /// Persist a new document. Does not touch history or index.
    fn create_document(&self, vault_id: &str, doc: &EncryptedDocument) -> EdvResult<String>;

    fn read_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<Vec<u8>>;

    /// Overwrite an existing document.
    fn update_document(
        &self,
        vault_id: &str,
        doc_id: &str,
        doc: &EncryptedDocument,
    ) -> EdvResult<()>;

    fn delete_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<()>;

    fn document_exists(&self, vault_id: &str, doc_id: &str) -> EdvResult<bool>;

    /// IDs of all documents in a vault, in no particular order.
    ///
    /// Part of the provider contract for inspecting a backend; the request
    /// path resolves documents through the index instead.
    fn list_documents(&self, vault_id: &str) -> EdvResult<Vec<String>>;

    fn read_system_file(&self, vault_id: &str, kind: SystemFile) -> EdvResult<Vec<u8>>;

    /// Replace a system file's contents.
    fn write_system_file(&self, vault_id: &str, kind: SystemFile, data: &[u8]) -> EdvResult<()>;

    fn delete_system_file(&self, vault_id: &str, kind: SystemFile) -> EdvResult<()>;
}

/// Typed JSON access to system files.
pub trait StorageProviderExt: StorageProvider {
    fn read_system_json<T: DeserializeOwned>(&self, vault_id: &str, kind: SystemFile) -> EdvResult<T> {
        let bytes = self.read_system_file(vault_id, kind)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_system_json<T: Serialize>(
        &self,
        vault_id: &str,
        kind: SystemFile,
        value: &T,
    ) -> EdvResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_system_file(vault_id, kind, &bytes)
    }

    /// Read and parse a document.
    fn load_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<EncryptedDocument> {
        let bytes = self.read_document(vault_id, doc_id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl<P: StorageProvider + ?Sized> StorageProviderExt for P {}

// =============================================================================
// Helpers shared by backends
// =============================================================================

/// Reject identifiers that cannot safely be used as storage keys.
pub fn validate_id(what: &str, id: &str) -> EdvResult<()> {
    if id.is_empty() {
        return Err(EdvError::bad_request(format!("{what} ID must not be empty")));
    }
    if id.len() > MAX_ID_LEN {
        return Err(EdvError::bad_request(format!(
            "{what} ID exceeds {MAX_ID_LEN} bytes"
        )));
    }
    if id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(EdvError::bad_request(format!("Invalid {what} ID '{id}'")));
    }
    Ok(())
}

/// Location reference of a vault.
pub fn vault_location(vault_id: &str) -> String {
    format!("/edvs/{vault_id}")
}

/// Location reference of a document.
pub fn document_location(vault_id: &str, doc_id: &str) -> String {
    format!("/edvs/{vault_id}/docs/{doc_id}")
}

/// Fill in the vault ID and reset the sequence of a new vault config.
pub(crate) fn prepare_vault_config(
    mut config: DataVaultConfiguration,
) -> EdvResult<DataVaultConfiguration> {
    if config.id.is_empty() {
        config.id = uuid::Uuid::new_v4().to_string();
    }
    validate_id("EDV", &config.id)?;
    config.sequence = 0;
    Ok(config)
}

/// Serialized initial contents of every system file of a new vault.
pub(crate) fn initial_system_files(
    config: &DataVaultConfiguration,
    descriptor: &StorageDescriptor,
) -> EdvResult<Vec<(SystemFile, Vec<u8>)>> {
    let history: Vec<HistoryEntry> = Vec::new();
    Ok(vec![
        (SystemFile::Config, serde_json::to_vec_pretty(config)?),
        (SystemFile::History, serde_json::to_vec_pretty(&history)?),
        (
            SystemFile::Index,
            serde_json::to_vec_pretty(&EncryptedIndex::default())?,
        ),
        (
            SystemFile::StorageDescriptor,
            serde_json::to_vec_pretty(descriptor)?,
        ),
    ])
}

#[cfg(test)]
pub(crate) mod contract;
