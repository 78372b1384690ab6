// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path layout of the local filesystem backend.

use std::path::{Path, PathBuf};

use super::SystemFile;

/// Default data directory when none is configured.
pub const DATA_ROOT: &str = "./data";

/// Directory holding one subdirectory per vault.
const EDV_DIR: &str = "edvs";

/// Per-vault directory holding the encrypted documents.
const DOC_DIR: &str = "docs";

/// Storage path utilities for the local backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root data directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Vault Paths ==========

    /// Directory containing all vaults.
    pub fn edvs_dir(&self) -> PathBuf {
        self.root.join(EDV_DIR)
    }

    /// Directory for a specific vault.
    pub fn vault_dir(&self, vault_id: &str) -> PathBuf {
        self.edvs_dir().join(vault_id)
    }

    /// Path to one of a vault's system files.
    pub fn system_file(&self, vault_id: &str, kind: SystemFile) -> PathBuf {
        self.vault_dir(vault_id).join(kind.file_name())
    }

    // ========== Document Paths ==========

    /// Directory containing a vault's documents.
    pub fn docs_dir(&self, vault_id: &str) -> PathBuf {
        self.vault_dir(vault_id).join(DOC_DIR)
    }

    /// Path to a specific document file.
    pub fn document(&self, vault_id: &str, doc_id: &str) -> PathBuf {
        self.docs_dir(vault_id).join(format!("{doc_id}.json"))
    }
}
