// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local filesystem storage provider.
//!
//! Every vault is a directory under `{root}/edvs/`. Documents and system
//! files are whole-file JSON records; each write goes to a temp file that
//! is renamed over the target, so a single call never leaves a torn file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use super::{
    document_location, initial_system_files, prepare_vault_config, validate_id,
    vault_location, EdvError, EdvResult, StorageDescriptor, StorageKind, StoragePaths,
    StorageProvider, SystemFile,
};
use crate::models::{DataVaultConfiguration, EncryptedDocument};

/// Filesystem-backed [`StorageProvider`].
#[derive(Debug, Clone)]
pub struct LocalStorage {
    paths: StoragePaths,
}

impl LocalStorage {
    /// Open storage rooted at `paths`, creating the `edvs` directory.
    ///
    /// Safe to call multiple times (idempotent).
    pub fn open(paths: StoragePaths) -> EdvResult<Self> {
        fs::create_dir_all(paths.edvs_dir())?;
        Ok(Self { paths })
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Write the docs directory and initial system files of a claimed vault.
    fn populate_vault(&self, config: &DataVaultConfiguration) -> EdvResult<()> {
        fs::create_dir(self.paths.docs_dir(&config.id))?;
        for (kind, bytes) in initial_system_files(config, &self.descriptor())? {
            write_raw(&self.paths.system_file(&config.id, kind), &bytes)?;
        }
        Ok(())
    }

    /// Resolve the vault directory, failing if the vault does not exist.
    fn vault_dir(&self, vault_id: &str) -> EdvResult<std::path::PathBuf> {
        validate_id("EDV", vault_id)?;
        let dir = self.paths.vault_dir(vault_id);
        if !dir.is_dir() {
            return Err(EdvError::missing_vault(vault_id));
        }
        Ok(dir)
    }

    /// Resolve an existing document file.
    fn existing_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<std::path::PathBuf> {
        self.vault_dir(vault_id)?;
        validate_id("document", doc_id)?;
        let path = self.paths.document(vault_id, doc_id);
        if !exists(&path) {
            return Err(EdvError::missing_document(vault_id, doc_id));
        }
        Ok(path)
    }
}

/// Check if a file exists.
fn exists(path: impl AsRef<Path>) -> bool {
    File::open(path.as_ref()).is_ok()
}

/// Write a pretty-printed JSON file via temp file + rename.
fn write_json<T: Serialize>(path: &Path, value: &T) -> EdvResult<()> {
    let temp_path = path.with_extension("tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Write raw bytes via temp file + rename.
fn write_raw(path: &Path, data: &[u8]) -> EdvResult<()> {
    let temp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.flush()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

impl StorageProvider for LocalStorage {
    fn descriptor(&self) -> StorageDescriptor {
        StorageDescriptor {
            kind: StorageKind::Local,
            root: self.paths.root().to_path_buf(),
        }
    }

    fn health_check(&self) -> EdvResult<()> {
        let test_file = self
            .paths
            .root()
            .join(format!(".health_check-{}", uuid::Uuid::new_v4()));
        let test_data = b"health_check_data";

        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(EdvError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "Health check data mismatch",
            )));
        }
        Ok(())
    }

    fn create_vault(&self, config: DataVaultConfiguration) -> EdvResult<String> {
        let config = prepare_vault_config(config)?;
        let vault_dir = self.paths.vault_dir(&config.id);

        // Claiming the directory is the existence check.
        match fs::create_dir(&vault_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(EdvError::AlreadyExists(format!(
                    "EDV with ID '{}' already exists",
                    config.id
                )));
            }
            Err(e) => return Err(e.into()),
        }

        if let Err(e) = self.populate_vault(&config) {
            if let Err(cleanup) = fs::remove_dir_all(&vault_dir) {
                tracing::error!(
                    vault_id = %config.id,
                    error = %cleanup,
                    "Failed to remove partially created EDV"
                );
            }
            return Err(e);
        }

        Ok(vault_location(&config.id))
    }

    fn vault_exists(&self, vault_id: &str) -> EdvResult<bool> {
        validate_id("EDV", vault_id)?;
        Ok(self.paths.vault_dir(vault_id).is_dir())
    }

    fn create_document(&self, vault_id: &str, doc: &EncryptedDocument) -> EdvResult<String> {
        self.vault_dir(vault_id)?;
        validate_id("document", &doc.id)?;

        let path = self.paths.document(vault_id, &doc.id);
        if exists(&path) {
            return Err(EdvError::AlreadyExists(format!(
                "Document with ID '{}' already exists in EDV with ID '{vault_id}'",
                doc.id
            )));
        }

        fs::create_dir_all(self.paths.docs_dir(vault_id))?;
        write_json(&path, doc)?;
        Ok(document_location(vault_id, &doc.id))
    }

    fn read_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<Vec<u8>> {
        let path = self.existing_document(vault_id, doc_id)?;
        Ok(fs::read(path)?)
    }

    fn update_document(
        &self,
        vault_id: &str,
        doc_id: &str,
        doc: &EncryptedDocument,
    ) -> EdvResult<()> {
        let path = self.existing_document(vault_id, doc_id)?;
        write_json(&path, doc)
    }

    fn delete_document(&self, vault_id: &str, doc_id: &str) -> EdvResult<()> {
        let path = self.existing_document(vault_id, doc_id)?;
        fs::remove_file(path)?;
        Ok(())
    }

    fn document_exists(&self, vault_id: &str, doc_id: &str) -> EdvResult<bool> {
        self.vault_dir(vault_id)?;
        validate_id("document", doc_id)?;
        Ok(exists(self.paths.document(vault_id, doc_id)))
    }

    fn list_documents(&self, vault_id: &str) -> EdvResult<Vec<String>> {
        self.vault_dir(vault_id)?;
        let dir = self.paths.docs_dir(vault_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            if let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    fn read_system_file(&self, vault_id: &str, kind: SystemFile) -> EdvResult<Vec<u8>> {
        self.vault_dir(vault_id)?;
        Ok(fs::read(self.paths.system_file(vault_id, kind))?)
    }

    fn write_system_file(&self, vault_id: &str, kind: SystemFile, data: &[u8]) -> EdvResult<()> {
        self.vault_dir(vault_id)?;
        write_raw(&self.paths.system_file(vault_id, kind), data)
    }

    fn delete_system_file(&self, vault_id: &str, kind: SystemFile) -> EdvResult<()> {
        self.vault_dir(vault_id)?;
        fs::remove_file(self.paths.system_file(vault_id, kind))?;
        Ok(())
    }
}
