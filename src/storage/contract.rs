// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Behaviour every [`StorageProvider`] must share, plus fixtures used by the
//! repository and service tests.

use serde_json::json;

use super::{ErrorKind, StorageProvider, StorageProviderExt, SystemFile};
use crate::models::{
    DataVaultConfiguration, EncryptedDocument, EncryptedIndex, HistoryEntry, IndexedAttribute,
    IndexedEntry, KeyReference,
};

/// Vault config with a fixed ID.
pub fn vault_config(id: &str) -> DataVaultConfiguration {
    DataVaultConfiguration {
        id: id.to_string(),
        sequence: 0,
        controller: "did:example:123456789".to_string(),
        invoker: None,
        delegator: None,
        reference_id: None,
        key_agreement_key: KeyReference {
            id: "https://example.com/kms/12345".to_string(),
            key_type: "X25519KeyAgreementKey2019".to_string(),
        },
        hmac: KeyReference {
            id: "https://example.com/kms/67891".to_string(),
            key_type: "Sha256HmacKey2019".to_string(),
        },
    }
}

/// Document with a single index entry carrying `attributes`.
pub fn document(id: &str, index_id: &str, attributes: &[(&str, &str)]) -> EncryptedDocument {
    EncryptedDocument {
        id: id.to_string(),
        sequence: 0,
        jwe: json!({
            "protected": "eyJlbmMiOiJDMjBQIn0",
            "recipients": [],
            "iv": "i8Nins2vTI3PlrYW",
            "ciphertext": "Cb-963UCXblINT8F6MDHzMJN9EAhK3I",
            "tag": "pfZO0JulJcrc3trOZy8rjA"
        }),
        indexed: vec![IndexedEntry {
            sequence: 0,
            hmac: KeyReference {
                id: index_id.to_string(),
                key_type: "Sha256HmacKey2019".to_string(),
            },
            attributes: attributes
                .iter()
                .map(|(name, value)| IndexedAttribute {
                    name: name.to_string(),
                    value: value.to_string(),
                    unique: false,
                })
                .collect(),
        }],
    }
}

pub fn run_all(provider: &dyn StorageProvider) {
    create_vault_initializes_system_files(provider);
    create_vault_generates_id(provider);
    duplicate_vault_is_rejected(provider);
    document_crud(provider);
    missing_vault_is_not_found(provider);
    missing_document_is_not_found(provider);
    system_file_round_trip(provider);
    invalid_ids_are_rejected(provider);
}

fn create_vault_initializes_system_files(provider: &dyn StorageProvider) {
    let mut config = vault_config("contract-init");
    config.sequence = 7;
    let location = provider.create_vault(config).unwrap();
    assert_eq!(location, "/edvs/contract-init");
    assert!(provider.vault_exists("contract-init").unwrap());

    let stored: DataVaultConfiguration = provider
        .read_system_json("contract-init", SystemFile::Config)
        .unwrap();
    assert_eq!(stored.id, "contract-init");
    assert_eq!(stored.sequence, 0);

    let history: Vec<HistoryEntry> = provider
        .read_system_json("contract-init", SystemFile::History)
        .unwrap();
    assert!(history.is_empty());

    let index: EncryptedIndex = provider
        .read_system_json("contract-init", SystemFile::Index)
        .unwrap();
    assert_eq!(index, EncryptedIndex::default());

    let descriptor: super::StorageDescriptor = provider
        .read_system_json("contract-init", SystemFile::StorageDescriptor)
        .unwrap();
    assert_eq!(descriptor, provider.descriptor());
}

fn create_vault_generates_id(provider: &dyn StorageProvider) {
    let location = provider.create_vault(vault_config("")).unwrap();
    let id = location.trim_start_matches("/edvs/");
    assert!(uuid::Uuid::parse_str(id).is_ok(), "{location}");
    assert!(provider.vault_exists(id).unwrap());
}

fn duplicate_vault_is_rejected(provider: &dyn StorageProvider) {
    provider.create_vault(vault_config("contract-dup")).unwrap();
    let err = provider
        .create_vault(vault_config("contract-dup"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

fn document_crud(provider: &dyn StorageProvider) {
    provider.create_vault(vault_config("contract-docs")).unwrap();
    let doc = document("d1", "idx1", &[("type", "note")]);

    assert!(!provider.document_exists("contract-docs", "d1").unwrap());
    let location = provider.create_document("contract-docs", &doc).unwrap();
    assert_eq!(location, "/edvs/contract-docs/docs/d1");
    assert!(provider.document_exists("contract-docs", "d1").unwrap());
    assert_eq!(provider.load_document("contract-docs", "d1").unwrap(), doc);

    let err = provider.create_document("contract-docs", &doc).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);

    let mut updated = doc.clone();
    updated.sequence = 1;
    updated.jwe = json!({"ciphertext": "new"});
    provider
        .update_document("contract-docs", "d1", &updated)
        .unwrap();
    assert_eq!(
        provider.load_document("contract-docs", "d1").unwrap(),
        updated
    );

    provider
        .create_document("contract-docs", &document("d2", "idx1", &[]))
        .unwrap();
    let mut ids = provider.list_documents("contract-docs").unwrap();
    ids.sort();
    assert_eq!(ids, vec!["d1".to_string(), "d2".to_string()]);

    provider.delete_document("contract-docs", "d1").unwrap();
    assert!(!provider.document_exists("contract-docs", "d1").unwrap());
    assert_eq!(
        provider.list_documents("contract-docs").unwrap(),
        vec!["d2".to_string()]
    );
}

fn missing_vault_is_not_found(provider: &dyn StorageProvider) {
    let doc = document("d1", "idx1", &[]);
    assert!(!provider.vault_exists("no-such-vault").unwrap());

    let errors = [
        provider.create_document("no-such-vault", &doc).unwrap_err(),
        provider.read_document("no-such-vault", "d1").unwrap_err(),
        provider
            .update_document("no-such-vault", "d1", &doc)
            .unwrap_err(),
        provider.delete_document("no-such-vault", "d1").unwrap_err(),
        provider.document_exists("no-such-vault", "d1").unwrap_err(),
        provider.list_documents("no-such-vault").unwrap_err(),
        provider
            .read_system_file("no-such-vault", SystemFile::Config)
            .unwrap_err(),
        provider
            .write_system_file("no-such-vault", SystemFile::Index, b"{}")
            .unwrap_err(),
        provider
            .delete_system_file("no-such-vault", SystemFile::History)
            .unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");
    }
}

fn missing_document_is_not_found(provider: &dyn StorageProvider) {
    provider.create_vault(vault_config("contract-missing")).unwrap();
    let doc = document("ghost", "idx1", &[]);

    let errors = [
        provider.read_document("contract-missing", "ghost").unwrap_err(),
        provider
            .update_document("contract-missing", "ghost", &doc)
            .unwrap_err(),
        provider
            .delete_document("contract-missing", "ghost")
            .unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::NotFound, "{err}");
    }
}

fn system_file_round_trip(provider: &dyn StorageProvider) {
    provider.create_vault(vault_config("contract-sys")).unwrap();

    provider
        .write_system_file("contract-sys", SystemFile::History, b"[1]")
        .unwrap();
    assert_eq!(
        provider
            .read_system_file("contract-sys", SystemFile::History)
            .unwrap(),
        b"[1]".to_vec()
    );

    provider
        .delete_system_file("contract-sys", SystemFile::History)
        .unwrap();
    let err = provider
        .read_system_file("contract-sys", SystemFile::History)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

fn invalid_ids_are_rejected(provider: &dyn StorageProvider) {
    provider.create_vault(vault_config("contract-ids")).unwrap();

    let err = provider.create_vault(vault_config("../escape")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = provider
        .create_document("contract-ids", &document("a/b", "idx1", &[]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = provider.read_document("contract-ids", "..").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
}
