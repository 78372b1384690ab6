// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # EDV Data Models
//!
//! Wire and persistence types shared by the storage providers, the index
//! and history repositories and the REST API. Field names follow the
//! camelCase JSON used by EDV clients.
//!
//! ## Model Categories
//!
//! - **Vaults**: [`DataVaultConfiguration`] persisted as the vault's config file
//! - **Documents**: [`EncryptedDocument`] with its client-supplied index entries
//! - **Index**: [`EncryptedIndex`], the forward/reverse tag maps
//! - **History**: [`HistoryEntry`] records of document mutations
//! - **Search**: [`SearchRequest`] and [`EqualsFilter`]

use std::collections::BTreeMap;
use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Vault Models
// =============================================================================

/// Reference to a key held by the client (key agreement or HMAC key).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct KeyReference {
    /// Key identifier (usually a DID URL).
    pub id: String,
    /// Key type, e.g. `X25519KeyAgreementKey2019` or `Sha256HmacKey2019`.
    #[serde(rename = "type")]
    pub key_type: String,
}

/// A capability field that may hold a single identity or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Configuration of an encrypted data vault.
///
/// `sequence` is owned by the server: it is reset to zero on creation and
/// only advanced by the history tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataVaultConfiguration {
    /// Vault identifier. Generated when absent or empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Number of mutating operations applied to the vault.
    #[serde(default)]
    pub sequence: u64,
    /// Identity that controls the vault.
    pub controller: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoker: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegator: Option<OneOrMany>,
    /// Client-chosen secondary identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    pub key_agreement_key: KeyReference,
    pub hmac: KeyReference,
}

// =============================================================================
// Document Models
// =============================================================================

/// One HMAC'd attribute of an index entry. Both name and value are opaque
/// tokens computed by the client.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IndexedAttribute {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub unique: bool,
}

/// Index entry declared by the client: the HMAC key identifies the index,
/// the attributes are what equality search matches against.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IndexedEntry {
    #[serde(default)]
    pub sequence: u64,
    pub hmac: KeyReference,
    #[serde(default)]
    pub attributes: Vec<IndexedAttribute>,
}

impl IndexedEntry {
    /// Identifier of the index this entry belongs to.
    pub fn index_id(&self) -> &str {
        &self.hmac.id
    }
}

/// An encrypted document as stored in a vault.
///
/// The `jwe` payload is never inspected.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct EncryptedDocument {
    pub id: String,
    #[serde(default)]
    pub sequence: u64,
    #[schema(value_type = Object)]
    pub jwe: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexed: Vec<IndexedEntry>,
}

impl EncryptedDocument {
    /// The entry for `index_id`, if the document participates in that index.
    pub fn entry_for(&self, index_id: &str) -> Option<&IndexedEntry> {
        self.indexed.iter().find(|entry| entry.index_id() == index_id)
    }
}

// =============================================================================
// Index Model
// =============================================================================

/// Forward and reverse maps between index IDs and document IDs.
///
/// For every `doc_id` in `doc_ids[index_id]`, `index_id` is in
/// `index_ids[doc_id]`, and vice versa.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedIndex {
    /// index ID -> documents tagged by that index
    #[serde(default)]
    pub doc_ids: BTreeMap<String, Vec<String>>,
    /// document ID -> indexes the document participates in
    #[serde(default)]
    pub index_ids: BTreeMap<String, Vec<String>>,
}

// =============================================================================
// History Models
// =============================================================================

/// Kind of document mutation recorded in the history log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HistoryOperation {
    Created,
    Updated,
    Deleted,
}

impl HistoryOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryOperation::Created => "created",
            HistoryOperation::Updated => "updated",
            HistoryOperation::Deleted => "deleted",
        }
    }
}

impl fmt::Display for HistoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a vault's append-only history log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub document_id: String,
    pub sequence: u64,
    pub operation: HistoryOperation,
}

// =============================================================================
// Search Models
// =============================================================================

/// Attribute name -> expected value.
pub type Subfilter = BTreeMap<String, String>;

/// Equality filter of a search request.
///
/// The variant is picked from the JSON shape of `equals`: an object is
/// [`EqualsFilter::AllOf`], an array of objects is [`EqualsFilter::AnyOf`].
/// Any other shape is rejected.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EqualsFilter {
    /// Every attribute in the map must match.
    AllOf(Subfilter),
    /// At least one of the maps must fully match.
    AnyOf(Vec<Subfilter>),
}

impl Default for EqualsFilter {
    fn default() -> Self {
        EqualsFilter::AllOf(Subfilter::new())
    }
}

impl<'de> Deserialize<'de> for EqualsFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map(EqualsFilter::AllOf)
                .map_err(de::Error::custom),
            serde_json::Value::Array(_) => serde_json::from_value(value)
                .map(EqualsFilter::AnyOf)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "`equals` must be an object or an array of objects, got {other}"
            ))),
        }
    }
}

/// Body of `POST /edvs/{edvId}/query`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Index (HMAC key ID) to search.
    pub index: String,
    /// Object (all must match) or array of objects (any may match).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub equals: EqualsFilter,
    #[serde(default)]
    pub return_full_documents: bool,
    /// Attribute-presence search. Accepted but not supported; any request
    /// carrying it matches nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub has: Option<serde_json::Value>,
}

impl SearchRequest {
    /// Operator this request asks for.
    pub fn operator(&self) -> MatchOperator {
        if self.has.is_some() {
            MatchOperator::from("has")
        } else {
            MatchOperator::Equals
        }
    }
}

/// Comparison applied to attribute values during a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOperator {
    Equals,
    /// Anything else. Searches with this operator match nothing.
    Unsupported(String),
}

impl From<&str> for MatchOperator {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("equals") {
            MatchOperator::Equals
        } else {
            MatchOperator::Unsupported(value.to_string())
        }
    }
}

/// Search response: bare IDs or full documents.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum SearchResults {
    Ids(Vec<String>),
    Documents(Vec<serde_json::Value>),
}

impl SearchResults {
    pub fn len(&self) -> usize {
        match self {
            SearchResults::Ids(ids) => ids.len(),
            SearchResults::Documents(docs) => docs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
