//! Document store abstraction.
//!
//! The engine never talks to a concrete database. It consumes a keyed,
//! collection-oriented store with point reads, replace/merge writes
//! guarded by optimistic versions, queries, and push-based change
//! subscriptions. Versions start at 1 for a new document; an expected
//! version of 0 means "the document must not exist yet".

pub mod hub;
pub mod memory;

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{OnboardError, OnboardResult};

pub use hub::{ChangeHub, Subscription};
pub use memory::InMemoryDocumentStore;

/// The closed set of collections the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// Employee profiles keyed by principal id.
    Profiles,
    /// Allow-list entries keyed by employee id.
    Allowlist,
    /// Administrator records keyed by employee id.
    AdminRecords,
    /// Administrator registry keyed by principal id.
    Admins,
    /// Local identity provider accounts keyed by lower-cased email.
    Credentials,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Profiles,
        Collection::Allowlist,
        Collection::AdminRecords,
        Collection::Admins,
        Collection::Credentials,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Allowlist => "allowlist",
            Collection::AdminRecords => "admin_records",
            Collection::Admins => "admins",
            Collection::Credentials => "credentials",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document and its current version.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub collection: Collection,
    pub key: String,
    pub data: Value,
    pub version: u64,
}

/// How a write treats the existing document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Merge-patch the named fields instead of replacing the document.
    pub merge: bool,
    /// Reject the write with [`OnboardError::Conflict`] unless the
    /// document is currently at this version (0 = absent).
    pub expected_version: Option<u64>,
}

impl WriteOptions {
    pub fn replace() -> Self {
        Self::default()
    }

    pub fn merge() -> Self {
        Self {
            merge: true,
            expected_version: None,
        }
    }

    /// Only succeed if the document does not exist yet.
    pub fn create() -> Self {
        Self::replace().expecting(0)
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Equality filter on a (dot-separated) field path of the document data.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        let pointer = format!("/{}", self.field.replace('.', "/"));
        data.pointer(&pointer) == Some(&self.value)
    }
}

/// A change to one watched document. `document` is `None` when the
/// document does not exist (never created, or deleted).
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub key: String,
    pub document: Option<Document>,
}

pub trait DocumentStore: Send + Sync {
    /// Point read. Missing documents are [`OnboardError::NotFound`].
    fn get_document(
        &self,
        collection: Collection,
        key: &str,
    ) -> impl Future<Output = OnboardResult<Document>> + Send;

    /// Replace or merge-patch a document, creating it when absent.
    fn set_document(
        &self,
        collection: Collection,
        key: &str,
        data: Value,
        options: WriteOptions,
    ) -> impl Future<Output = OnboardResult<Document>> + Send;

    /// Remove a document. Deleting a missing document is not an error.
    fn delete_document(
        &self,
        collection: Collection,
        key: &str,
    ) -> impl Future<Output = OnboardResult<()>> + Send;

    /// Watch one document. The current state is delivered first, then
    /// every subsequent change, at least once.
    fn subscribe(
        &self,
        collection: Collection,
        key: &str,
    ) -> impl Future<Output = OnboardResult<Subscription>> + Send;

    /// All documents in `collection` matching every filter, ordered by key.
    fn query(
        &self,
        collection: Collection,
        filters: &[Filter],
    ) -> impl Future<Output = OnboardResult<Vec<Document>>> + Send;
}

/// A typed document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

impl<T: DeserializeOwned> Versioned<T> {
    pub fn from_document(doc: Document) -> OnboardResult<Self> {
        Ok(Self {
            value: serde_json::from_value(doc.data)?,
            version: doc.version,
        })
    }
}

/// Typed helpers over any [`DocumentStore`].
pub trait DocumentStoreExt: DocumentStore {
    /// Read and deserialize a document; `None` when it does not exist.
    fn load<T: DeserializeOwned + Send>(
        &self,
        collection: Collection,
        key: &str,
    ) -> impl Future<Output = OnboardResult<Option<Versioned<T>>>> + Send {
        async move {
            match self.get_document(collection, key).await {
                Ok(doc) => Versioned::from_document(doc).map(Some),
                Err(OnboardError::NotFound { .. }) => Ok(None),
                Err(e) => Err(e),
            }
        }
    }

    /// Serialize and replace a document.
    fn save<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        value: &T,
        expected_version: Option<u64>,
    ) -> impl Future<Output = OnboardResult<Document>> + Send {
        let data = serde_json::to_value(value);
        async move {
            let options = WriteOptions {
                merge: false,
                expected_version,
            };
            self.set_document(collection, key, data?, options).await
        }
    }

    /// Merge-patch the named fields of a document.
    fn patch(
        &self,
        collection: Collection,
        key: &str,
        fields: Value,
        expected_version: Option<u64>,
    ) -> impl Future<Output = OnboardResult<Document>> + Send {
        async move {
            let options = WriteOptions {
                merge: true,
                expected_version,
            };
            self.set_document(collection, key, fields, options).await
        }
    }
}

impl<S: DocumentStore> DocumentStoreExt for S {}

/// Recursively merge `patch` into `target`: objects are merged field by
/// field, every other value replaces what was there.
pub fn merge_patch(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (field, value) in patch {
                match target.get_mut(&field) {
                    Some(existing) => merge_patch(existing, value),
                    None => {
                        target.insert(field, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Validate a write against the current state of a document and compute
/// the data and version to store. Shared by every backend so optimistic
/// concurrency and merge semantics are identical everywhere.
pub fn prepare_write(
    collection: Collection,
    key: &str,
    current: Option<(&Value, u64)>,
    data: Value,
    options: WriteOptions,
) -> OnboardResult<(Value, u64)> {
    if !data.is_object() {
        return Err(OnboardError::Validation {
            message: format!("{collection}/{key}: document data must be an object"),
        });
    }

    let current_version = current.map(|(_, v)| v).unwrap_or(0);
    if let Some(expected) = options.expected_version
        && expected != current_version
    {
        return Err(OnboardError::Conflict {
            collection: collection.to_string(),
            key: key.to_string(),
        });
    }

    let next = match current {
        Some((existing, _)) if options.merge => {
            let mut merged = existing.clone();
            merge_patch(&mut merged, data);
            merged
        }
        _ => data,
    };
    Ok((next, current_version + 1))
}
