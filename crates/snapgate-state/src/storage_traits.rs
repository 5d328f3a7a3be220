//! Storage trait definitions for snapgate
//!
//! `ObjectStore` is the typed get/list/create/patch contract against a
//! remote, versioned object collection. Implementations are expected to be
//! eventually consistent and to enforce optimistic concurrency on status
//! patches via `StatusPatch::expected_version`.
//!
//! An in-memory fake is provided for testing via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StoreError;
use crate::schema::{Condition, Kind, Resource, StoredObject};

/// Result type for storage operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// Only constructed by hashing, so the inner string is always lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Queries and patches
// ---------------------------------------------------------------------------

/// Exact-match list query.
///
/// Every predicate must hold for an object to be returned. Anything richer
/// than equality is applied by the caller as an explicit predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub kind: Kind,
    pub namespace: String,
    pub field_equals: BTreeMap<String, String>,
    pub label_equals: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn new(kind: Kind, namespace: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            field_equals: BTreeMap::new(),
            label_equals: BTreeMap::new(),
        }
    }

    /// Query for all objects of `R` in `namespace`.
    pub fn of<R: Resource>(namespace: impl Into<String>) -> Self {
        Self::new(R::KIND, namespace)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.field_equals.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_equals.insert(key.into(), value.into());
        self
    }

    /// Whether `object` satisfies every predicate of this query.
    pub fn matches(&self, object: &StoredObject) -> bool {
        let meta = object.metadata();
        object.kind() == self.kind
            && meta.namespace == self.namespace
            && self
                .label_equals
                .iter()
                .all(|(k, v)| meta.label(k) == Some(v.as_str()))
            && self
                .field_equals
                .iter()
                .all(|(k, v)| object.field(k) == Some(v.as_str()))
    }
}

/// Conditional replacement of an object's status conditions.
///
/// Applied only if the stored object still has `expected_version`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPatch {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
    pub expected_version: u64,
    pub conditions: Vec<Condition>,
}

impl StatusPatch {
    /// Patch `resource`'s conditions against the version it was read at.
    pub fn conditions<R: Resource>(resource: &R, conditions: Vec<Condition>) -> Self {
        let meta = resource.metadata();
        Self {
            kind: R::KIND,
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
            expected_version: meta.resource_version,
            conditions,
        }
    }
}

/// Store operations, used to address fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreOperation {
    Get,
    List,
    Create,
    PatchStatus,
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Remote, versioned object collection.
///
/// Guarantees:
/// - `create` fails with `AlreadyExists` if the (kind, namespace, name) key is taken.
/// - `patch_status` fails with `VersionConflict` if the stored version differs
///   from `expected_version`, and bumps the version on success.
/// - `list` returns objects in a stable order.
///
/// Non-guarantees: no cross-object transactions and no uniqueness beyond the key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object. Returns `StoreError::NotFound` if absent.
    async fn get(&self, kind: Kind, namespace: &str, name: &str) -> StoreResult<StoredObject>;

    /// List objects matching every predicate of `query`.
    async fn list(&self, query: &ListQuery) -> StoreResult<Vec<StoredObject>>;

    /// Create an object, returning it as stored (uid, version, timestamp set).
    async fn create(&self, object: StoredObject) -> StoreResult<StoredObject>;

    /// Replace status conditions if the object is still at the expected version.
    async fn patch_status(&self, patch: StatusPatch) -> StoreResult<StoredObject>;
}
