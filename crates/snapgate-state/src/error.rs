//! Error types for snapgate-state

use thiserror::Error;

use crate::schema::Kind;

/// Errors returned by an [`ObjectStore`](crate::storage_traits::ObjectStore).
///
/// Every variant is transient from the reconciler's point of view: the
/// triggering event is redelivered and recomputed from fresh reads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested object does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: Kind,
        namespace: String,
        name: String,
    },

    /// An object with the same key already exists
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: Kind,
        namespace: String,
        name: String,
    },

    /// The object changed since it was read
    #[error("{kind} {namespace}/{name} version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        kind: Kind,
        namespace: String,
        name: String,
        expected: u64,
        actual: u64,
    },

    /// The object cannot be written through this operation
    #[error("invalid object: {0}")]
    Invalid(String),

    /// The caller cancelled the in-flight call
    #[error("store call cancelled")]
    Cancelled,

    /// Connectivity or backend failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error reports a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Whether this error reports a duplicate key on create.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }

    /// Whether this error reports an optimistic-concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}
