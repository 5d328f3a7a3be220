//! In-memory fake for the storage trait (testing and offline replay)
//!
//! Provides `MemoryObjectStore`, which satisfies the `ObjectStore` contract
//! without any external dependencies, plus one-shot fault injection so
//! callers can exercise their retry paths.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use crate::error::StoreError;
use crate::schema::{Kind, Resource, StoredObject};
use crate::storage_traits::*;

type ObjectKey = (Kind, String, String);

fn key_of(object: &StoredObject) -> ObjectKey {
    let meta = object.metadata();
    (object.kind(), meta.namespace.clone(), meta.name.clone())
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<ObjectKey, StoredObject>,
    last_version: u64,
}

impl MemoryState {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }
}

/// In-memory object store backed by a `BTreeMap<(kind, namespace, name), object>`.
///
/// Resource versions come from a single store-wide counter, so every write
/// yields a version greater than any previously observed.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<MemoryState>,
    faults: Mutex<HashMap<StoreOperation, VecDeque<StoreError>>>,
    calls: Mutex<HashMap<StoreOperation, usize>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `objects`.
    pub fn with_objects(objects: impl IntoIterator<Item = StoredObject>) -> Self {
        let store = Self::new();
        for object in objects {
            store.put(object);
        }
        store
    }

    /// Insert or overwrite an object directly, bypassing create semantics.
    ///
    /// Simulates writes made by other actors (e.g. a build updating a Component).
    pub fn put(&self, mut object: StoredObject) -> StoredObject {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        let meta = object.metadata_mut();
        meta.resource_version = version;
        if meta.uid.is_none() {
            meta.uid = Some(uuid::Uuid::new_v4().to_string());
        }
        if meta.creation_timestamp.is_none() {
            meta.creation_timestamp = Some(Utc::now());
        }
        state.objects.insert(key_of(&object), object.clone());
        object
    }

    /// Typed read that bypasses fault injection and call counting.
    pub fn peek<R: Resource>(&self, namespace: &str, name: &str) -> Option<R> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(R::KIND, namespace.to_string(), name.to_string()))
            .cloned()
            .and_then(|o| R::from_object(o).ok())
    }

    /// All objects of kind `R`, in key order.
    pub fn all<R: Resource>(&self) -> Vec<R> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .values()
            .filter(|o| o.kind() == R::KIND)
            .cloned()
            .filter_map(|o| R::from_object(o).ok())
            .collect()
    }

    /// Make the next call of `operation` fail with `error`. Faults queue up.
    pub fn fail_next(&self, operation: StoreOperation, error: StoreError) {
        let mut faults = self.faults.lock().unwrap();
        faults.entry(operation).or_default().push_back(error);
    }

    /// Number of calls made to `operation` so far, including failed ones.
    pub fn call_count(&self, operation: StoreOperation) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get(&operation).copied().unwrap_or(0)
    }

    fn enter(&self, operation: StoreOperation) -> StoreResult<()> {
        *self.calls.lock().unwrap().entry(operation).or_default() += 1;
        let mut faults = self.faults.lock().unwrap();
        match faults.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(err) => {
                debug!(?operation, error = %err, "injected store fault");
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, kind: Kind, namespace: &str, name: &str) -> StoreResult<StoredObject> {
        self.enter(StoreOperation::Get)?;
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn list(&self, query: &ListQuery) -> StoreResult<Vec<StoredObject>> {
        self.enter(StoreOperation::List)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect())
    }

    async fn create(&self, mut object: StoredObject) -> StoreResult<StoredObject> {
        self.enter(StoreOperation::Create)?;
        if object.metadata().name.is_empty() {
            return Err(StoreError::Invalid(format!(
                "{} in {} has no name",
                object.kind(),
                object.metadata().namespace
            )));
        }
        let key = key_of(&object);
        let mut state = self.state.lock().unwrap();
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: key.0,
                namespace: key.1,
                name: key.2,
            });
        }
        let version = state.next_version();
        let meta = object.metadata_mut();
        meta.resource_version = version;
        meta.uid = Some(uuid::Uuid::new_v4().to_string());
        meta.creation_timestamp = Some(Utc::now());
        state.objects.insert(key, object.clone());
        Ok(object)
    }

    async fn patch_status(&self, patch: StatusPatch) -> StoreResult<StoredObject> {
        self.enter(StoreOperation::PatchStatus)?;
        let mut state = self.state.lock().unwrap();
        let version = state.last_version + 1;
        let key = (patch.kind, patch.namespace.clone(), patch.name.clone());
        let object = state
            .objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: patch.kind,
                namespace: patch.namespace.clone(),
                name: patch.name.clone(),
            })?;

        let actual = object.metadata().resource_version;
        if actual != patch.expected_version {
            return Err(StoreError::VersionConflict {
                kind: patch.kind,
                namespace: patch.namespace,
                name: patch.name,
                expected: patch.expected_version,
                actual,
            });
        }

        let conditions = object.conditions_mut().ok_or_else(|| {
            StoreError::Invalid(format!("{} has no status conditions", patch.kind))
        })?;
        *conditions = patch.conditions;
        object.metadata_mut().resource_version = version;
        let patched = object.clone();
        state.last_version = version;
        Ok(patched)
    }
}
