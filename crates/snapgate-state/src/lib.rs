//! snapgate-state: object store contract for snapgate
//!
//! This crate defines the records the reconciler reads and writes and the
//! store interface it talks to. The store itself is external; only its
//! contract and an in-memory fake live here.
//!
//! ## Layer 0 - Data
//!
//! Focus: typed records, exact-match queries, optimistic concurrency.
//!
//! ## Key Components
//!
//! - `ObjectStore`: Get / List / Create / PatchStatus against a versioned collection
//! - `StoredObject`: Kind-tagged union of Component, Application, Snapshot,
//!   TestScenario and PipelineRun
//! - `MemoryObjectStore`: In-memory fake with fault injection

mod error;
pub mod fakes;
pub mod labels;
mod schema;
pub mod storage_traits;

pub use error::StoreError;
pub use schema::{
    find_condition, Application, ApplicationSpec, Component, ComponentSpec, ComponentStatus,
    Condition, ConditionStatus, Kind, ObjectMeta, PipelineRun, PipelineRunStatus, PipelineType,
    Resource, Snapshot, SnapshotComponent, SnapshotSpec, SnapshotStatus, StoredObject, TaskResult,
    TestScenario, TestScenarioSpec,
};
pub use storage_traits::{
    ContentDigest, ListQuery, ObjectStore, StatusPatch, StoreOperation, StoreResult,
};
