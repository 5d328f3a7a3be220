//! Record definitions for the objects snapgate reads and writes
//!
//! Kinds:
//! - Component: deployable unit with its current container image
//! - Application: grouping of Components (read-only here)
//! - Snapshot: immutable component→image combination plus a verdict condition
//! - TestScenario: integration test definition scoped to an Application
//! - PipelineRun: one build or test execution

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::labels;
use crate::storage_traits::StoreResult;

/// Object kinds held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Component,
    Application,
    Snapshot,
    TestScenario,
    PipelineRun,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Component => "Component",
            Kind::Application => "Application",
            Kind::Snapshot => "Snapshot",
            Kind::TestScenario => "TestScenario",
            Kind::PipelineRun => "PipelineRun",
        };
        f.write_str(s)
    }
}

/// Metadata common to every stored object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Assigned by the store on create
    #[serde(default)]
    pub uid: Option<String>,
    /// Bumped by the store on every write; carried by conditional patches
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

/// A typed status condition attached to a Snapshot or PipelineRun.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    #[serde(default)]
    pub last_transition_time: Option<DateTime<Utc>>,
}

impl Condition {
    pub fn new(
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            condition_type: condition_type.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: None,
        }
    }
}

/// Find a condition by type.
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions
        .iter()
        .find(|c| c.condition_type == condition_type)
}

// ---------------------------------------------------------------------------
// Component / Application
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub application: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Image currently recorded for the component
    #[serde(default)]
    pub container_image: Option<String>,
}

/// Deployable unit belonging to an Application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub metadata: ObjectMeta,
    pub spec: ComponentSpec,
    #[serde(default)]
    pub status: ComponentStatus,
}

impl Component {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        application: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: ComponentSpec {
                application: application.into(),
            },
            status: ComponentStatus::default(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.status.container_image = Some(image.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationSpec {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Named grouping of Components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ApplicationSpec,
}

impl Application {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: ApplicationSpec::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One (component name, image) pair of a Snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotComponent {
    pub name: String,
    pub container_image: String,
}

impl SnapshotComponent {
    pub fn new(name: impl Into<String>, container_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container_image: container_image.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSpec {
    pub application: String,
    /// Unordered set of component images
    pub components: Vec<SnapshotComponent>,
    /// Content digest of `components`, when created by snapgate
    #[serde(default)]
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Immutable component→image combination for an Application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub metadata: ObjectMeta,
    pub spec: SnapshotSpec,
    #[serde(default)]
    pub status: SnapshotStatus,
}

impl Snapshot {
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        find_condition(&self.status.conditions, condition_type)
    }
}

// ---------------------------------------------------------------------------
// TestScenario
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScenarioSpec {
    pub application: String,
    /// Pipeline reference executed for this scenario
    #[serde(default)]
    pub pipeline: Option<String>,
}

/// Integration test definition scoped to an Application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScenario {
    pub metadata: ObjectMeta,
    pub spec: TestScenarioSpec,
}

impl TestScenario {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        application: impl Into<String>,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: TestScenarioSpec {
                application: application.into(),
                pipeline: None,
            },
        }
    }

    pub fn with_optional_label(mut self, value: impl Into<String>) -> Self {
        self.metadata
            .labels
            .insert(labels::SCENARIO_OPTIONAL.to_string(), value.into());
        self
    }
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

/// What a PipelineRun executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineType {
    Build,
    Test,
}

impl PipelineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::Build => "build",
            PipelineType::Test => "test",
        }
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(PipelineType::Build),
            "test" => Ok(PipelineType::Test),
            other => Err(StoreError::Invalid(format!("unknown pipeline type: {other}"))),
        }
    }
}

/// Named payload produced by a task of a PipelineRun.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Pipeline task that produced the result
    #[serde(default)]
    pub task: Option<String>,
    pub name: String,
    pub value: String,
}

impl TaskResult {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            task: None,
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn from_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunStatus {
    #[serde(default)]
    pub succeeded: bool,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub task_results: Vec<TaskResult>,
    /// Conditions written by the reconciler
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Record of one build or test execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: PipelineRunStatus,
}

impl PipelineRun {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: PipelineType) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name)
                .with_label(labels::PIPELINE_TYPE, kind.as_str()),
            status: PipelineRunStatus::default(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// Mark the run finished at `at`.
    pub fn completed(mut self, succeeded: bool, at: DateTime<Utc>) -> Self {
        self.status.succeeded = succeeded;
        self.status.completion_time = Some(at);
        self
    }

    pub fn with_task_result(mut self, result: TaskResult) -> Self {
        self.status.task_results.push(result);
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.label(key)
    }

    /// Pipeline type from the type label; `None` when absent or unknown.
    pub fn pipeline_type(&self) -> Option<PipelineType> {
        self.label(labels::PIPELINE_TYPE)
            .and_then(|t| t.parse().ok())
    }

    pub fn is_build(&self) -> bool {
        self.pipeline_type() == Some(PipelineType::Build)
    }

    pub fn is_test(&self) -> bool {
        self.pipeline_type() == Some(PipelineType::Test)
    }

    pub fn has_finished(&self) -> bool {
        self.status.completion_time.is_some()
    }

    /// First task result with the given name.
    pub fn task_result(&self, name: &str) -> Option<&str> {
        self.status
            .task_results
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// StoredObject
// ---------------------------------------------------------------------------

/// Any object held by the store, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StoredObject {
    Component(Component),
    Application(Application),
    Snapshot(Snapshot),
    TestScenario(TestScenario),
    PipelineRun(PipelineRun),
}

impl StoredObject {
    pub fn kind(&self) -> Kind {
        match self {
            StoredObject::Component(_) => Kind::Component,
            StoredObject::Application(_) => Kind::Application,
            StoredObject::Snapshot(_) => Kind::Snapshot,
            StoredObject::TestScenario(_) => Kind::TestScenario,
            StoredObject::PipelineRun(_) => Kind::PipelineRun,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            StoredObject::Component(o) => &o.metadata,
            StoredObject::Application(o) => &o.metadata,
            StoredObject::Snapshot(o) => &o.metadata,
            StoredObject::TestScenario(o) => &o.metadata,
            StoredObject::PipelineRun(o) => &o.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            StoredObject::Component(o) => &mut o.metadata,
            StoredObject::Application(o) => &mut o.metadata,
            StoredObject::Snapshot(o) => &mut o.metadata,
            StoredObject::TestScenario(o) => &mut o.metadata,
            StoredObject::PipelineRun(o) => &mut o.metadata,
        }
    }

    /// Writable status conditions; `None` for kinds without a status subresource.
    pub fn conditions_mut(&mut self) -> Option<&mut Vec<Condition>> {
        match self {
            StoredObject::Snapshot(o) => Some(&mut o.status.conditions),
            StoredObject::PipelineRun(o) => Some(&mut o.status.conditions),
            _ => None,
        }
    }

    /// Value of an indexed field. Only `spec.application` is indexed.
    pub fn field(&self, key: &str) -> Option<&str> {
        if key != labels::FIELD_APPLICATION {
            return None;
        }
        match self {
            StoredObject::Component(o) => Some(&o.spec.application),
            StoredObject::Snapshot(o) => Some(&o.spec.application),
            StoredObject::TestScenario(o) => Some(&o.spec.application),
            _ => None,
        }
    }
}

/// Typed view over a [`StoredObject`] variant.
pub trait Resource: Clone + Send + Sync + Sized {
    const KIND: Kind;

    fn metadata(&self) -> &ObjectMeta;

    fn into_object(self) -> StoredObject;

    /// Unwrap the matching variant, rejecting any other kind.
    fn from_object(object: StoredObject) -> StoreResult<Self>;
}

macro_rules! impl_resource {
    ($ty:ident) => {
        impl Resource for $ty {
            const KIND: Kind = Kind::$ty;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn into_object(self) -> StoredObject {
                StoredObject::$ty(self)
            }

            fn from_object(object: StoredObject) -> StoreResult<Self> {
                match object {
                    StoredObject::$ty(inner) => Ok(inner),
                    other => Err(StoreError::Invalid(format!(
                        "expected {} but got {} {}/{}",
                        Kind::$ty,
                        other.kind(),
                        other.metadata().namespace,
                        other.metadata().name
                    ))),
                }
            }
        }
    };
}

impl_resource!(Component);
impl_resource!(Application);
impl_resource!(Snapshot);
impl_resource!(TestScenario);
impl_resource!(PipelineRun);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_type_from_label() {
        let run = PipelineRun::new("ns", "build-1", PipelineType::Build);
        assert!(run.is_build());
        assert!(!run.is_test());

        let unlabeled = PipelineRun {
            metadata: ObjectMeta::new("ns", "other"),
            status: PipelineRunStatus::default(),
        };
        assert_eq!(unlabeled.pipeline_type(), None);
    }

    #[test]
    fn test_stored_object_tagged_by_kind() {
        let object = Component::new("ns", "a", "app1")
            .with_image("r/a@sha1")
            .into_object();
        let json = serde_json::to_value(&object).expect("serialize");
        assert_eq!(json["kind"], "Component");
        assert_eq!(json["spec"]["application"], "app1");

        let back: StoredObject = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, object);
    }

    #[test]
    fn test_from_object_rejects_other_kind() {
        let object = Application::new("ns", "app1").into_object();
        let err = Snapshot::from_object(object).unwrap_err();
        assert!(err.to_string().contains("expected Snapshot"));
    }

    #[test]
    fn test_field_only_indexes_application() {
        let object = TestScenario::new("ns", "s1", "app1").into_object();
        assert_eq!(object.field("spec.application"), Some("app1"));
        assert_eq!(object.field("spec.pipeline"), None);
        assert_eq!(Application::new("ns", "app1").into_object().field("spec.application"), None);
    }
}
