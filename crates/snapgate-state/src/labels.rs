//! Well-known label and field keys.

/// Pipeline type of a PipelineRun (`build` or `test`)
pub const PIPELINE_TYPE: &str = "pipelines.appstudio.openshift.io/type";

/// Application a PipelineRun belongs to
pub const APPLICATION: &str = "appstudio.openshift.io/application";

/// Component a build PipelineRun built
pub const COMPONENT: &str = "appstudio.openshift.io/component";

/// Snapshot a test PipelineRun exercised
pub const TEST_SNAPSHOT: &str = "test.appstudio.openshift.io/snapshot";

/// TestScenario a test PipelineRun executed
pub const TEST_SCENARIO: &str = "test.appstudio.openshift.io/scenario";

/// Optional marker on a TestScenario
pub const SCENARIO_OPTIONAL: &str = "test.appstudio.openshift.io/optional";

/// Component whose build produced a Snapshot
pub const SNAPSHOT_COMPONENT: &str = "component";

/// Indexed field holding the owning Application
pub const FIELD_APPLICATION: &str = "spec.application";
