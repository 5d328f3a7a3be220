//! Contract tests for ObjectStore.
//!
//! These tests verify the behavioral contract of the store trait using the
//! in-memory fake. Any conforming implementation must pass these.

use snapgate_state::fakes::MemoryObjectStore;
use snapgate_state::labels;
use snapgate_state::*;

fn snapshot(name: &str, app: &str) -> Snapshot {
    Snapshot {
        metadata: ObjectMeta::new("ns", name),
        spec: SnapshotSpec {
            application: app.to_string(),
            components: vec![SnapshotComponent::new("a", "r/a@sha1")],
            digest: None,
        },
        status: SnapshotStatus::default(),
    }
}

fn verdict(status: ConditionStatus) -> Condition {
    Condition::new("TestSucceeded", status, "Passed", "all passed")
}

// ===========================================================================
// get / create
// ===========================================================================

#[tokio::test]
async fn get_missing_returns_not_found() {
    let store = MemoryObjectStore::new();
    let err = store.get(Kind::Snapshot, "ns", "nope").await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn create_assigns_version_uid_and_timestamp() {
    let store = MemoryObjectStore::new();
    let created = store
        .create(snapshot("app1-1", "app1").into_object())
        .await
        .unwrap();

    let meta = created.metadata();
    assert!(meta.resource_version > 0);
    assert!(meta.uid.is_some());
    assert!(meta.creation_timestamp.is_some());

    let fetched = store.get(Kind::Snapshot, "ns", "app1-1").await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_duplicate_key_is_rejected() {
    let store = MemoryObjectStore::new();
    store
        .create(snapshot("app1-1", "app1").into_object())
        .await
        .unwrap();
    let err = store
        .create(snapshot("app1-1", "app1").into_object())
        .await
        .unwrap_err();

    assert!(err.is_already_exists());
    assert_eq!(store.all::<Snapshot>().len(), 1);
}

#[tokio::test]
async fn same_name_different_kind_does_not_collide() {
    let store = MemoryObjectStore::new();
    store
        .create(Application::new("ns", "app1").into_object())
        .await
        .unwrap();
    store
        .create(Component::new("ns", "app1", "app1").into_object())
        .await
        .unwrap();
}

#[tokio::test]
async fn create_without_name_is_invalid() {
    let store = MemoryObjectStore::new();
    let err = store
        .create(snapshot("", "app1").into_object())
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Invalid(_)));
}

// ===========================================================================
// list
// ===========================================================================

#[tokio::test]
async fn list_filters_by_field_and_namespace() {
    let store = MemoryObjectStore::with_objects([
        snapshot("app1-1", "app1").into_object(),
        snapshot("app1-2", "app1").into_object(),
        snapshot("app2-1", "app2").into_object(),
    ]);
    let mut elsewhere = snapshot("app1-3", "app1");
    elsewhere.metadata.namespace = "other".to_string();
    store.put(elsewhere.into_object());

    let query = ListQuery::of::<Snapshot>("ns").with_field(labels::FIELD_APPLICATION, "app1");
    let names: Vec<String> = store
        .list(&query)
        .await
        .unwrap()
        .iter()
        .map(|o| o.metadata().name.clone())
        .collect();

    assert_eq!(names, vec!["app1-1", "app1-2"]);
}

#[tokio::test]
async fn list_filters_by_every_label() {
    let run = |name: &str, scenario: &str| {
        PipelineRun::new("ns", name, PipelineType::Test)
            .with_label(labels::TEST_SNAPSHOT, "app1-1")
            .with_label(labels::TEST_SCENARIO, scenario)
            .into_object()
    };
    let store = MemoryObjectStore::with_objects([
        run("r1", "s1"),
        run("r2", "s2"),
        PipelineRun::new("ns", "b1", PipelineType::Build).into_object(),
    ]);

    let query = ListQuery::of::<PipelineRun>("ns")
        .with_label(labels::PIPELINE_TYPE, "test")
        .with_label(labels::TEST_SCENARIO, "s2");
    let found = store.list(&query).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].metadata().name, "r2");
}

// ===========================================================================
// patch_status
// ===========================================================================

#[tokio::test]
async fn patch_status_with_current_version_succeeds() {
    let store = MemoryObjectStore::new();
    let created = Snapshot::from_object(
        store
            .create(snapshot("app1-1", "app1").into_object())
            .await
            .unwrap(),
    )
    .unwrap();

    let patched = store
        .patch_status(StatusPatch::conditions(
            &created,
            vec![verdict(ConditionStatus::True)],
        ))
        .await
        .unwrap();
    let patched = Snapshot::from_object(patched).unwrap();

    assert!(patched.metadata.resource_version > created.metadata.resource_version);
    assert_eq!(
        patched.condition("TestSucceeded").map(|c| c.status),
        Some(ConditionStatus::True)
    );
}

#[tokio::test]
async fn patch_status_with_stale_version_conflicts() {
    let store = MemoryObjectStore::new();
    let created = Snapshot::from_object(
        store
            .create(snapshot("app1-1", "app1").into_object())
            .await
            .unwrap(),
    )
    .unwrap();

    store
        .patch_status(StatusPatch::conditions(
            &created,
            vec![verdict(ConditionStatus::True)],
        ))
        .await
        .unwrap();
    let err = store
        .patch_status(StatusPatch::conditions(
            &created,
            vec![verdict(ConditionStatus::False)],
        ))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    let stored: Snapshot = store.peek("ns", "app1-1").unwrap();
    assert_eq!(
        stored.condition("TestSucceeded").map(|c| c.status),
        Some(ConditionStatus::True)
    );
}

#[tokio::test]
async fn patch_status_on_kind_without_status_is_invalid() {
    let store = MemoryObjectStore::new();
    let app = Application::from_object(
        store
            .create(Application::new("ns", "app1").into_object())
            .await
            .unwrap(),
    )
    .unwrap();

    let err = store
        .patch_status(StatusPatch::conditions(&app, vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Invalid(_)));
}

#[tokio::test]
async fn patch_status_missing_object_is_not_found() {
    let store = MemoryObjectStore::new();
    let err = store
        .patch_status(StatusPatch::conditions(&snapshot("ghost", "app1"), vec![]))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

// ===========================================================================
// fault injection
// ===========================================================================

#[tokio::test]
async fn injected_fault_fires_once() {
    let store = MemoryObjectStore::with_objects([Application::new("ns", "app1").into_object()]);
    store.fail_next(
        StoreOperation::Get,
        StoreError::Backend("connection reset".to_string()),
    );

    let err = store.get(Kind::Application, "ns", "app1").await.unwrap_err();
    assert!(matches!(err, StoreError::Backend(_)));

    store.get(Kind::Application, "ns", "app1").await.unwrap();
    assert_eq!(store.call_count(StoreOperation::Get), 2);
}
