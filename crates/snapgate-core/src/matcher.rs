//! Snapshot Matcher: turns a build completion into a canonical Snapshot.
//!
//! The desired combination is the Application's current component→image
//! mapping with the built Component's new image overlaid. Existing Snapshots
//! are compared by set equality; when none matches, a Snapshot is created
//! under a content-addressed name so that concurrent creators of the same
//! combination collide on the key instead of producing duplicates.

use std::collections::BTreeMap;

use snapgate_state::{
    labels, Application, Component, ListQuery, ObjectMeta, Snapshot, SnapshotComponent,
    SnapshotSpec, SnapshotStatus, StoreError,
};
use tracing::debug;

use crate::digest::{snapshot_digest, snapshot_name};
use crate::error::ReconcileResult;
use crate::session::StoreSession;

/// Outcome of ensuring a Snapshot exists.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// An equal Snapshot already existed.
    Found(Snapshot),
    /// A new Snapshot was written by this call.
    Created(Snapshot),
}

/// Set equality of two component lists: same size and every pair present
/// in the other, regardless of order.
pub fn components_match(left: &[SnapshotComponent], right: &[SnapshotComponent]) -> bool {
    left.len() == right.len()
        && left.iter().all(|c| right.contains(c))
        && right.iter().all(|c| left.contains(c))
}

/// Finds or creates the Snapshot for an Application's component combination.
pub struct SnapshotMatcher<'a> {
    session: &'a StoreSession,
}

impl<'a> SnapshotMatcher<'a> {
    pub fn new(session: &'a StoreSession) -> Self {
        Self { session }
    }

    /// The Application's component images with `component` overlaid by `image`.
    ///
    /// Ordered by component name.
    pub async fn desired_components(
        &self,
        application: &Application,
        component: &Component,
        image: &str,
    ) -> ReconcileResult<Vec<SnapshotComponent>> {
        let query = ListQuery::of::<Component>(application.metadata.namespace.clone())
            .with_field(labels::FIELD_APPLICATION, application.metadata.name.clone());
        let components: Vec<Component> = self.session.list(&query).await?;

        let mut images: BTreeMap<String, String> = components
            .into_iter()
            .map(|c| {
                let image = c.status.container_image.unwrap_or_default();
                (c.metadata.name, image)
            })
            .collect();
        images.insert(component.metadata.name.clone(), image.to_string());

        Ok(images
            .into_iter()
            .map(|(name, image)| SnapshotComponent::new(name, image))
            .collect())
    }

    /// All Snapshots of `application`.
    pub async fn application_snapshots(
        &self,
        application: &Application,
    ) -> ReconcileResult<Vec<Snapshot>> {
        let query = ListQuery::of::<Snapshot>(application.metadata.namespace.clone())
            .with_field(labels::FIELD_APPLICATION, application.metadata.name.clone());
        Ok(self.session.list(&query).await?)
    }

    /// First existing Snapshot of `application` equal to `desired`.
    pub async fn find_matching_snapshot(
        &self,
        application: &Application,
        desired: &[SnapshotComponent],
    ) -> ReconcileResult<Option<Snapshot>> {
        let snapshots = self.application_snapshots(application).await?;
        debug!(
            application = %application.metadata.name,
            candidates = snapshots.len(),
            "comparing snapshots"
        );
        Ok(snapshots
            .into_iter()
            .find(|s| components_match(desired, &s.spec.components)))
    }

    /// Create the Snapshot for `desired`, or return the one that won the race.
    ///
    /// A key collision with a Snapshot holding a different combination is
    /// reported as the `AlreadyExists` error itself.
    pub async fn create_snapshot(
        &self,
        application: &Application,
        component: &Component,
        desired: Vec<SnapshotComponent>,
    ) -> ReconcileResult<MatchOutcome> {
        let snapshot = prepare_snapshot(application, component, desired);
        match self.session.create(snapshot.clone()).await {
            Ok(created) => Ok(MatchOutcome::Created(created)),
            Err(err @ StoreError::AlreadyExists { .. }) => {
                let existing: Snapshot = self
                    .session
                    .get(&snapshot.metadata.namespace, &snapshot.metadata.name)
                    .await?;
                if components_match(&snapshot.spec.components, &existing.spec.components) {
                    debug!(snapshot = %existing.metadata.name, "snapshot created concurrently");
                    Ok(MatchOutcome::Found(existing))
                } else {
                    Err(err.into())
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Snapshot record for `components`, named by their content digest.
pub fn prepare_snapshot(
    application: &Application,
    component: &Component,
    components: Vec<SnapshotComponent>,
) -> Snapshot {
    let digest = snapshot_digest(&components);
    let metadata = ObjectMeta::new(
        application.metadata.namespace.clone(),
        snapshot_name(&application.metadata.name, &digest),
    )
    .with_label(labels::SNAPSHOT_COMPONENT, component.metadata.name.clone())
    .with_label(labels::APPLICATION, application.metadata.name.clone());

    Snapshot {
        metadata,
        spec: SnapshotSpec {
            application: application.metadata.name.clone(),
            components,
            digest: Some(digest.as_str().to_string()),
        },
        status: SnapshotStatus::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, image: &str) -> SnapshotComponent {
        SnapshotComponent::new(name, image)
    }

    #[test]
    fn test_match_is_order_independent() {
        let a = [pair("A", "img1"), pair("B", "img2")];
        let b = [pair("B", "img2"), pair("A", "img1")];
        assert!(components_match(&a, &b));
        assert!(components_match(&b, &a));
    }

    #[test]
    fn test_match_requires_same_size() {
        let a = [pair("A", "img1")];
        let b = [pair("A", "img1"), pair("B", "img2")];
        assert!(!components_match(&a, &b));
        assert!(!components_match(&b, &a));
    }

    #[test]
    fn test_match_is_symmetric_with_duplicates() {
        // same length, but the left side repeats a pair the right lacks
        let a = [pair("A", "img1"), pair("A", "img1")];
        let b = [pair("A", "img1"), pair("B", "img2")];
        assert!(!components_match(&a, &b));
        assert!(!components_match(&b, &a));
    }

    #[test]
    fn test_match_compares_images() {
        let a = [pair("A", "img1"), pair("B", "img2")];
        let b = [pair("A", "img3"), pair("B", "img2")];
        assert!(!components_match(&a, &b));
    }

    #[test]
    fn test_prepare_snapshot_is_content_addressed() {
        let app = Application::new("ns", "app1");
        let component = Component::new("ns", "A", "app1");
        let first = prepare_snapshot(&app, &component, vec![pair("A", "i1"), pair("B", "i2")]);
        let second = prepare_snapshot(&app, &component, vec![pair("B", "i2"), pair("A", "i1")]);

        assert_eq!(first.metadata.name, second.metadata.name);
        assert!(first.metadata.name.starts_with("app1-"));
        assert_eq!(first.metadata.label(labels::SNAPSHOT_COMPONENT), Some("A"));
        assert_eq!(first.spec.digest, second.spec.digest);
    }
}
