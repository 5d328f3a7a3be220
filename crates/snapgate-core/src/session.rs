//! Cancellable, typed access to the object store for a single event.

use std::future::Future;
use std::sync::Arc;

use snapgate_state::{ListQuery, ObjectStore, Resource, StatusPatch, StoreError, StoreResult};
use tokio_util::sync::CancellationToken;

/// Store handle scoped to one event.
///
/// Every call races against the event's cancellation token; an aborted call
/// surfaces as [`StoreError::Cancelled`].
#[derive(Clone)]
pub struct StoreSession {
    store: Arc<dyn ObjectStore>,
    cancel: CancellationToken,
}

impl StoreSession {
    pub fn new(store: Arc<dyn ObjectStore>, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    async fn guard<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            result = call => result,
        }
    }

    pub async fn get<R: Resource>(&self, namespace: &str, name: &str) -> StoreResult<R> {
        let object = self
            .guard(self.store.get(R::KIND, namespace, name))
            .await?;
        R::from_object(object)
    }

    pub async fn list<R: Resource>(&self, query: &ListQuery) -> StoreResult<Vec<R>> {
        if query.kind != R::KIND {
            return Err(StoreError::Invalid(format!(
                "query for {} used to list {}",
                query.kind,
                R::KIND
            )));
        }
        self.guard(self.store.list(query))
            .await?
            .into_iter()
            .map(R::from_object)
            .collect()
    }

    pub async fn create<R: Resource>(&self, resource: R) -> StoreResult<R> {
        let object = self.guard(self.store.create(resource.into_object())).await?;
        R::from_object(object)
    }

    pub async fn patch_status<R: Resource>(&self, patch: StatusPatch) -> StoreResult<R> {
        if patch.kind != R::KIND {
            return Err(StoreError::Invalid(format!(
                "status patch for {} applied as {}",
                patch.kind,
                R::KIND
            )));
        }
        let object = self.guard(self.store.patch_status(patch)).await?;
        R::from_object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use snapgate_state::fakes::MemoryObjectStore;
    use snapgate_state::{Application, Kind, StoredObject};

    /// Store whose reads never complete.
    struct StalledStore;

    #[async_trait]
    impl ObjectStore for StalledStore {
        async fn get(&self, _: Kind, _: &str, _: &str) -> StoreResult<StoredObject> {
            futures::future::pending().await
        }
        async fn list(&self, _: &ListQuery) -> StoreResult<Vec<StoredObject>> {
            futures::future::pending().await
        }
        async fn create(&self, _: StoredObject) -> StoreResult<StoredObject> {
            futures::future::pending().await
        }
        async fn patch_status(&self, _: StatusPatch) -> StoreResult<StoredObject> {
            futures::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_typed_get() {
        let store = Arc::new(MemoryObjectStore::with_objects([
            Application::new("ns", "app1").into_object(),
        ]));
        let session = StoreSession::new(store, CancellationToken::new());

        let app: Application = session.get("ns", "app1").await.unwrap();
        assert_eq!(app.metadata.name, "app1");
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let store = Arc::new(MemoryObjectStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let session = StoreSession::new(store.clone(), cancel);

        let err = session.get::<Application>("ns", "app1").await.unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
        assert_eq!(store.call_count(snapgate_state::StoreOperation::Get), 0);
    }

    #[tokio::test]
    async fn test_in_flight_call_is_aborted() {
        let cancel = CancellationToken::new();
        let session = StoreSession::new(Arc::new(StalledStore), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        let err = session.get::<Application>("ns", "app1").await.unwrap_err();
        assert_eq!(err, StoreError::Cancelled);
    }

    #[tokio::test]
    async fn test_list_rejects_mismatched_kind() {
        let store = Arc::new(MemoryObjectStore::new());
        let session = StoreSession::new(store, CancellationToken::new());
        let query = ListQuery::new(Kind::Snapshot, "ns");

        let err = session.list::<Application>(&query).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }
}
