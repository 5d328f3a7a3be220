//! Reconciliation Orchestrator: the per-event entry point.
//!
//! Each handler is a function of (event, store contents at read time). It
//! holds no state between events; concurrent handlers for the same
//! Application or Snapshot coordinate only through the store's optimistic
//! concurrency on status patches and its key uniqueness on create.
//!
//! Error → signal mapping:
//! - Transient (store) failures: `RetryWithError`
//! - Permanent input failures: `RetryOrStop`, recorded on the PipelineRun
//! - Malformed test output: `RetryWithError`, or `RetryOrStop` when
//!   `retry_data_integrity` is off
//! - Failed Snapshot create: `RetryOrStop`

use std::sync::Arc;

use chrono::Utc;
use snapgate_state::{
    labels, Application, Component, Condition, ConditionStatus, ObjectStore, PipelineRun,
    PipelineType, Snapshot, StatusPatch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument};

use crate::aggregator::{Aggregate, OutcomeAggregator};
use crate::conditions::set_status_condition;
use crate::config::ReconcilerConfig;
use crate::error::{ErrorClass, ReconcileError, ReconcileResult};
use crate::image::output_image_pull_spec;
use crate::matcher::{MatchOutcome, SnapshotMatcher};
use crate::obs::{self, reconcile_span};
use crate::result::OperationResult;
use crate::session::StoreSession;

/// Condition reason when creating a Snapshot fails
pub const REASON_SNAPSHOT_CREATION_FAILED: &str = "SnapshotCreationFailed";

/// Reacts to PipelineRun completions.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ObjectStore>, config: ReconcilerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Dispatch a completed PipelineRun to the handler for its type.
    pub async fn handle(&self, run: &PipelineRun, cancel: CancellationToken) -> OperationResult {
        match run.pipeline_type() {
            Some(PipelineType::Build) => self.handle_build_completion(run, cancel).await,
            Some(PipelineType::Test) => self.handle_test_completion(run, cancel).await,
            None => {
                debug!(pipeline_run = %run.metadata.name, "not a build or test pipeline run");
                OperationResult::continue_processing()
            }
        }
    }

    /// Ensure a Snapshot exists for the image combination a build produced.
    pub async fn handle_build_completion(
        &self,
        run: &PipelineRun,
        cancel: CancellationToken,
    ) -> OperationResult {
        if !run.is_build() || !run.has_finished() {
            return OperationResult::continue_processing();
        }
        let session = StoreSession::new(Arc::clone(&self.store), cancel);
        async {
            let result = self.ensure_snapshot_exists(&session, run).await;
            obs::emit_operation_result("ensure_snapshot_exists", &result);
            result
        }
        .instrument(reconcile_span(run))
        .await
    }

    /// Recompute and record the verdict of the Snapshot a test run exercised.
    pub async fn handle_test_completion(
        &self,
        run: &PipelineRun,
        cancel: CancellationToken,
    ) -> OperationResult {
        if !run.is_test() || !run.has_finished() {
            return OperationResult::continue_processing();
        }
        let session = StoreSession::new(Arc::clone(&self.store), cancel);
        async {
            let result = self.ensure_snapshot_passed_all_tests(&session, run).await;
            obs::emit_operation_result("ensure_snapshot_passed_all_tests", &result);
            result
        }
        .instrument(reconcile_span(run))
        .await
    }

    async fn ensure_snapshot_exists(
        &self,
        session: &StoreSession,
        run: &PipelineRun,
    ) -> OperationResult {
        let (application, component) = match self.load_build_context(session, run).await {
            Ok(context) => context,
            Err(err) => return self.fail(session, run, err).await,
        };
        let image = match output_image_pull_spec(run) {
            Ok(image) => image,
            Err(err) => return self.fail(session, run, err).await,
        };

        let matcher = SnapshotMatcher::new(session);
        let desired = match matcher
            .desired_components(&application, &component, &image)
            .await
        {
            Ok(desired) => desired,
            Err(err) => return self.fail(session, run, err).await,
        };

        match matcher.find_matching_snapshot(&application, &desired).await {
            Ok(Some(existing)) => {
                obs::emit_snapshot_found(&existing);
                return OperationResult::continue_processing();
            }
            Ok(None) => {}
            Err(err) => return self.fail(session, run, err).await,
        }

        match matcher
            .create_snapshot(&application, &component, desired)
            .await
        {
            Ok(MatchOutcome::Created(snapshot)) => {
                obs::emit_snapshot_created(&snapshot);
                OperationResult::continue_processing()
            }
            Ok(MatchOutcome::Found(snapshot)) => {
                obs::emit_snapshot_found(&snapshot);
                OperationResult::continue_processing()
            }
            Err(err) => {
                error!(
                    application = %application.metadata.name,
                    namespace = %application.metadata.namespace,
                    error = %err,
                    "failed to create snapshot"
                );
                self.record_failure(session, run, err, REASON_SNAPSHOT_CREATION_FAILED)
                    .await
            }
        }
    }

    async fn ensure_snapshot_passed_all_tests(
        &self,
        session: &StoreSession,
        run: &PipelineRun,
    ) -> OperationResult {
        let snapshot = match self.load_snapshot(session, run).await {
            Ok(snapshot) => snapshot,
            Err(err) => return self.fail(session, run, err).await,
        };

        let aggregator = OutcomeAggregator::new(session, &self.config);
        let verdict = match aggregator.aggregate(&snapshot, run).await {
            Ok(Aggregate::Incomplete { .. }) => return OperationResult::continue_processing(),
            Ok(Aggregate::Complete { verdict, .. }) => verdict,
            Err(err) => {
                error!(
                    snapshot = %snapshot.metadata.name,
                    error = %err,
                    "failed to determine test outcomes"
                );
                return self.fail(session, run, err).await;
            }
        };

        match aggregator.write_verdict(&snapshot, verdict).await {
            Ok(_) => {
                info!(
                    application = %snapshot.spec.application,
                    snapshot = %snapshot.metadata.name,
                    verdict = verdict.reason(),
                    "all required test runs reported"
                );
                OperationResult::continue_processing()
            }
            Err(err) => self.fail(session, run, err).await,
        }
    }

    async fn load_build_context(
        &self,
        session: &StoreSession,
        run: &PipelineRun,
    ) -> ReconcileResult<(Application, Component)> {
        let namespace = &run.metadata.namespace;
        let component_name =
            run.label(labels::COMPONENT)
                .ok_or_else(|| ReconcileError::MissingLabel {
                    pipeline_run: run.metadata.name.clone(),
                    label: labels::COMPONENT.to_string(),
                })?;
        let component: Component = session.get(namespace, component_name).await?;

        let application_name = run
            .label(labels::APPLICATION)
            .unwrap_or(component.spec.application.as_str());
        let application: Application = session.get(namespace, application_name).await?;
        Ok((application, component))
    }

    async fn load_snapshot(
        &self,
        session: &StoreSession,
        run: &PipelineRun,
    ) -> ReconcileResult<Snapshot> {
        let name = run.label(labels::TEST_SNAPSHOT).ok_or_else(|| {
            ReconcileError::MissingSnapshotReference {
                pipeline_run: run.metadata.name.clone(),
            }
        })?;
        let snapshot: Snapshot = session.get(&run.metadata.namespace, name).await?;
        debug!(
            snapshot = %snapshot.metadata.name,
            components = snapshot.spec.components.len(),
            "resolved snapshot"
        );
        Ok(snapshot)
    }

    /// Translate an error into a signal according to its class.
    async fn fail(
        &self,
        session: &StoreSession,
        run: &PipelineRun,
        err: ReconcileError,
    ) -> OperationResult {
        let retry = match err.class() {
            ErrorClass::Transient => true,
            ErrorClass::PermanentInput => false,
            ErrorClass::DataIntegrity => self.config.retry_data_integrity,
        };
        if retry {
            return OperationResult::retry_with_error(err);
        }
        let reason = err.reason();
        self.record_failure(session, run, err, reason).await
    }

    /// Record `cause` on the PipelineRun, then stop unless that write fails.
    async fn record_failure(
        &self,
        session: &StoreSession,
        run: &PipelineRun,
        cause: ReconcileError,
        reason: &str,
    ) -> OperationResult {
        let status_write = self.write_failure_status(session, run, &cause, reason).await;
        if let Err(err) = &status_write {
            obs::emit_status_write_error(run, err);
        }
        OperationResult::retry_on_error_or_stop(cause, status_write)
    }

    async fn write_failure_status(
        &self,
        session: &StoreSession,
        run: &PipelineRun,
        cause: &ReconcileError,
        reason: &str,
    ) -> ReconcileResult<()> {
        let current: PipelineRun = match session
            .get(&run.metadata.namespace, &run.metadata.name)
            .await
        {
            Ok(current) => current,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let mut conditions = current.status.conditions.clone();
        let condition = Condition::new(
            self.config.reconciled_condition_type.clone(),
            ConditionStatus::False,
            reason,
            cause.to_string(),
        );
        if !set_status_condition(&mut conditions, condition, Utc::now()) {
            return Ok(());
        }
        session
            .patch_status::<PipelineRun>(StatusPatch::conditions(&current, conditions))
            .await?;
        Ok(())
    }
}
