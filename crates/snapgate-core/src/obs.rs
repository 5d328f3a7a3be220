//! Structured observability hooks for reconcile events.
//!
//! This module provides:
//! - Event-scoped tracing spans via `reconcile_span`
//! - Emission functions for the decisions the reconciler makes
//!
//! Events are emitted at `info!` level unless noted. For JSON output,
//! initialise tracing with `init_tracing(true, ..)`.

use snapgate_state::{PipelineRun, Snapshot};
use tracing::{info, warn};

use crate::result::OperationResult;

/// Span scoping all logs of one reconcile event.
///
/// # Example
///
/// ```ignore
/// handle(&run).instrument(reconcile_span(&run)).await;
/// // every log line now carries pipeline_run, namespace and kind
/// ```
pub fn reconcile_span(run: &PipelineRun) -> tracing::Span {
    let kind = run.pipeline_type().map(|t| t.as_str()).unwrap_or("unknown");
    tracing::info_span!(
        "snapgate.reconcile",
        pipeline_run = %run.metadata.name,
        namespace = %run.metadata.namespace,
        kind = kind,
    )
}

fn component_list(snapshot: &Snapshot) -> String {
    snapshot
        .spec
        .components
        .iter()
        .map(|c| format!("{}={}", c.name, c.container_image))
        .collect::<Vec<_>>()
        .join(",")
}

/// Emit event: an existing Snapshot already holds the desired combination.
pub fn emit_snapshot_found(snapshot: &Snapshot) {
    info!(
        event = "snapshot.found",
        application = %snapshot.spec.application,
        snapshot = %snapshot.metadata.name,
        components = %component_list(snapshot),
    );
}

/// Emit event: a new Snapshot was created.
pub fn emit_snapshot_created(snapshot: &Snapshot) {
    info!(
        event = "snapshot.created",
        application = %snapshot.spec.application,
        snapshot = %snapshot.metadata.name,
        components = %component_list(snapshot),
    );
}

/// Emit event: a required scenario has no succeeded run yet.
pub fn emit_aggregation_incomplete(snapshot: &Snapshot, required: usize, resolved: usize) {
    info!(
        event = "aggregation.incomplete",
        snapshot = %snapshot.metadata.name,
        required = required,
        resolved = resolved,
    );
}

/// Emit event: one test run's outcome was evaluated.
pub fn emit_run_outcome(run: &PipelineRun, passed: bool) {
    info!(
        event = "aggregation.run_outcome",
        pipeline_run = %run.metadata.name,
        passed = passed,
    );
}

/// Emit event: the verdict condition was written (or already current).
pub fn emit_verdict_written(snapshot: &Snapshot, passed: bool, changed: bool) {
    info!(
        event = "verdict.written",
        snapshot = %snapshot.metadata.name,
        passed = passed,
        changed = changed,
    );
}

/// Emit event: an operation finished with the given signal.
pub fn emit_operation_result(operation: &str, result: &OperationResult) {
    match result.cause() {
        Some(cause) => warn!(
            event = "reconcile.result",
            operation = operation,
            result = result.label(),
            error = %cause,
        ),
        None => info!(
            event = "reconcile.result",
            operation = operation,
            result = result.label(),
        ),
    }
}

/// Emit event: the best-effort failure status write failed (warning level).
pub fn emit_status_write_error(run: &PipelineRun, error: &dyn std::fmt::Display) {
    warn!(
        event = "status.write_error",
        pipeline_run = %run.metadata.name,
        error = %error,
    );
}
