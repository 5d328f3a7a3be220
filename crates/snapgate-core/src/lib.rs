//! Snapgate Core Library
//!
//! Reacts to completed build and test PipelineRuns: keeps one Snapshot per
//! distinct component→image combination of an Application, and records
//! whether a Snapshot passed every required test scenario.

pub mod aggregator;
pub mod conditions;
pub mod config;
pub mod digest;
pub mod error;
pub mod image;
pub mod matcher;
pub mod obs;
pub mod orchestrator;
pub mod result;
pub mod session;
pub mod telemetry;

pub use aggregator::{
    is_required_scenario, latest_succeeded, run_passed, Aggregate, OutcomeAggregator, RunOutcome,
    Verdict,
};
pub use conditions::set_status_condition;
pub use config::ReconcilerConfig;
pub use digest::{canonical_components, snapshot_digest, snapshot_name};
pub use error::{ErrorClass, ReconcileError, ReconcileResult};
pub use image::{image_repository, output_image_pull_spec};
pub use matcher::{components_match, prepare_snapshot, MatchOutcome, SnapshotMatcher};
pub use obs::{
    emit_aggregation_incomplete, emit_operation_result, emit_run_outcome, emit_snapshot_created,
    emit_snapshot_found, emit_status_write_error, emit_verdict_written, reconcile_span,
};
pub use orchestrator::{Reconciler, REASON_SNAPSHOT_CREATION_FAILED};
pub use result::OperationResult;
pub use session::StoreSession;
pub use telemetry::init_tracing;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
