//! Reconcile error taxonomy.

use snapgate_state::StoreError;

/// How a failure should be treated by the event's caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Store connectivity, version conflicts, cancellation. Redeliver the event.
    Transient,
    /// The event itself can never succeed. Record the reason and stop.
    PermanentInput,
    /// Stored payloads that cannot be interpreted.
    DataIntegrity,
}

/// Errors produced while reconciling a PipelineRun event.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("pipeline run {pipeline_run} has no snapshot associated with it")]
    MissingSnapshotReference { pipeline_run: String },

    #[error("pipeline run {pipeline_run} is missing required label {label}")]
    MissingLabel { pipeline_run: String, label: String },

    #[error("build pipeline run {pipeline_run} has no usable output image: {reason}")]
    InvalidBuildOutput { pipeline_run: String, reason: String },

    #[error("malformed test output {result} in pipeline run {pipeline_run}: {source}")]
    MalformedTestOutput {
        pipeline_run: String,
        result: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ReconcileError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ReconcileError::Store(_) => ErrorClass::Transient,
            ReconcileError::MissingSnapshotReference { .. }
            | ReconcileError::MissingLabel { .. }
            | ReconcileError::InvalidBuildOutput { .. } => ErrorClass::PermanentInput,
            ReconcileError::MalformedTestOutput { .. } => ErrorClass::DataIntegrity,
        }
    }

    /// Short machine-readable reason used on status conditions.
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileError::Store(_) => "StoreUnavailable",
            ReconcileError::MissingSnapshotReference { .. } => "MissingSnapshot",
            ReconcileError::MissingLabel { .. } => "InvalidPipelineRun",
            ReconcileError::InvalidBuildOutput { .. } => "InvalidBuildOutput",
            ReconcileError::MalformedTestOutput { .. } => "MalformedTestOutput",
        }
    }

    /// The wrapped store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ReconcileError::Store(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for reconcile operations.
pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;
