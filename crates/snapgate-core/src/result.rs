//! Tri-state signal returned to the event's caller.

use crate::error::ReconcileError;

/// What the caller should do with the event after an operation ran.
#[derive(Debug)]
pub enum OperationResult {
    /// Nothing further to do for this event.
    Continue,
    /// Transient failure; redeliver the event (backoff is the caller's concern).
    RetryWithError(ReconcileError),
    /// The operation failed with `cause` and a best-effort status write
    /// recorded it on the subject record. The event is retried only if that
    /// write itself failed; otherwise processing stops and `cause` is dropped.
    RetryOrStop {
        cause: ReconcileError,
        status_write: Result<(), ReconcileError>,
    },
}

impl OperationResult {
    pub fn continue_processing() -> Self {
        OperationResult::Continue
    }

    pub fn retry_with_error(err: impl Into<ReconcileError>) -> Self {
        OperationResult::RetryWithError(err.into())
    }

    pub fn retry_on_error_or_stop(
        cause: ReconcileError,
        status_write: Result<(), ReconcileError>,
    ) -> Self {
        OperationResult::RetryOrStop {
            cause,
            status_write,
        }
    }

    /// Whether the event must be redelivered.
    pub fn requeue(&self) -> bool {
        match self {
            OperationResult::Continue => false,
            OperationResult::RetryWithError(_) => true,
            OperationResult::RetryOrStop { status_write, .. } => status_write.is_err(),
        }
    }

    /// Whether processing stopped after recording a failure.
    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            OperationResult::RetryOrStop {
                status_write: Ok(()),
                ..
            }
        )
    }

    /// The error the caller should report when requeueing.
    pub fn error(&self) -> Option<&ReconcileError> {
        match self {
            OperationResult::Continue => None,
            OperationResult::RetryWithError(err) => Some(err),
            OperationResult::RetryOrStop {
                status_write: Err(err),
                ..
            } => Some(err),
            OperationResult::RetryOrStop { .. } => None,
        }
    }

    /// Failure underlying this result, whether or not it is retried.
    pub fn cause(&self) -> Option<&ReconcileError> {
        match self {
            OperationResult::Continue => None,
            OperationResult::RetryWithError(err) => Some(err),
            OperationResult::RetryOrStop { cause, .. } => Some(cause),
        }
    }

    /// Short label for logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            OperationResult::Continue => "continue",
            OperationResult::RetryWithError(_) => "retry",
            OperationResult::RetryOrStop { .. } if self.requeue() => "retry",
            OperationResult::RetryOrStop { .. } => "stop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapgate_state::StoreError;

    fn missing_snapshot() -> ReconcileError {
        ReconcileError::MissingSnapshotReference {
            pipeline_run: "run".to_string(),
        }
    }

    #[test]
    fn test_continue_never_requeues() {
        let result = OperationResult::continue_processing();
        assert!(!result.requeue());
        assert!(!result.is_stop());
        assert!(result.error().is_none());
        assert_eq!(result.label(), "continue");
    }

    #[test]
    fn test_retry_with_error_requeues() {
        let result = OperationResult::retry_with_error(StoreError::Cancelled);
        assert!(result.requeue());
        assert!(result.error().is_some());
        assert_eq!(result.label(), "retry");
    }

    #[test]
    fn test_retry_or_stop_stops_when_status_written() {
        let result = OperationResult::retry_on_error_or_stop(missing_snapshot(), Ok(()));
        assert!(!result.requeue());
        assert!(result.is_stop());
        assert!(result.error().is_none());
        assert!(result.cause().is_some());
        assert_eq!(result.label(), "stop");
    }

    #[test]
    fn test_retry_or_stop_requeues_when_status_write_fails() {
        let result = OperationResult::retry_on_error_or_stop(
            missing_snapshot(),
            Err(StoreError::Backend("down".to_string()).into()),
        );
        assert!(result.requeue());
        assert!(!result.is_stop());
        assert!(matches!(result.error(), Some(ReconcileError::Store(_))));
        assert_eq!(result.label(), "retry");
    }
}
