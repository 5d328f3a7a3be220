//! Reconciler configuration.

use serde::{Deserialize, Serialize};

/// Task result carrying a test task's JSON outcome
pub const DEFAULT_TEST_OUTPUT_RESULT: &str = "HACBS_TEST_OUTPUT";

/// Snapshot condition holding the aggregate verdict
pub const DEFAULT_VERDICT_CONDITION: &str = "TestSucceeded";

/// PipelineRun condition recording reconcile failures
pub const DEFAULT_RECONCILED_CONDITION: &str = "SnapshotReconciled";

/// Configuration for a [`Reconciler`](crate::orchestrator::Reconciler)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Task result name scanned for test outcomes (default: "HACBS_TEST_OUTPUT")
    pub test_output_result: String,
    /// Condition type of the Snapshot verdict (default: "TestSucceeded")
    pub verdict_condition_type: String,
    /// Condition type written on PipelineRuns when reconciling fails
    pub reconciled_condition_type: String,
    /// Redeliver events whose test output cannot be parsed (default: true).
    /// When false, the failure is recorded on the PipelineRun and processing stops.
    pub retry_data_integrity: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            test_output_result: DEFAULT_TEST_OUTPUT_RESULT.to_string(),
            verdict_condition_type: DEFAULT_VERDICT_CONDITION.to_string(),
            reconciled_condition_type: DEFAULT_RECONCILED_CONDITION.to_string(),
            retry_data_integrity: true,
        }
    }
}

impl ReconcilerConfig {
    /// Set custom verdict condition type
    pub fn with_verdict_condition_type(mut self, condition_type: impl Into<String>) -> Self {
        self.verdict_condition_type = condition_type.into();
        self
    }

    /// Set whether malformed test output is retried
    pub fn with_retry_data_integrity(mut self, retry: bool) -> Self {
        self.retry_data_integrity = retry;
        self
    }

    /// Create from environment variables
    ///
    /// Reads (all optional, defaults as in [`Default`]):
    /// - SNAPGATE_TEST_OUTPUT_RESULT
    /// - SNAPGATE_VERDICT_CONDITION
    /// - SNAPGATE_RECONCILED_CONDITION
    /// - SNAPGATE_RETRY_DATA_INTEGRITY ("true" / "false")
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(v) = lookup("SNAPGATE_TEST_OUTPUT_RESULT") {
            config.test_output_result = v;
        }
        if let Some(v) = lookup("SNAPGATE_VERDICT_CONDITION") {
            config.verdict_condition_type = v;
        }
        if let Some(v) = lookup("SNAPGATE_RECONCILED_CONDITION") {
            config.reconciled_condition_type = v;
        }
        if let Some(v) = lookup("SNAPGATE_RETRY_DATA_INTEGRITY") {
            config.retry_data_integrity = v.parse().map_err(|_| {
                format!("SNAPGATE_RETRY_DATA_INTEGRITY must be true or false, got {v:?}")
            })?;
        }
        Ok(config)
    }
}
