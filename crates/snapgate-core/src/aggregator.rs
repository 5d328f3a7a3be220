//! Outcome Aggregator: reduces the test runs of a Snapshot to one verdict.
//!
//! 1. Required scenarios: the Application's TestScenarios accepted by
//!    [`is_required_scenario`].
//! 2. One run per scenario: the triggering run when its scenario label
//!    matches, otherwise the latest succeeded run for (snapshot, scenario).
//! 3. Completeness: every required scenario must have a resolved run.
//! 4. Per-run outcome from the test output task results.
//! 5. Verdict: Passed iff every resolved run passed.

use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use snapgate_state::{
    labels, Condition, ConditionStatus, ListQuery, PipelineRun, PipelineType, Snapshot,
    StatusPatch, TestScenario,
};
use tracing::{debug, info};

use crate::conditions::set_status_condition;
use crate::config::ReconcilerConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::obs;
use crate::session::StoreSession;

/// Test output values that count as a pass
const PASSING_RESULTS: [&str; 2] = ["SUCCESS", "SKIPPED"];

/// Whether a scenario must report before a verdict is computed.
///
/// Any scenario whose optional label is not exactly `"false"` is selected,
/// including one labeled `optional=true` and one without the label.
pub fn is_required_scenario(scenario: &TestScenario) -> bool {
    scenario.metadata.label(labels::SCENARIO_OPTIONAL) != Some("false")
}

/// Aggregate verdict of a Snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            Verdict::Passed
        } else {
            Verdict::Failed
        }
    }

    pub fn is_passed(&self) -> bool {
        *self == Verdict::Passed
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Verdict::Passed => "Passed",
            Verdict::Failed => "Failed",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Passed => "All Integration Pipeline tests passed",
            Verdict::Failed => "Some Integration pipeline tests failed",
        }
    }

    /// Condition recording this verdict.
    pub fn condition(&self, condition_type: &str) -> Condition {
        Condition::new(
            condition_type,
            ConditionStatus::from(self.is_passed()),
            self.reason(),
            self.message(),
        )
    }
}

/// Outcome of one resolved test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub pipeline_run: String,
    pub scenario: Option<String>,
    pub passed: bool,
}

/// Result of aggregating a Snapshot's test runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// Some required scenarios have no succeeded run yet.
    Incomplete { required: usize, resolved: usize },
    /// Every required scenario resolved.
    Complete {
        verdict: Verdict,
        runs: Vec<RunOutcome>,
    },
}

/// Whether a test run passed, judged by its test output task results.
///
/// Fails if any result named `result_name` has a `result` field other than
/// `SUCCESS` or `SKIPPED`. A run without any such result passes.
pub fn run_passed(run: &PipelineRun, result_name: &str) -> ReconcileResult<bool> {
    for task_result in run
        .status
        .task_results
        .iter()
        .filter(|r| r.name == result_name)
    {
        let output: Value = serde_json::from_str(&task_result.value).map_err(|source| {
            ReconcileError::MalformedTestOutput {
                pipeline_run: run.metadata.name.clone(),
                result: result_name.to_string(),
                source,
            }
        })?;
        let result = output.get("result").and_then(Value::as_str);
        debug!(
            pipeline_run = %run.metadata.name,
            task = task_result.task.as_deref().unwrap_or("-"),
            result = result.unwrap_or("<missing>"),
            "found test output"
        );
        if !result.is_some_and(|r| PASSING_RESULTS.contains(&r)) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The succeeded run with the latest completion time. Ties keep the first.
pub fn latest_succeeded(runs: impl IntoIterator<Item = PipelineRun>) -> Option<PipelineRun> {
    runs.into_iter()
        .filter(|r| r.status.succeeded)
        .fold(None, |latest: Option<PipelineRun>, run| match latest {
            Some(current) if run.status.completion_time <= current.status.completion_time => {
                Some(current)
            }
            _ => Some(run),
        })
}

/// Collects and reduces the test runs required for a Snapshot.
pub struct OutcomeAggregator<'a> {
    session: &'a StoreSession,
    config: &'a ReconcilerConfig,
}

impl<'a> OutcomeAggregator<'a> {
    pub fn new(session: &'a StoreSession, config: &'a ReconcilerConfig) -> Self {
        Self { session, config }
    }

    /// Scenarios of the Snapshot's Application that must report.
    pub async fn required_scenarios(
        &self,
        snapshot: &Snapshot,
    ) -> ReconcileResult<Vec<TestScenario>> {
        let query = ListQuery::of::<TestScenario>(snapshot.metadata.namespace.clone())
            .with_field(labels::FIELD_APPLICATION, snapshot.spec.application.clone());
        let scenarios: Vec<TestScenario> = self.session.list(&query).await?;
        Ok(scenarios.into_iter().filter(is_required_scenario).collect())
    }

    /// Latest succeeded test run for (snapshot, scenario), if any.
    pub async fn latest_run_for_scenario(
        &self,
        snapshot: &Snapshot,
        scenario: &TestScenario,
    ) -> ReconcileResult<Option<PipelineRun>> {
        let query = ListQuery::of::<PipelineRun>(snapshot.metadata.namespace.clone())
            .with_label(labels::PIPELINE_TYPE, PipelineType::Test.as_str())
            .with_label(labels::TEST_SNAPSHOT, snapshot.metadata.name.clone())
            .with_label(labels::TEST_SCENARIO, scenario.metadata.name.clone());
        let runs: Vec<PipelineRun> = self.session.list(&query).await?;
        Ok(latest_succeeded(runs))
    }

    /// One run per required scenario; unresolved scenarios are left out.
    pub async fn resolve_runs(
        &self,
        snapshot: &Snapshot,
        scenarios: &[TestScenario],
        trigger: &PipelineRun,
    ) -> ReconcileResult<Vec<PipelineRun>> {
        let trigger_scenario = trigger.label(labels::TEST_SCENARIO);
        let lookups = scenarios.iter().map(|scenario| async move {
            if trigger_scenario == Some(scenario.metadata.name.as_str()) {
                debug!(
                    scenario = %scenario.metadata.name,
                    pipeline_run = %trigger.metadata.name,
                    "triggering run matches scenario"
                );
                return Ok(Some(trigger.clone()));
            }
            let found = self.latest_run_for_scenario(snapshot, scenario).await?;
            if let Some(run) = &found {
                debug!(
                    scenario = %scenario.metadata.name,
                    pipeline_run = %run.metadata.name,
                    "found existing test run"
                );
            }
            Ok::<_, ReconcileError>(found)
        });
        Ok(try_join_all(lookups).await?.into_iter().flatten().collect())
    }

    /// Compute the Snapshot's aggregate without writing anything.
    pub async fn aggregate(
        &self,
        snapshot: &Snapshot,
        trigger: &PipelineRun,
    ) -> ReconcileResult<Aggregate> {
        let scenarios = self.required_scenarios(snapshot).await?;
        let runs = self.resolve_runs(snapshot, &scenarios, trigger).await?;

        if runs.len() != scenarios.len() {
            obs::emit_aggregation_incomplete(snapshot, scenarios.len(), runs.len());
            return Ok(Aggregate::Incomplete {
                required: scenarios.len(),
                resolved: runs.len(),
            });
        }

        let mut outcomes = Vec::with_capacity(runs.len());
        for run in &runs {
            let passed = run_passed(run, &self.config.test_output_result)?;
            obs::emit_run_outcome(run, passed);
            outcomes.push(RunOutcome {
                pipeline_run: run.metadata.name.clone(),
                scenario: run.label(labels::TEST_SCENARIO).map(str::to_string),
                passed,
            });
        }

        let verdict = Verdict::from_passed(outcomes.iter().all(|o| o.passed));
        Ok(Aggregate::Complete {
            verdict,
            runs: outcomes,
        })
    }

    /// Record `verdict` on the Snapshot if it differs from what is stored.
    ///
    /// Returns the Snapshot as stored and whether a write happened.
    pub async fn write_verdict(
        &self,
        snapshot: &Snapshot,
        verdict: Verdict,
    ) -> ReconcileResult<(Snapshot, bool)> {
        let mut conditions = snapshot.status.conditions.clone();
        let changed = set_status_condition(
            &mut conditions,
            verdict.condition(&self.config.verdict_condition_type),
            Utc::now(),
        );
        if !changed {
            obs::emit_verdict_written(snapshot, verdict.is_passed(), false);
            return Ok((snapshot.clone(), false));
        }

        let patched: Snapshot = self
            .session
            .patch_status(StatusPatch::conditions(snapshot, conditions))
            .await?;
        info!(
            snapshot = %patched.metadata.name,
            verdict = verdict.reason(),
            "snapshot verdict updated"
        );
        obs::emit_verdict_written(&patched, verdict.is_passed(), true);
        Ok((patched, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use snapgate_state::TaskResult;

    const OUTPUT: &str = "HACBS_TEST_OUTPUT";

    fn run_with(outputs: &[&str]) -> PipelineRun {
        outputs.iter().fold(
            PipelineRun::new("ns", "test-1", PipelineType::Test),
            |run, value| run.with_task_result(TaskResult::new(OUTPUT, *value)),
        )
    }

    #[test]
    fn test_required_scenario_rule() {
        let plain = TestScenario::new("ns", "s1", "app1");
        let optional_false = TestScenario::new("ns", "s2", "app1").with_optional_label("false");
        let optional_true = TestScenario::new("ns", "s3", "app1").with_optional_label("true");

        assert!(is_required_scenario(&plain));
        assert!(!is_required_scenario(&optional_false));
        // selected even though labeled optional
        assert!(is_required_scenario(&optional_true));
    }

    #[test]
    fn test_success_and_skipped_pass() {
        let run = run_with(&[r#"{"result":"SUCCESS"}"#, r#"{"result":"SKIPPED"}"#]);
        assert!(run_passed(&run, OUTPUT).unwrap());
    }

    #[test]
    fn test_any_failure_fails_run() {
        let run = run_with(&[r#"{"result":"SUCCESS"}"#, r#"{"result":"FAILURE"}"#]);
        assert!(!run_passed(&run, OUTPUT).unwrap());
    }

    #[test]
    fn test_missing_result_field_fails_run() {
        let run = run_with(&[r#"{"note":"no verdict"}"#]);
        assert!(!run_passed(&run, OUTPUT).unwrap());
    }

    #[test]
    fn test_run_without_test_output_passes() {
        let run = PipelineRun::new("ns", "test-1", PipelineType::Test)
            .with_task_result(TaskResult::new("OTHER", r#"{"result":"FAILURE"}"#));
        assert!(run_passed(&run, OUTPUT).unwrap());
    }

    #[test]
    fn test_malformed_output_is_error() {
        let run = run_with(&["not json"]);
        let err = run_passed(&run, OUTPUT).unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedTestOutput { .. }));
    }

    #[test]
    fn test_non_object_output_fails_run() {
        let run = run_with(&[r#"["SUCCESS"]"#]);
        assert!(!run_passed(&run, OUTPUT).unwrap());
        let run = run_with(&[r#""SUCCESS""#]);
        assert!(!run_passed(&run, OUTPUT).unwrap());
    }

    #[test]
    fn test_null_output_fails_run() {
        let run = run_with(&["null"]);
        assert!(!run_passed(&run, OUTPUT).unwrap());
    }

    #[test]
    fn test_latest_succeeded_picks_latest() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let older = PipelineRun::new("ns", "older", PipelineType::Test).completed(true, t0);
        let newer = PipelineRun::new("ns", "newer", PipelineType::Test)
            .completed(true, t0 + Duration::minutes(5));
        let newest_failed = PipelineRun::new("ns", "failed", PipelineType::Test)
            .completed(false, t0 + Duration::minutes(10));

        let picked = latest_succeeded(vec![newer.clone(), newest_failed, older]).unwrap();
        assert_eq!(picked.metadata.name, "newer");
    }

    #[test]
    fn test_latest_succeeded_none_when_nothing_succeeded() {
        let failed =
            PipelineRun::new("ns", "failed", PipelineType::Test).completed(false, Utc::now());
        assert!(latest_succeeded(vec![failed]).is_none());
        assert!(latest_succeeded(Vec::new()).is_none());
    }

    #[test]
    fn test_verdict_condition() {
        let condition = Verdict::Failed.condition("TestSucceeded");
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason, "Failed");
    }
}
