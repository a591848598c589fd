//! Job state for scheduled test runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::result::TestResult;

/// Lifecycle states for an execution job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Per-test status within a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Queued,
    Running,
    Passed,
    Failed,
}

/// One invocation of the runner: a set of tests, their statuses, and the
/// results collected so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub tests: Vec<String>,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<TestResult>,
    #[serde(default)]
    pub test_statuses: BTreeMap<String, TestStatus>,
}

impl Job {
    /// A freshly created job with every test queued.
    pub fn queued(id: Uuid, tests: Vec<String>, created_at: u64) -> Self {
        let test_statuses = tests
            .iter()
            .map(|t| (t.clone(), TestStatus::Queued))
            .collect();
        Job {
            id,
            status: JobStatus::Queued,
            tests,
            created_at,
            updated_at: created_at,
            error: None,
            results: Vec::new(),
            test_statuses,
        }
    }

    /// A job that failed before any task was enqueued.
    pub fn failed(id: Uuid, tests: Vec<String>, error: String, created_at: u64) -> Self {
        let mut job = Job::queued(id, tests, created_at);
        job.status = JobStatus::Failed;
        job.error = Some(error);
        job
    }

    /// Re-derives the aggregate status from per-test statuses and the
    /// runner-level error.
    ///
    /// Succeeded iff every test passed; failed iff any test failed or the
    /// runner itself raised; running iff at least one test is running and
    /// none failed; queued otherwise.
    pub fn derive_status(&self) -> JobStatus {
        if self.error.is_some() {
            return JobStatus::Failed;
        }
        let statuses = self.test_statuses.values();
        if statuses.clone().any(|s| *s == TestStatus::Failed) {
            return JobStatus::Failed;
        }
        if statuses.clone().all(|s| *s == TestStatus::Passed) {
            return JobStatus::Succeeded;
        }
        if statuses.clone().any(|s| *s == TestStatus::Running) {
            return JobStatus::Running;
        }
        if self.test_statuses.values().any(|s| *s == TestStatus::Passed) {
            // Some tests finished but none are running: the job is still in
            // flight until the remaining queued tests are picked up.
            return JobStatus::Running;
        }
        JobStatus::Queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_statuses(statuses: &[(&str, TestStatus)]) -> Job {
        let tests = statuses.iter().map(|(n, _)| n.to_string()).collect();
        let mut job = Job::queued(Uuid::new_v4(), tests, 0);
        for (name, status) in statuses {
            job.test_statuses.insert(name.to_string(), *status);
        }
        job
    }

    #[test]
    fn all_passed_means_succeeded() {
        let job = job_with_statuses(&[("a::t1", TestStatus::Passed), ("a::t2", TestStatus::Passed)]);
        assert_eq!(job.derive_status(), JobStatus::Succeeded);
    }

    #[test]
    fn any_failed_wins_over_running() {
        let job = job_with_statuses(&[("a::t1", TestStatus::Failed), ("a::t2", TestStatus::Running)]);
        assert_eq!(job.derive_status(), JobStatus::Failed);
    }

    #[test]
    fn running_when_any_test_is_in_flight() {
        let job = job_with_statuses(&[("a::t1", TestStatus::Running), ("a::t2", TestStatus::Queued)]);
        assert_eq!(job.derive_status(), JobStatus::Running);
    }

    #[test]
    fn queued_before_any_test_starts() {
        let job = job_with_statuses(&[("a::t1", TestStatus::Queued), ("a::t2", TestStatus::Queued)]);
        assert_eq!(job.derive_status(), JobStatus::Queued);
    }

    #[test]
    fn partially_complete_job_stays_running_between_tasks() {
        let job = job_with_statuses(&[("a::t1", TestStatus::Passed), ("a::t2", TestStatus::Queued)]);
        assert_eq!(job.derive_status(), JobStatus::Running);
    }

    #[test]
    fn runner_error_forces_failed() {
        let mut job = job_with_statuses(&[("a::t1", TestStatus::Queued)]);
        job.error = Some("discovery unavailable".to_string());
        assert_eq!(job.derive_status(), JobStatus::Failed);
    }

    #[test]
    fn empty_test_set_succeeds_vacuously() {
        let job = Job::queued(Uuid::new_v4(), Vec::new(), 0);
        assert_eq!(job.derive_status(), JobStatus::Succeeded);
    }
}
