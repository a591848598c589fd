//! Case specs emitted by user test functions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The structured form of a test's single case: a prompt for the agent, the
/// expectations the validator judges, and the expected tool-call multiset.
///
/// A test function emits exactly one case per run. The retry fields let a
/// flaky case re-run the agent-and-judge sequence; the recorded result
/// reflects the final attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseSpec {
    pub prompt: String,
    /// Order-significant for display, set-significant for matching.
    pub expectations: Vec<String>,
    /// Expected tool-call names as a multiset.
    #[serde(default)]
    pub expected_tool_calls: Vec<String>,
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default, with = "duration_secs")]
    pub sleep_between_attempts: Duration,
}

fn default_attempts() -> u32 {
    1
}

impl CaseSpec {
    pub fn new(prompt: impl Into<String>, expectations: Vec<String>) -> Self {
        CaseSpec {
            prompt: prompt.into(),
            expectations,
            expected_tool_calls: Vec::new(),
            attempts: 1,
            sleep_between_attempts: Duration::ZERO,
        }
    }

    pub fn with_expected_tool_calls(mut self, tool_calls: Vec<String>) -> Self {
        self.expected_tool_calls = tool_calls;
        self
    }

    /// Allows up to `attempts` runs with `sleep` between them. Zero attempts
    /// are clamped to one.
    pub fn with_retry(mut self, attempts: u32, sleep: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.sleep_between_attempts = sleep;
        self
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        // Negative and non-finite values collapse to no sleep.
        Ok(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }
}

/// Harness handed to a user test function so it can emit its case.
///
/// The execution pipeline inspects the recorder afterwards: zero cases and
/// more than one case are both failures of the test itself.
#[derive(Debug, Default)]
pub struct CaseRecorder {
    cases: Vec<CaseSpec>,
}

impl CaseRecorder {
    pub fn new() -> Self {
        CaseRecorder { cases: Vec::new() }
    }

    /// Records the case this test wants executed.
    pub fn case(&mut self, case: CaseSpec) {
        self.cases.push(case);
    }

    /// All cases recorded so far, in emission order.
    pub fn recorded(&self) -> &[CaseSpec] {
        &self.cases
    }

    /// Consumes the recorder, returning its cases.
    pub fn into_cases(self) -> Vec<CaseSpec> {
        self.cases
    }
}
