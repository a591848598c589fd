//! The per-test execution pipeline.
//!
//! Runs exactly one test: captures its case, queries the agent, checks the
//! tool-call multiset, consults the validator, classifies the outcome, and
//! appends the result to history. The pipeline never propagates errors to
//! the job manager; every failure mode becomes a classified [`TestResult`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use preflight_core::{
    AgentResponse, CaseRecorder, CaseSpec, ErrorKind, QueryAgent, TestDescriptor, TestProject,
    TestResult, Validator,
};
use preflight_store::HistoryStore;

/// Executes discovered tests against the agent and validator collaborators.
pub struct ExecutionPipeline {
    project: Arc<dyn TestProject>,
    agent: Arc<dyn QueryAgent>,
    validator: Arc<dyn Validator>,
    history: Arc<HistoryStore>,
}

struct Outcome {
    passed: bool,
    error_kind: Option<ErrorKind>,
    error: Option<String>,
    unmet: Vec<String>,
    failure_reasons: BTreeMap<String, String>,
    response: Option<AgentResponse>,
}

impl Outcome {
    fn pass() -> Self {
        Outcome {
            passed: true,
            error_kind: None,
            error: None,
            unmet: Vec::new(),
            failure_reasons: BTreeMap::new(),
            response: None,
        }
    }

    fn fail(kind: ErrorKind, error: impl Into<String>) -> Self {
        Outcome {
            passed: false,
            error_kind: Some(kind),
            error: Some(error.into()),
            unmet: Vec::new(),
            failure_reasons: BTreeMap::new(),
            response: None,
        }
    }

    fn unexpected(error: impl Into<String>) -> Self {
        Outcome::fail(ErrorKind::Unexpected, error)
    }

    fn with_response(mut self, response: AgentResponse) -> Self {
        self.response = Some(response);
        self
    }
}

impl ExecutionPipeline {
    pub fn new(
        project: Arc<dyn TestProject>,
        agent: Arc<dyn QueryAgent>,
        validator: Arc<dyn Validator>,
        history: Arc<HistoryStore>,
    ) -> Self {
        ExecutionPipeline {
            project,
            agent,
            validator,
            history,
        }
    }

    /// Runs one test and appends its result to history.
    ///
    /// `dequeued_at` is the instant the worker picked the task up; the
    /// recorded duration spans dequeue to result write.
    pub async fn run(&self, descriptor: &TestDescriptor, dequeued_at: Instant) -> TestResult {
        let (case, outcome) = self.execute(descriptor).await;

        let total_tokens = outcome
            .response
            .as_ref()
            .map(AgentResponse::total_tokens)
            .unwrap_or(0);
        let case = case.unwrap_or_else(|| CaseSpec::new(String::new(), Vec::new()));

        let result = TestResult {
            qualified_name: descriptor.qualified_name.clone(),
            module: descriptor.module.clone(),
            name: descriptor.name.clone(),
            passed: outcome.passed,
            duration_seconds: dequeued_at.elapsed().as_secs_f64(),
            total_tokens,
            error_kind: outcome.error_kind,
            error: outcome.error,
            expectations: case.expectations,
            unmet: outcome.unmet,
            failure_reasons: outcome.failure_reasons,
            prompt: case.prompt,
            expected_tool_calls: case.expected_tool_calls,
            response: outcome.response,
        };

        if let Err(err) = self.history.append(&result) {
            tracing::error!(test = %result.qualified_name, %err, "failed to append result to history");
        }
        result
    }

    async fn execute(&self, descriptor: &TestDescriptor) -> (Option<CaseSpec>, Outcome) {
        let mut recorder = CaseRecorder::new();
        let run = self.project.run_test(&descriptor.qualified_name, &mut recorder);
        let mut cases = recorder.into_cases();

        if let Err(err) = run {
            return (first_case(&mut cases), Outcome::unexpected(err.to_string()));
        }
        let case = match cases.len() {
            0 => return (None, Outcome::unexpected("no case emitted")),
            1 => cases.remove(0),
            _ => {
                return (
                    first_case(&mut cases),
                    Outcome::unexpected("multiple cases not supported"),
                )
            }
        };

        let mut outcome = Outcome::unexpected("no attempt executed");
        for attempt in 1..=case.attempts {
            outcome = self.attempt(&case).await;
            if outcome.passed || attempt == case.attempts {
                break;
            }
            tracing::debug!(
                prompt = %case.prompt,
                attempt,
                max_attempts = case.attempts,
                "case attempt failed; retrying"
            );
            if !case.sleep_between_attempts.is_zero() {
                tokio::time::sleep(case.sleep_between_attempts).await;
            }
        }
        (Some(case), outcome)
    }

    async fn attempt(&self, case: &CaseSpec) -> Outcome {
        let response = match self.agent.query(&case.prompt).await {
            Ok(response) => response,
            Err(err) => return Outcome::unexpected(err.to_string()),
        };

        // Tool-call classification wins over validator classification, so a
        // multiset miss short-circuits before judging.
        let observed = response.tool_call_names();
        let missing = missing_tool_calls(&case.expected_tool_calls, &observed);
        if !missing.is_empty() {
            return Outcome::fail(
                ErrorKind::ToolCall,
                format!(
                    "expected tool calls not observed: [{}] (observed: [{}])",
                    missing.join(", "),
                    observed.join(", ")
                ),
            )
            .with_response(response);
        }

        let verdict = match self.validator.judge(&response, &case.expectations).await {
            Ok(verdict) => verdict,
            Err(err) => return Outcome::unexpected(err.to_string()).with_response(response),
        };

        // Keep the validator's ordering, but never report an unmet string
        // that was not one of the case's expectations.
        let unmet: Vec<String> = verdict
            .unmet
            .iter()
            .filter(|u| case.expectations.contains(u))
            .cloned()
            .collect();

        if !unmet.is_empty() {
            let mut outcome = Outcome::fail(ErrorKind::Expectation, verdict.reasoning.clone());
            outcome.unmet = unmet;
            outcome.failure_reasons = verdict.failure_reasons.clone();
            return outcome.with_response(response);
        }
        if !verdict.success {
            return Outcome::fail(ErrorKind::Validation, verdict.reasoning.clone())
                .with_response(response);
        }
        Outcome::pass().with_response(response)
    }
}

fn first_case(cases: &mut Vec<CaseSpec>) -> Option<CaseSpec> {
    if cases.is_empty() {
        None
    } else {
        Some(cases.remove(0))
    }
}

/// Per-name counts of `expected` not covered by `observed`.
///
/// Each missing occurrence appears once in the returned list, so an expected
/// double call observed once yields one entry.
fn missing_tool_calls(expected: &[String], observed: &[String]) -> Vec<String> {
    let mut available: BTreeMap<&str, usize> = BTreeMap::new();
    for name in observed {
        *available.entry(name.as_str()).or_insert(0) += 1;
    }

    let mut missing = Vec::new();
    for name in expected {
        match available.get_mut(name.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => missing.push(name.clone()),
        }
    }
    missing
}
