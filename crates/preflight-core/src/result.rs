//! Test outcome classification and the persisted result record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::message::AgentResponse;

/// Stable classification labels for test failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The validator reported unmet expectations.
    Expectation,
    /// The observed tool-call multiset does not cover the expected one.
    ToolCall,
    /// The validator rejected the run without a per-expectation breakdown.
    Validation,
    /// Any uncaught failure of the pipeline.
    Unexpected,
}

/// One execution outcome for one test, as appended to history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestResult {
    pub qualified_name: String,
    pub module: String,
    pub name: String,
    pub passed: bool,
    pub duration_seconds: f64,
    pub total_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub expectations: Vec<String>,
    #[serde(default)]
    pub unmet: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_reasons: BTreeMap<String, String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub expected_tool_calls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AgentResponse>,
}

impl TestResult {
    /// Whether this result represents a failure of the given kind.
    pub fn failed_with(&self, kind: ErrorKind) -> bool {
        !self.passed && self.error_kind == Some(kind)
    }
}
