//! Schema types for the testing API.

use serde::{Deserialize, Serialize};

use preflight_core::{Job, TestDescriptor};

/// Summarized metadata about one discovered test.
///
/// The docstring is trimmed to its first non-empty line for display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TestSummary {
    pub qualified_name: String,
    pub module: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

impl TestSummary {
    pub fn from_descriptor(descriptor: &TestDescriptor) -> Self {
        TestSummary {
            qualified_name: descriptor.qualified_name.clone(),
            module: descriptor.module.clone(),
            name: descriptor.name.clone(),
            docstring: descriptor.docstring.as_deref().and_then(first_line),
        }
    }
}

fn first_line(text: &str) -> Option<String> {
    text.trim().lines().next().map(str::to_string)
}

/// Response for `GET /testing/tests`.
///
/// `error` carries the discovery failure text when part of the project could
/// not be loaded; `tests` still lists everything that did.
#[derive(Debug, Clone, Serialize)]
pub struct ListTestsResponse {
    pub tests: Vec<TestSummary>,
    pub error: Option<String>,
}

/// Request payload for scheduling a new run.
///
/// Omitted or empty `tests` means "run everything".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunRequest {
    #[serde(default)]
    pub tests: Option<Vec<String>>,
}

/// One frame on `WS /testing/ws/runs`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunStreamEvent {
    /// Full state of all jobs; sent once on connect.
    Snapshot { jobs: Vec<Job> },
    /// One job changed.
    Job { job: Job },
}
