//! Tool collaborator trait and the published schema descriptor.
//!
//! Tools declare their schema explicitly; there is no runtime reflection.
//! The invoker coerces string arguments by `type_name` before calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One declared tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    /// Coercion hint: `string`, `integer`, `float`, `boolean`, or a
    /// collection type parsed as JSON.
    pub type_name: String,
    #[serde(default)]
    pub description: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// Published descriptor for one tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
    /// Optional grouping label for dashboards.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Errors raised by a tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    ExecutionFailed(String),
}

/// An agent-visible tool exposed for direct interactive execution.
#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Executes the tool with already-coerced arguments.
    async fn invoke(
        &self,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, ToolError>;
}
