//! Schema types for the tooling API.

use serde::{Deserialize, Serialize};

use preflight_core::ToolSchema;

/// One row in the tool listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub parameter_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl ToolSummary {
    pub fn from_schema(schema: &ToolSchema) -> Self {
        ToolSummary {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameter_count: schema.parameters.len(),
            group: schema.group.clone(),
        }
    }
}

/// Request payload for `POST /tooling/tools/{name}/invoke`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvokeRequest {
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
}
