//! Direct tool execution with schema-driven argument coercion.
//!
//! Tools come from a loader closure (the same reload seam as test
//! discovery), publish explicit schemas, and are invoked with arguments
//! coerced from strings by declared parameter type. Tool-level failures are
//! returned in the outcome body, never as transport errors.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

use preflight_core::{Tool, ToolSchema};

/// Loader closure invoked at construction and on every tool reload.
pub type ToolLoader = Arc<dyn Fn() -> Vec<Arc<dyn Tool>> + Send + Sync>;

/// Body of a tool invocation response: success plus result or error.
#[derive(Debug, Clone, serde::Serialize, PartialEq)]
pub struct InvokeOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvokeOutcome {
    fn ok(result: Value) -> Self {
        InvokeOutcome {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        InvokeOutcome {
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Registry and executor for the agent-visible tool set.
pub struct ToolInvoker {
    loader: ToolLoader,
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolInvoker {
    pub fn new(loader: ToolLoader) -> Self {
        let tools = index_tools(loader());
        ToolInvoker {
            loader,
            tools: RwLock::new(tools),
        }
    }

    /// Schemas of every registered tool, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        let mut schemas: Vec<ToolSchema> = tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn schema(&self, name: &str) -> Option<ToolSchema> {
        let tools = self.tools.read().expect("tool registry lock poisoned");
        tools.get(name).map(|t| t.schema())
    }

    /// Re-runs the loader, dropping the previous tool set.
    pub fn reload(&self) {
        let fresh = index_tools((self.loader)());
        *self.tools.write().expect("tool registry lock poisoned") = fresh;
    }

    /// Invokes `name` with the given arguments.
    ///
    /// Returns `None` for an unknown tool. Coercion failures and tool errors
    /// both land in the outcome body with `success = false`; the tool is not
    /// called when its arguments do not coerce.
    pub async fn invoke(
        &self,
        name: &str,
        args: serde_json::Map<String, Value>,
    ) -> Option<InvokeOutcome> {
        let tool = {
            let tools = self.tools.read().expect("tool registry lock poisoned");
            tools.get(name).cloned()
        }?;

        let coerced = match coerce_args(&tool.schema(), args) {
            Ok(coerced) => coerced,
            Err(message) => return Some(InvokeOutcome::err(message)),
        };

        match tool.invoke(coerced).await {
            Ok(result) => Some(InvokeOutcome::ok(result)),
            Err(err) => Some(InvokeOutcome::err(err.to_string())),
        }
    }
}

fn index_tools(tools: Vec<Arc<dyn Tool>>) -> HashMap<String, Arc<dyn Tool>> {
    tools
        .into_iter()
        .map(|tool| (tool.schema().name, tool))
        .collect()
}

/// Applies declared-type coercion and default filling to raw arguments.
fn coerce_args(
    schema: &ToolSchema,
    mut args: serde_json::Map<String, Value>,
) -> Result<serde_json::Map<String, Value>, String> {
    for param in &schema.parameters {
        match args.get(&param.name) {
            Some(Value::String(raw)) => {
                let coerced = coerce_value(&param.type_name, raw).map_err(|err| {
                    format!("parameter '{}': {}", param.name, err)
                })?;
                args.insert(param.name.clone(), coerced);
            }
            Some(_) => {}
            None => {
                if let Some(default) = &param.default {
                    args.insert(param.name.clone(), default.clone());
                } else if param.required {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
            }
        }
    }
    Ok(args)
}

/// Coerces one string value by declared type name.
fn coerce_value(type_name: &str, raw: &str) -> Result<Value, String> {
    match type_name.to_ascii_lowercase().as_str() {
        "string" | "str" => Ok(Value::String(raw.to_string())),
        "integer" | "int" => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("'{}' is not an integer", raw)),
        "float" | "number" => {
            let parsed: f64 = raw
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not a number", raw))?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| format!("'{}' is not a finite number", raw))
        }
        "boolean" | "bool" => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a boolean", raw)),
        },
        // Collection types arrive as JSON text.
        _ => serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {}", err)),
    }
}
