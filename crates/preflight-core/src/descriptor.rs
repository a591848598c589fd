//! Test identity metadata produced by discovery.

use serde::{Deserialize, Serialize};

/// Separator between module and test name in a qualified name.
pub const QUALIFIED_NAME_SEPARATOR: &str = "::";

/// Identifies one discovered test.
///
/// `qualified_name` is `"<module>::<name>"` and is unique across the
/// discovered set. The docstring, when present, is the full documentation
/// block attached to the test function; API layers trim it for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestDescriptor {
    pub qualified_name: String,
    pub module: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
}

impl TestDescriptor {
    pub fn new(module: impl Into<String>, name: impl Into<String>, docstring: Option<String>) -> Self {
        let module = module.into();
        let name = name.into();
        TestDescriptor {
            qualified_name: qualify(&module, &name),
            module,
            name,
            docstring,
        }
    }
}

/// Builds a qualified name from a module and test name.
pub fn qualify(module: &str, name: &str) -> String {
    format!("{}{}{}", module, QUALIFIED_NAME_SEPARATOR, name)
}

/// Splits a qualified name back into `(module, name)`.
///
/// Returns `None` when the separator is missing or either side is empty;
/// the last separator wins so nested module paths stay intact.
pub fn split_qualified(qualified_name: &str) -> Option<(&str, &str)> {
    let idx = qualified_name.rfind(QUALIFIED_NAME_SEPARATOR)?;
    let module = &qualified_name[..idx];
    let name = &qualified_name[idx + QUALIFIED_NAME_SEPARATOR.len()..];
    if module.is_empty() || name.is_empty() {
        return None;
    }
    Some((module, name))
}
