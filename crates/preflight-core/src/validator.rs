//! Validator collaborator: the external judge for free-text expectations.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::message::AgentResponse;

/// Outcome of judging one agent response against a set of expectations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Verdict {
    pub success: bool,
    #[serde(default)]
    pub reasoning: String,
    /// Expectation strings that were not met, in the validator's order.
    #[serde(default)]
    pub unmet: Vec<String>,
    /// Per-expectation failure explanations, keyed by expectation text.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failure_reasons: BTreeMap<String, String>,
}

impl Verdict {
    /// A passing verdict with the given reasoning.
    pub fn pass(reasoning: impl Into<String>) -> Self {
        Verdict {
            success: true,
            reasoning: reasoning.into(),
            unmet: Vec::new(),
            failure_reasons: BTreeMap::new(),
        }
    }
}

/// Errors raised by a validator implementation.
///
/// The pipeline classifies these as `unexpected` failures; a verdict with
/// `success = false` is a judged failure, not an error.
#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("validator call failed: {0}")]
    JudgeFailed(String),
}

/// The external judge deciding whether expectations were met.
///
/// Implementations must be safe for parallel calls; the orchestrator shares
/// one validator across all workers.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn judge(
        &self,
        response: &AgentResponse,
        expectations: &[String],
    ) -> Result<Verdict, ValidatorError>;
}
