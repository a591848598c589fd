//! Shared fakes for unit tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use preflight_core::{
    AgentError, AgentResponse, CaseRecorder, CaseSpec, Message, MessageRole, QueryAgent,
    TestRegistration, TokenUsage, Validator, ValidatorError, Verdict,
};

/// Agent that always answers "pong" with a small token count.
struct QuietAgent;

#[async_trait]
impl QueryAgent for QuietAgent {
    async fn query(&self, _prompt: &str) -> Result<AgentResponse, AgentError> {
        let mut message = Message::new(MessageRole::Ai, "pong");
        message.token_usage = Some(TokenUsage { total: 5 });
        Ok(AgentResponse {
            messages: vec![message],
        })
    }
}

pub(crate) fn quiet_agent() -> Arc<dyn QueryAgent> {
    Arc::new(QuietAgent)
}

/// Validator that reports any expectation starting with `fail:` as unmet,
/// so individual cases control their own outcome.
struct MarkerValidator;

#[async_trait]
impl Validator for MarkerValidator {
    async fn judge(
        &self,
        _response: &AgentResponse,
        expectations: &[String],
    ) -> Result<Verdict, ValidatorError> {
        let unmet: Vec<String> = expectations
            .iter()
            .filter(|e| e.starts_with("fail:"))
            .cloned()
            .collect();
        if unmet.is_empty() {
            return Ok(Verdict::pass("all expectations satisfied"));
        }
        let failure_reasons: BTreeMap<String, String> = unmet
            .iter()
            .map(|e| (e.clone(), "marked as failing".to_string()))
            .collect();
        Ok(Verdict {
            success: false,
            reasoning: "marked expectations are never satisfied".to_string(),
            unmet,
            failure_reasons,
        })
    }
}

pub(crate) fn marker_validator() -> Arc<dyn Validator> {
    Arc::new(MarkerValidator)
}

/// A test whose single case always passes under [`marker_validator`].
pub(crate) fn passing_test(module: &str, name: &str) -> TestRegistration {
    test_with_expectations(module, name, vec!["replies at all".to_string()])
}

/// A test emitting one case with the given expectations.
pub(crate) fn test_with_expectations(
    module: &str,
    name: &str,
    expectations: Vec<String>,
) -> TestRegistration {
    TestRegistration::new(
        module,
        name,
        Some(format!("case for {}", name)),
        Arc::new(move |recorder: &mut CaseRecorder| {
            recorder.case(CaseSpec::new("ping", expectations.clone()));
            Ok(())
        }),
    )
}
