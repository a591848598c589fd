//! Bundled validator client for OpenAI-compatible providers.
//!
//! Expectations are numbered in the prompt; the model returns a JSON object
//! naming the unmet expectation numbers, which map back to expectation
//! strings. Transport failures and unparsable bodies are validator errors,
//! which the pipeline classifies as `unexpected`.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use preflight_core::{AgentResponse, Validator, ValidatorError, Verdict};

use crate::config::Config;

const SYSTEM_PROMPT: &str = "You are an expert validator for LLM agent behavior testing.\n\
You will be given the complete output of an agent's execution (messages and \
tool calls) and a numbered list of expectations describing what the agent \
should have done.\n\
Respond with a JSON object with these fields:\n\
- \"reasoning\": concise analysis of the agent's behavior versus the expectations\n\
- \"unmet_expectation_numbers\": array of the numbers of expectations that were NOT met\n\
- \"failure_reasons\": object mapping each unmet expectation number (as a string) to a short reason\n\
- \"error\": true when the behavior does NOT match the expectations, false otherwise\n\
Refer to expectations by their numbers.";

/// Validator backed by an OpenAI-compatible chat-completions endpoint.
///
/// The underlying `reqwest::Client` is safe to share across workers.
pub struct HttpValidator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpValidator {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        HttpValidator {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Builds the client when the config names a validator endpoint.
    pub fn from_config(config: &Config) -> Option<Self> {
        let base_url = config.validator_base_url.clone()?;
        Some(HttpValidator::new(
            base_url,
            config.validator_api_key.clone().unwrap_or_default(),
            config.validator_model.clone(),
        ))
    }

    async fn complete(&self, user_prompt: &str) -> Result<String, ValidatorError> {
        let endpoint = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt },
            ],
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|err| ValidatorError::JudgeFailed(format!("request failed: {}", err)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| ValidatorError::JudgeFailed(format!("response read failed: {}", err)))?;
        if !status.is_success() {
            return Err(ValidatorError::JudgeFailed(format!(
                "provider returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|err| ValidatorError::JudgeFailed(format!("response parse failed: {}", err)))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                ValidatorError::JudgeFailed("provider response missing content".to_string())
            })
    }
}

#[async_trait]
impl Validator for HttpValidator {
    async fn judge(
        &self,
        response: &AgentResponse,
        expectations: &[String],
    ) -> Result<Verdict, ValidatorError> {
        let prompt = build_prompt(response, expectations);
        let content = self.complete(&prompt).await?;
        parse_verdict(&content, expectations).map_err(ValidatorError::JudgeFailed)
    }
}

fn build_prompt(response: &AgentResponse, expectations: &[String]) -> String {
    let numbered: Vec<String> = expectations
        .iter()
        .enumerate()
        .map(|(index, expectation)| format!("{}. {}", index + 1, expectation))
        .collect();
    format!(
        "AGENT OUTPUT:\n{}\n\nEXPECTATIONS:\n{}\n\nAnalyze whether the agent behavior matches these expectations.",
        format_transcript(response),
        numbered.join("\n")
    )
}

/// Renders the agent transcript for the judge: roles, content, tool calls.
fn format_transcript(response: &AgentResponse) -> String {
    let mut lines = Vec::new();
    for message in &response.messages {
        let role = serde_json::to_value(message.role)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        lines.push(format!("{}: {}", role, message.content));
        for call in &message.tool_calls {
            lines.push(format!("  tool_call {}({})", call.name, call.args));
        }
    }
    lines.join("\n")
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    unmet_expectation_numbers: Vec<i64>,
    #[serde(default)]
    failure_reasons: HashMap<String, String>,
    #[serde(default)]
    error: bool,
}

/// Parses the judge's JSON object and maps numbers back to expectations.
///
/// Out-of-range numbers are discarded. `failure_reasons` is re-keyed from
/// expectation numbers to expectation text.
fn parse_verdict(content: &str, expectations: &[String]) -> Result<Verdict, String> {
    let trimmed = strip_code_fence(content.trim());
    let raw: RawVerdict = serde_json::from_str(trimmed)
        .map_err(|err| format!("verdict parse failed: {} (content: {})", err, trimmed))?;

    let mut unmet = Vec::new();
    for number in &raw.unmet_expectation_numbers {
        let index = usize::try_from(number - 1).ok();
        if let Some(expectation) = index.and_then(|i| expectations.get(i)) {
            if !unmet.contains(expectation) {
                unmet.push(expectation.clone());
            }
        }
    }

    let mut failure_reasons = BTreeMap::new();
    for (key, reason) in raw.failure_reasons {
        let Some(index) = key.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
            continue;
        };
        if let Some(expectation) = expectations.get(index) {
            failure_reasons.insert(expectation.clone(), reason);
        }
    }

    Ok(Verdict {
        success: !raw.error,
        reasoning: raw.reasoning,
        unmet,
        failure_reasons,
    })
}

/// Drops a surrounding markdown code fence some providers add around JSON.
fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches(['\r', '\n'])
        .strip_suffix("```")
        .map(str::trim_end)
        .unwrap_or(content)
}
