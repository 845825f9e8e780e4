//! Pluggable enhanced compile strategies
//!
//! A strategy gets the first try at a rule when one is configured. The
//! pipeline validates whatever it returns and falls back to
//! [`compile`](crate::compile) on any error.

use async_trait::async_trait;
use easyclaw_types::{ArtifactKind, CompileOutput};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::CompileStrategyError;

/// Enhanced compilation of rule text
#[async_trait]
pub trait CompileStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str {
        "custom"
    }

    async fn compile(&self, text: &str) -> Result<CompileOutput, CompileStrategyError>;
}

/// Adapter turning an async closure into a [`CompileStrategy`]
pub struct FnStrategy<F> {
    func: F,
}

/// Wrap an async closure `(rule_text) -> Result<CompileOutput, CompileStrategyError>`
pub fn strategy_fn<F, Fut>(func: F) -> FnStrategy<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CompileOutput, CompileStrategyError>> + Send + 'static,
{
    FnStrategy { func }
}

#[async_trait]
impl<F, Fut> CompileStrategy for FnStrategy<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CompileOutput, CompileStrategyError>> + Send + 'static,
{
    async fn compile(&self, text: &str) -> Result<CompileOutput, CompileStrategyError> {
        (self.func)(text.to_string()).await
    }
}

const SYSTEM_PROMPT: &str = r#"You compile user rules for an AI agent runtime.
Reply with a single JSON object and nothing else: {"kind": "...", "content": "..."}.
kind is one of:
- "guard": the rule forbids something. content is a JSON string of
  {"kind":"guard","action":"block","reason":<rule text>,"condition":<short condition>}.
- "action-bundle": the rule adds a capability. content is a SKILL.md document that
  starts with YAML frontmatter holding `name` (lowercase letters, digits, hyphens)
  and `description`, followed by instructions that include the rule text verbatim.
- "policy-fragment": anything else. content is "[POLICY] " followed by the rule text."#;

/// Settings for [`ChatCompletionStrategy`]
#[derive(Debug, Clone)]
pub struct ChatCompletionConfig {
    /// Base URL of an OpenAI-compatible API, e.g. `http://127.0.0.1:18789/v1`
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Compile strategy backed by a chat-completion call to a local gateway
pub struct ChatCompletionStrategy {
    client: reqwest::Client,
    config: ChatCompletionConfig,
}

impl ChatCompletionStrategy {
    pub fn new(config: ChatCompletionConfig) -> Result<Self, CompileStrategyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CompileStrategyError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn map_request_error(&self, error: reqwest::Error) -> CompileStrategyError {
        if error.is_timeout() {
            CompileStrategyError::Timeout(self.config.timeout)
        } else {
            CompileStrategyError::Request(error.to_string())
        }
    }
}

#[async_trait]
impl CompileStrategy for ChatCompletionStrategy {
    fn name(&self) -> &str {
        "chat-completion"
    }

    async fn compile(&self, text: &str) -> Result<CompileOutput, CompileStrategyError> {
        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        debug!("Requesting chat completion from {}", self.endpoint());
        let response: Value = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.map_request_error(e))?
            .json()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let reply = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CompileStrategyError::Malformed("response has no message content".to_string()))?;

        parse_reply(reply)
    }
}

#[derive(Deserialize)]
struct Reply {
    kind: String,
    content: String,
}

/// Parse a model reply of the form `{"kind": ..., "content": ...}`,
/// tolerating a surrounding Markdown code fence
pub fn parse_reply(reply: &str) -> Result<CompileOutput, CompileStrategyError> {
    let json = strip_code_fence(reply);
    let reply: Reply = serde_json::from_str(json)
        .map_err(|e| CompileStrategyError::Malformed(format!("reply is not the expected JSON: {}", e)))?;

    let kind: ArtifactKind = reply
        .kind
        .parse()
        .map_err(|e: easyclaw_types::ParseEnumError| CompileStrategyError::Malformed(e.to_string()))?;

    Ok(CompileOutput::new(kind, reply.content))
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
