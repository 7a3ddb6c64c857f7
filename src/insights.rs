//! Completion clients and the insight request fallback chain.
//!
//! One client abstraction, two implementations: the hosted OpenAI-compatible
//! API and a deterministic local fake for dev/testing. Failure classification
//! happens once, at the call boundary, into a closed set of kinds; the
//! fallback loop only ever matches on the kind tag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::prompts;
use crate::sections::{HEADING_PREFIX, SECTION_KEYS};

/// Fixed message returned when no credential or no candidates are configured
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Insight analysis is not configured. Set OPENAI_API_KEY to enable it.";

/// Fixed message returned when every candidate model fails with a retryable error
pub const ALL_CANDIDATES_FAILED_MESSAGE: &str =
    "All configured models are currently unavailable. Please try again later.";

/// Closed set of completion failure classes, decided at the call boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionErrorKind {
    /// Quota or rate limit exhausted; the next candidate may still work
    QuotaExceeded,
    /// The requested model is unknown or unavailable at this endpoint
    ModelUnavailable,
    /// Anything else: network, auth, malformed response
    Other,
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct CompletionError {
    pub kind: CompletionErrorKind,
    pub message: String,
}

impl CompletionError {
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: CompletionErrorKind::Other,
            message: message.into(),
        }
    }
}

/// A chat-completion backend: one call, one model, one response text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, CompletionError>;
}

// OpenAI-compatible API implementation
pub struct OpenAiCompletions {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAiCompletions {
    pub fn new(api_key: String, base_url: String, timeout_ms: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build reqwest client with timeout: {}", e))?;
        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletions {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, CompletionError> {
        debug!(
            "Requesting completion (model={}, prompt_chars={})",
            model,
            user_prompt.len()
        );

        let body = ChatRequest {
            model,
            max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::other(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::other(format!("Failed to parse completion: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| CompletionError::other("No completion text returned"))
    }
}

/// Map an API error response to a failure kind, once, at the boundary.
fn classify_api_error(status: reqwest::StatusCode, body: &str) -> CompletionError {
    let code = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let err = v.get("error")?;
            err.get("code")
                .or_else(|| err.get("type"))?
                .as_str()
                .map(|s| s.to_string())
        })
        .unwrap_or_default();

    let kind = if status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || code == "insufficient_quota"
        || code == "rate_limit_exceeded"
    {
        CompletionErrorKind::QuotaExceeded
    } else if status == reqwest::StatusCode::NOT_FOUND || code == "model_not_found" {
        CompletionErrorKind::ModelUnavailable
    } else {
        CompletionErrorKind::Other
    };

    CompletionError {
        kind,
        message: format!("completion API error {}: {}", status, truncate(body, 300)),
    }
}

fn truncate(input: &str, max: usize) -> String {
    let mut out = String::new();
    for (idx, ch) in input.trim().chars().enumerate() {
        if idx >= max {
            out.push_str("...");
            break;
        }
        out.push(ch);
    }
    out
}

// Deterministic, local FakeCompletions for testing/dev (no network)
pub struct FakeCompletions;

#[async_trait]
impl CompletionClient for FakeCompletions {
    async fn complete(
        &self,
        model: &str,
        _system_prompt: &str,
        user_prompt: &str,
        _max_tokens: u32,
    ) -> std::result::Result<String, CompletionError> {
        let mut out = String::new();
        for key in SECTION_KEYS {
            out.push_str(HEADING_PREFIX);
            out.push_str(key);
            out.push('\n');
            out.push_str(&format!(
                "- Placeholder finding from {} over {} prompt chars\n",
                model,
                user_prompt.len()
            ));
        }
        Ok(out)
    }
}

// Helper to reject obviously unusable keys
fn is_placeholder(s: &str) -> bool {
    let t = s.trim();
    t.is_empty()
        || t.contains("${")
        || t.eq_ignore_ascii_case("your-api-key-here")
        || t.eq_ignore_ascii_case("changeme")
}

/// Factory: build the completion client selected by the configuration.
///
/// Returns `None` when no usable credential is configured, which disables the
/// analyze action entirely; the requester then answers with the fixed
/// not-configured message without touching the network.
pub fn create_completion_client(
    config: &Config,
) -> anyhow::Result<Option<Arc<dyn CompletionClient>>> {
    match config.runtime.provider.as_str() {
        "fake" => {
            info!("Using FakeCompletions (deterministic, no network)");
            Ok(Some(Arc::new(FakeCompletions)))
        }
        _ => match config
            .runtime
            .api_key
            .as_deref()
            .filter(|key| !is_placeholder(key))
        {
            Some(key) => {
                info!(
                    "Using OpenAI-compatible completions at {}",
                    config.analysis.base_url
                );
                Ok(Some(Arc::new(OpenAiCompletions::new(
                    key.to_string(),
                    config.analysis.base_url.clone(),
                    config.runtime.request_timeout_ms,
                )?)))
            }
            None => Ok(None),
        },
    }
}

/// The raw model output for one analysis run, or a human-readable
/// error/fallback message when the request could not be served
#[derive(Debug, Clone, Serialize)]
pub struct InsightResponse {
    pub text: String,
    pub model_used: Option<String>,
    pub fallback_used: bool,
}

impl InsightResponse {
    fn message(text: impl Into<String>, fallback_used: bool) -> Self {
        Self {
            text: text.into(),
            model_used: None,
            fallback_used,
        }
    }
}

/// Ordered-fallback requester: one completion call per candidate model,
/// stopping at the first success or the first non-retryable failure.
pub struct InsightRequester {
    client: Option<Arc<dyn CompletionClient>>,
    candidates: Vec<String>,
    system_prompt: String,
    user_template: String,
    max_tokens: u32,
}

impl InsightRequester {
    pub fn new(
        client: Option<Arc<dyn CompletionClient>>,
        candidates: Vec<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            client,
            candidates,
            system_prompt: prompts::INSIGHT_SYSTEM_PROMPT.clone(),
            user_template: prompts::INSIGHT_USER_TEMPLATE.to_string(),
            max_tokens,
        }
    }

    pub fn from_config(config: &Config, client: Option<Arc<dyn CompletionClient>>) -> Self {
        Self::new(
            client,
            config.analysis.candidates(),
            config.analysis.max_tokens,
        )
    }

    /// Whether the analyze action is available at all
    pub fn is_configured(&self) -> bool {
        self.client.is_some() && !self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Run one analysis: render the prompt, walk the candidate list in order.
    ///
    /// Linear fallback only: no delay, no jitter, no failure memory across
    /// calls. Every outcome is rendered as text; candidate failures never
    /// escape as errors.
    pub async fn request(&self, corpus: &str) -> InsightResponse {
        let Some(client) = &self.client else {
            return InsightResponse::message(NOT_CONFIGURED_MESSAGE, false);
        };
        if self.candidates.is_empty() {
            return InsightResponse::message(NOT_CONFIGURED_MESSAGE, false);
        }

        let user_prompt = prompts::render_user_prompt(&self.user_template, corpus);
        let last = self.candidates.len() - 1;
        let mut fallback_used = false;

        for (idx, model) in self.candidates.iter().enumerate() {
            debug!(
                "Insight request attempt {}/{} (model={})",
                idx + 1,
                self.candidates.len(),
                model
            );
            match client
                .complete(model, &self.system_prompt, &user_prompt, self.max_tokens)
                .await
            {
                Ok(text) => {
                    info!(
                        "Insight request succeeded (model={}, fallback_used={}, chars={})",
                        model,
                        fallback_used,
                        text.len()
                    );
                    return InsightResponse {
                        text,
                        model_used: Some(model.clone()),
                        fallback_used,
                    };
                }
                Err(err) => match err.kind {
                    CompletionErrorKind::QuotaExceeded | CompletionErrorKind::ModelUnavailable
                        if idx < last =>
                    {
                        warn!(
                            "Model {} unavailable ({}), trying next candidate",
                            model, err
                        );
                        fallback_used = true;
                    }
                    CompletionErrorKind::QuotaExceeded | CompletionErrorKind::ModelUnavailable => {
                        warn!("All {} candidate models failed: {}", self.candidates.len(), err);
                        return InsightResponse::message(ALL_CANDIDATES_FAILED_MESSAGE, fallback_used);
                    }
                    CompletionErrorKind::Other => {
                        warn!("Insight request aborted (model={}): {}", model, err);
                        return InsightResponse::message(
                            format!("Insight request failed: {}", err.message),
                            fallback_used,
                        );
                    }
                },
            }
        }

        // Unreachable with a non-empty candidate list; kept for totality.
        InsightResponse::message(ALL_CANDIDATES_FAILED_MESSAGE, fallback_used)
    }
}
