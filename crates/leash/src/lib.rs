//! Budget-guarded language-model subcalls over large text buffers.
//!
//! `leash` lets task code reason over a document far larger than any model
//! prompt without ever sending it whole. Tasks read the buffer through a
//! small set of audited primitives, send bounded chunks to a model through a
//! guarded gateway, and run inside a harness that turns every failure into a
//! structured, scriptable result.
//!
//! # Getting started
//!
//! ```
//! use leash::prelude::*;
//!
//! // Any closure can stand in for the model.
//! let backend = FnBackend::new(|_prompt: &str, chunk: &str| {
//!     Ok(RawCompletion::new(format!("{} chars", chunk.len()), 120, 8))
//! });
//!
//! let config = GuardConfig::builder().max_cost(0.10).build()?;
//! let runner = TaskRunner::new(&backend).with_config(config);
//!
//! let output = runner.run("line one\nERROR: disk full\nline three", |scope| {
//!     let hits = scope.context().search("error")?;
//!     let snippet = scope.context().around_match(&hits[0], 0, 20);
//!     let answer = scope.subcall("Explain this error.", snippet)?;
//!     Ok(serde_json::json!({ "line": hits[0].line_number, "answer": answer }))
//! });
//!
//! assert_eq!(output.status, TaskStatus::Completed);
//! assert_eq!(output.budget_summary.total_calls, 1);
//! # Ok::<(), leash::Error>(())
//! ```
//!
//! # Where to find things
//!
//! - **Budget policy and accounting:** [`GuardConfig`](guard::GuardConfig)
//!   for the limits, [`GuardState`](guard::GuardState) for the per-run
//!   counters, [`GuardError`](guard::GuardError) for violations.
//! - **Reading the buffer:** [`context`] functions or the
//!   [`ContextView`](context::ContextView) handle; every read lands in an
//!   [`AccessLog`](context::AccessLog).
//! - **Calling a model:** [`SubcallGateway`](subcall::SubcallGateway) over
//!   any [`SubcallBackend`](subcall::SubcallBackend);
//!   [`OpenRouterBackend`](subcall::OpenRouterBackend) for production.
//! - **Running tasks:** [`TaskRunner`](runner::TaskRunner) and
//!   [`TaskOutput`](runner::TaskOutput). Ready-made tasks live in
//!   [`tasks`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`guard`] | Limits, per-run counters, depth scope, guard errors |
//! | [`context`] | head / tail / slice / search / chunks, access log |
//! | [`subcall`] | Backend trait, guarded gateway, typed subcalls, OpenRouter backend |
//! | [`runner`] | Task harness, status classification, accumulator |
//! | [`tasks`] | Document analysis, log triage, entity extraction |
//! | [`api`] | Trace ids and per-model pricing |

pub mod api;
pub mod context;
pub mod error;
pub mod guard;
pub mod prelude;
pub mod runner;
pub mod subcall;
pub mod tasks;

pub use error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unset optional fields are omitted.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from `OpenRouterClient::chat()`.
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

impl RawChatResponse {
    fn into_completion(self) -> Result<ChatCompletion, String> {
        if let Some(err) = self.error {
            return Err(format!("OpenRouter API error: {}", err.message));
        }
        let choice = self.choices.and_then(|c| c.into_iter().next());
        match choice {
            Some(c) => {
                debug!(
                    "LLM output: {} chars text",
                    c.message.content.as_ref().map_or(0, |s| s.len())
                );
                Ok(ChatCompletion {
                    content: c.message.content,
                    usage: self.usage,
                    finish_reason: c.finish_reason,
                })
            }
            None => {
                debug!("LLM output: empty (no choices)");
                Ok(ChatCompletion {
                    content: None,
                    usage: self.usage,
                    finish_reason: None,
                })
            }
        }
    }
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    referer: Option<String>,
    title: String,
}

impl OpenRouterClient {
    /// Create a new client with the given API key. Sends `X-Title: leash`
    /// and no Referer.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::build(api_key.into(), None, "leash".to_string())
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        Self::build(api_key.into(), Some(referer.into()), title.into())
    }

    fn build(api_key: String, referer: Option<String>, title: String) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("leash/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key,
            referer,
            title,
        })
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={:?}",
            body.model.as_deref().unwrap_or("(none)"),
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let mut request = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", &self.title);
        if let Some(referer) = &self.referer {
            request = request.header("HTTP-Referer", referer);
        }
        let resp = request
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("OpenRouter API HTTP {status}: {text}"));
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| format!("failed to parse response: {e}"))?;

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        parsed.into_completion()
    }
}
