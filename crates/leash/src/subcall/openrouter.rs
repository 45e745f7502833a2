//! [`SubcallBackend`] over the OpenRouter chat completions API.

use super::backend::{RawCompletion, SubcallBackend};
use crate::{ChatRequest, Message, OpenRouterClient};
use tokio::runtime::Handle;

/// Output ceiling for one subcall answer.
pub const SUBCALL_MAX_TOKENS: u32 = 1000;

const SYSTEM_PROMPT: &str = "You are a precise reasoning engine. \
    Answer ONLY based on the provided context chunk. \
    Be concise and factual. \
    If the answer cannot be determined from the context, say so explicitly.";

/// Sends each subcall as a two-message chat completion.
///
/// The HTTP client is async; calls block on `handle`. Use this backend
/// from a blocking context (`tokio::task::spawn_blocking` or a plain
/// thread), never directly on a runtime worker.
pub struct OpenRouterBackend {
    client: OpenRouterClient,
    model: String,
    handle: Handle,
    max_tokens: u32,
}

impl OpenRouterBackend {
    pub fn new(client: OpenRouterClient, model: impl Into<String>, handle: Handle) -> Self {
        Self {
            client,
            model: model.into(),
            handle,
            max_tokens: SUBCALL_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, prompt: &str, chunk: &str) -> ChatRequest {
        ChatRequest {
            model: Some(self.model.clone()),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(format!("INSTRUCTION: {prompt}\n\nCONTEXT CHUNK:\n{chunk}")),
            ],
            max_tokens: self.max_tokens,
            // Deterministic answers.
            temperature: Some(0.0),
            ..Default::default()
        }
    }
}

impl SubcallBackend for OpenRouterBackend {
    fn complete(&self, prompt: &str, chunk: &str) -> Result<RawCompletion, String> {
        let body = self.request(prompt, chunk);
        let completion = self.handle.block_on(self.client.chat(&body))?;
        let (input_tokens, output_tokens) = completion.usage.map_or((0, 0), |u| {
            (
                u64::from(u.prompt_tokens.unwrap_or(0)),
                u64::from(u.completion_tokens.unwrap_or(0)),
            )
        });
        Ok(RawCompletion {
            text: completion.content.unwrap_or_default(),
            input_tokens,
            output_tokens,
        })
    }
}
