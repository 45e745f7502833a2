//! The guard protocol around every subcall.

use super::backend::SubcallBackend;
use super::parse::{
    BOOL_SUFFIX, JSON_SUFFIX, choice_prompt, match_choice, parse_bool, preview, strip_code_fence,
};
use crate::error::{Error, Result};
use crate::guard::{GuardError, GuardState};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// Routes subcalls through the budget guards of one task run.
///
/// Holds references only: the [`GuardState`] belongs to the run and the
/// backend to whoever built the runner. Cheap to copy.
#[derive(Clone, Copy)]
pub struct SubcallGateway<'a> {
    state: &'a GuardState,
    backend: &'a dyn SubcallBackend,
}

impl std::fmt::Debug for SubcallGateway<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubcallGateway")
            .field("state", self.state)
            .finish_non_exhaustive()
    }
}

fn rejected(err: GuardError) -> Error {
    warn!("Subcall rejected: {err}");
    err.into()
}

impl<'a> SubcallGateway<'a> {
    pub fn new(state: &'a GuardState, backend: &'a dyn SubcallBackend) -> Self {
        Self { state, backend }
    }

    /// The guard state calls are charged to.
    pub fn state(&self) -> &'a GuardState {
        self.state
    }

    /// Run one backend call under the full guard protocol.
    ///
    /// Order is fixed: runtime, cost, depth (entered for the calling
    /// thread), token estimate; then re-check runtime, call the backend, record usage, and
    /// check cost again. A near-exhausted budget is therefore reported
    /// ahead of a token-shape problem. The post-flight cost check fails the
    /// call that pushed spend over the ceiling even though its text was
    /// produced. A backend failure records no usage.
    pub fn guarded_call(&self, prompt: &str, chunk: &str) -> Result<String> {
        let state = self.state;
        state.check_runtime().map_err(rejected)?;
        state.check_cost().map_err(rejected)?;
        // Depth is checked and entered under one lock; the level is held
        // through the token check and released on every early return.
        let _depth = state.enter_depth().map_err(rejected)?;
        state.check_token_limit(prompt, chunk).map_err(rejected)?;

        // Time may have passed waiting on the lock.
        state.check_runtime().map_err(rejected)?;

        let estimated = state.estimate_tokens(prompt) + state.estimate_tokens(chunk);
        debug!(
            "Subcall: prompt={} chars, chunk={} chars, ~{} tokens",
            prompt.chars().count(),
            chunk.chars().count(),
            estimated
        );
        let start = Instant::now();
        let completion = self.backend.complete(prompt, chunk).map_err(|e| {
            warn!("Subcall backend failed: {e}");
            Error::Backend(e)
        })?;

        state.record_usage(completion.input_tokens, completion.output_tokens);
        debug!(
            "Subcall done in {:.1}s: in={}, out={}, total_cost=${:.4}",
            start.elapsed().as_secs_f64(),
            completion.input_tokens,
            completion.output_tokens,
            state.total_cost()
        );

        state.check_cost().map_err(rejected)?;
        Ok(completion.text)
    }

    /// Guarded call with a non-empty instruction.
    pub fn subcall(&self, prompt: &str, chunk: &str) -> Result<String> {
        require_prompt(prompt)?;
        self.guarded_call(prompt, chunk)
    }

    /// Subcall expecting a JSON answer.
    ///
    /// Markdown code fences around the answer are stripped. When the answer
    /// still is not valid JSON, `default` is returned if given, otherwise
    /// [`Error::ResponseParse`].
    pub fn subcall_json(
        &self,
        prompt: &str,
        chunk: &str,
        default: Option<Value>,
    ) -> Result<Value> {
        require_prompt(prompt)?;
        let response = self.guarded_call(&format!("{prompt}\n\n{JSON_SUFFIX}"), chunk)?;
        match serde_json::from_str(&strip_code_fence(&response)) {
            Ok(value) => Ok(value),
            Err(e) => {
                debug!("Subcall answer is not JSON: {e}");
                default.ok_or_else(|| {
                    Error::ResponseParse(format!(
                        "Failed to parse JSON from response: {}",
                        preview(&response, 200)
                    ))
                })
            }
        }
    }

    /// Subcall expecting yes or no. Unclear answers give `default`.
    pub fn subcall_bool(&self, prompt: &str, chunk: &str, default: bool) -> Result<bool> {
        require_prompt(prompt)?;
        let response = self.guarded_call(&format!("{prompt}\n\n{BOOL_SUFFIX}"), chunk)?;
        Ok(parse_bool(&response).unwrap_or(default))
    }

    /// Subcall choosing one of `choices`.
    ///
    /// An answer matching no choice gives `default` when set, otherwise
    /// [`Error::ResponseParse`].
    pub fn subcall_choice(
        &self,
        prompt: &str,
        chunk: &str,
        choices: &[&str],
        default: Option<&str>,
    ) -> Result<String> {
        require_prompt(prompt)?;
        if choices.is_empty() {
            return Err(Error::invalid_argument("choices must be non-empty"));
        }
        let response = self.guarded_call(&choice_prompt(prompt, choices), chunk)?;
        match match_choice(&response, choices).or(default) {
            Some(choice) => Ok(choice.to_string()),
            None => Err(Error::ResponseParse(format!(
                "Response '{}' not in choices: {choices:?}",
                response.trim()
            ))),
        }
    }
}

fn require_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(Error::invalid_argument("prompt must be a non-empty string"));
    }
    Ok(())
}
