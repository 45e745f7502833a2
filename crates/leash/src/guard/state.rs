//! Budget accounting for one task execution.
//!
//! [`GuardState`] accumulates spend, call counts, and token totals, and
//! tracks subcall depth per calling thread. All counters live behind one
//! mutex so that [`record_usage`](GuardState::record_usage) and the depth
//! increment/decrement stay consistent when sibling subcalls run on
//! different threads. Siblings on separate threads each sit at depth 1; only
//! a call issued from inside a running subcall on the same thread nests.

use super::config::GuardConfig;
use super::error::GuardError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::trace;

/// Characters per token for pre-flight estimation.
pub const CHARS_PER_TOKEN: usize = 4;

/// Rough token estimate for pre-flight checks: `max(1, chars / 4)`.
///
/// Never used for billing; recorded usage always comes from the backend.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count();
    (chars / CHARS_PER_TOKEN).max(1) as u64
}

#[derive(Debug, Default)]
struct Counters {
    total_cost: f64,
    total_calls: u64,
    total_input_tokens: u64,
    total_output_tokens: u64,
    /// Depth per thread with a subcall in flight. Entries at zero are removed.
    depths: HashMap<ThreadId, usize>,
}

impl Counters {
    fn depth(&self, thread: ThreadId) -> usize {
        self.depths.get(&thread).copied().unwrap_or(0)
    }
}

/// Mutable budget state scoped to one task execution.
///
/// Created by the [`TaskRunner`](crate::runner::TaskRunner) at task start
/// and dropped when the run ends. Never shared between runs.
#[derive(Debug)]
pub struct GuardState {
    config: GuardConfig,
    started: Instant,
    counters: Mutex<Counters>,
}

impl GuardState {
    /// Fresh state with the clock starting now.
    pub fn new(config: GuardConfig) -> Self {
        Self::started_at(config, Instant::now())
    }

    /// Fresh state whose clock started at `started`.
    pub fn started_at(config: GuardConfig, started: Instant) -> Self {
        Self {
            config,
            started,
            counters: Mutex::new(Counters::default()),
        }
    }

    /// The policy this state enforces.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    fn counters(&self) -> MutexGuard<'_, Counters> {
        // Counters are plain numbers; a panic elsewhere cannot leave them torn.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` while holding the counters lock, stalling every other
    /// bookkeeping call on this state.
    #[cfg(test)]
    pub(crate) fn with_counters_locked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _held = self.counters();
        f()
    }

    /// Time since the task started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail when wall-clock time has passed the runtime ceiling.
    pub fn check_runtime(&self) -> Result<(), GuardError> {
        let elapsed = self.elapsed().as_secs_f64();
        let limit = self.config.max_runtime_seconds();
        if elapsed > limit {
            return Err(GuardError::Runtime {
                limit,
                current: elapsed,
            });
        }
        Ok(())
    }

    /// Fail when spend has reached the cost ceiling. Reaching the ceiling
    /// exactly counts as exhausted.
    pub fn check_cost(&self) -> Result<(), GuardError> {
        let current = self.counters().total_cost;
        let limit = self.config.max_cost();
        if current >= limit {
            return Err(GuardError::Cost { limit, current });
        }
        Ok(())
    }

    /// Fail when the calling thread already has a subcall in flight.
    pub fn check_depth(&self) -> Result<(), GuardError> {
        let depth = self.counters().depth(thread::current().id());
        self.depth_allows(depth)
    }

    fn depth_allows(&self, depth: usize) -> Result<(), GuardError> {
        let limit = self.config.max_recursion_depth();
        if depth >= limit {
            return Err(GuardError::Recursion {
                limit,
                current: depth + 1,
            });
        }
        Ok(())
    }

    /// Estimate tokens for `text`. See [`estimate_tokens`].
    pub fn estimate_tokens(&self, text: &str) -> u64 {
        estimate_tokens(text)
    }

    /// Fail when the estimated size of `prompt` plus `chunk` is over the
    /// per-subcall ceiling.
    pub fn check_token_limit(&self, prompt: &str, chunk: &str) -> Result<(), GuardError> {
        let estimated = estimate_tokens(prompt) + estimate_tokens(chunk);
        let limit = self.config.max_tokens_per_subcall();
        if estimated > limit {
            return Err(GuardError::Tokens {
                limit,
                current: estimated,
            });
        }
        Ok(())
    }

    /// Record the usage reported for one completed subcall and add its cost.
    ///
    /// All totals change together under the lock.
    pub fn record_usage(&self, input_tokens: u64, output_tokens: u64) {
        let cost = self.config.rates().cost(input_tokens, output_tokens);
        let mut c = self.counters();
        c.total_input_tokens += input_tokens;
        c.total_output_tokens += output_tokens;
        c.total_calls += 1;
        c.total_cost += cost;
        trace!(
            "Recorded usage: in={input_tokens}, out={output_tokens}, cost=${cost:.6}, total=${:.6}",
            c.total_cost
        );
    }

    /// Enter one level of subcall depth on the calling thread. The level is
    /// released when the returned guard drops, on every exit path.
    ///
    /// Does not check the ceiling; see [`enter_depth`](Self::enter_depth).
    pub fn scoped_depth(&self) -> DepthGuard<'_> {
        let thread = thread::current().id();
        *self.counters().depths.entry(thread).or_insert(0) += 1;
        DepthGuard {
            state: self,
            thread,
        }
    }

    /// Check the depth ceiling and enter one level in a single locked step.
    pub fn enter_depth(&self) -> Result<DepthGuard<'_>, GuardError> {
        let thread = thread::current().id();
        let mut c = self.counters();
        self.depth_allows(c.depth(thread))?;
        *c.depths.entry(thread).or_insert(0) += 1;
        Ok(DepthGuard {
            state: self,
            thread,
        })
    }

    /// Subcall depth of the calling thread (0 outside a subcall, 1 inside one).
    pub fn current_depth(&self) -> usize {
        self.counters().depth(thread::current().id())
    }

    /// Cumulative spend in USD.
    pub fn total_cost(&self) -> f64 {
        self.counters().total_cost
    }

    /// Number of recorded subcalls.
    pub fn total_calls(&self) -> u64 {
        self.counters().total_calls
    }

    /// Snapshot of budget consumption.
    pub fn summary(&self) -> BudgetSummary {
        let c = self.counters();
        let max_cost = self.config.max_cost();
        BudgetSummary {
            total_cost_usd: round_to(c.total_cost, 6),
            cost_budget_usd: max_cost,
            cost_remaining_usd: round_to(max_cost - c.total_cost, 6),
            total_calls: c.total_calls,
            total_input_tokens: c.total_input_tokens,
            total_output_tokens: c.total_output_tokens,
            elapsed_seconds: round_to(self.elapsed().as_secs_f64(), 2),
            runtime_limit_seconds: self.config.max_runtime_seconds(),
        }
    }
}

/// Holds one level of subcall depth; releases it on drop.
#[must_use = "the depth level is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct DepthGuard<'a> {
    state: &'a GuardState,
    thread: ThreadId,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        let mut c = self.state.counters();
        if let Some(depth) = c.depths.get_mut(&self.thread) {
            *depth = depth.saturating_sub(1);
            if *depth == 0 {
                c.depths.remove(&self.thread);
            }
        }
    }
}

/// Budget consumption snapshot, as reported in task output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSummary {
    pub total_cost_usd: f64,
    pub cost_budget_usd: f64,
    pub cost_remaining_usd: f64,
    pub total_calls: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub elapsed_seconds: f64,
    pub runtime_limit_seconds: f64,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
