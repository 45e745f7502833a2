//! Run-level plumbing shared by the runner and the guard policy.
//!
//! - [`tracing`] — `trace_id` generation for task spans, and per-model
//!   pricing tables used to turn token usage into spend.

pub mod tracing;

pub use tracing::{ModelRates, generate_trace_id, rates_for_model};
