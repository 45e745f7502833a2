//! Correlation IDs and per-model pricing for guarded task runs.
//!
//! Each task run gets a unique `trace_id` that tags its log span. Pricing
//! tables supply the per-1000-token rates a [`GuardConfig`](crate::guard::GuardConfig)
//! uses to turn reported token usage into spend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique trace ID for a task run.
pub fn generate_trace_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Use a counter to handle sub-nanosecond calls.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{ts:x}-{count:04x}")
}

/// Per-model pricing (USD per 1000 tokens).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelRates {
    /// Price per 1000 input tokens.
    pub input_per_1k: f64,
    /// Price per 1000 output tokens.
    pub output_per_1k: f64,
}

impl ModelRates {
    /// Cost of one call with the given token counts.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_per_1k
    }

    const fn per_1k(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }
}

impl Default for ModelRates {
    fn default() -> Self {
        // Default to a mid-range estimate.
        Self::per_1k(0.003, 0.015)
    }
}

/// Look up approximate pricing for a model by name.
///
/// Matches on the model name segment (after the last `/` in paths like
/// `"openai/gpt-4o-mini"`) so org prefixes don't cause false positives.
pub fn rates_for_model(model: &str) -> ModelRates {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    // Approximate list prices. Close enough to stop a runaway task, not
    // meant for billing.
    if name.contains("opus") {
        ModelRates::per_1k(0.015, 0.075)
    } else if name.contains("sonnet") {
        ModelRates::per_1k(0.003, 0.015)
    } else if name.contains("haiku") {
        ModelRates::per_1k(0.000_25, 0.001_25)
    } else if name.contains("gpt-4o-mini") || name.contains("4o-mini") {
        ModelRates::per_1k(0.000_15, 0.000_6)
    } else if name.contains("gpt-4o") || name.contains("gpt-4") {
        ModelRates::per_1k(0.002_5, 0.01)
    } else if name.starts_with("o1") || name.starts_with("o3") {
        ModelRates::per_1k(0.015, 0.06)
    } else if name.contains("gemini") && name.contains("flash") {
        ModelRates::per_1k(0.000_075, 0.000_3)
    } else if name.contains("gemini") {
        ModelRates::per_1k(0.001_25, 0.005)
    } else if name.contains("deepseek") {
        ModelRates::per_1k(0.000_27, 0.001_1)
    } else {
        ModelRates::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_unique() {
        let id1 = generate_trace_id();
        let id2 = generate_trace_id();
        assert_ne!(id1, id2);
        assert!(id1.starts_with("run-"));
    }

    #[test]
    fn cost_uses_per_thousand_rates() {
        let rates = ModelRates {
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        };
        let cost = rates.cost(2000, 500);
        assert!((cost - 0.035).abs() < 1e-12); // 0.02 + 0.015
    }

    #[test]
    fn rates_lookup_known_models() {
        let mini = rates_for_model("openai/gpt-4o-mini");
        assert_eq!(mini.input_per_1k, 0.000_15);
        assert_eq!(mini.output_per_1k, 0.000_6);

        let opus = rates_for_model("anthropic/claude-opus-4");
        assert!(opus.input_per_1k > 0.01);

        let unknown = rates_for_model("some-unknown-model");
        assert_eq!(unknown, ModelRates::default());
    }

    #[test]
    fn org_prefix_does_not_match() {
        let rates = rates_for_model("sonnet-labs/tiny-model");
        assert_eq!(rates, ModelRates::default());
    }
}
