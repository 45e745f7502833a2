//! Guard policy for a single task execution.
//!
//! [`GuardConfig`] is immutable once built. Construct it with
//! [`GuardConfig::builder()`], start from [`GuardConfig::default()`], or load
//! it from a JSON file with [`GuardConfig::load()`]. Every path runs the same
//! validation, so an invalid policy never reaches a [`GuardState`](super::GuardState).
//!
//! # Example
//!
//! ```
//! use leash::guard::GuardConfig;
//!
//! let config = GuardConfig::builder()
//!     .max_cost(0.25)
//!     .max_runtime_seconds(30.0)
//!     .model_with_rates("openai/gpt-4o-mini")
//!     .build()
//!     .unwrap();
//! assert_eq!(config.max_recursion_depth(), 1);
//!
//! assert!(GuardConfig::builder().max_recursion_depth(2).build().is_err());
//! ```

use crate::api::tracing::{ModelRates, rates_for_model};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Default model identifier (OpenRouter naming).
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Subcall depth is fixed: a subcall can never issue another subcall.
pub const MAX_RECURSION_DEPTH: usize = 1;

const DEFAULT_MAX_COST: f64 = 0.50;
const DEFAULT_MAX_TOKENS_PER_SUBCALL: u64 = 4000;
const DEFAULT_MAX_RUNTIME_SECONDS: f64 = 60.0;
const DEFAULT_COST_PER_1K_INPUT: f64 = 0.000_15;
const DEFAULT_COST_PER_1K_OUTPUT: f64 = 0.000_6;

/// A guard policy that failed validation or could not be loaded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_recursion_depth must be {MAX_RECURSION_DEPTH} (got {0})")]
    RecursionDepth(usize),
    #[error("max_cost must be a non-negative number (got {0})")]
    InvalidCost(f64),
    #[error("max_tokens_per_subcall must be at least 1")]
    ZeroTokenLimit,
    #[error("max_runtime_seconds must be a positive number (got {0})")]
    InvalidRuntime(f64),
    #[error("cost rates must be non-negative numbers (got {input} in, {output} out)")]
    InvalidRates { input: f64, output: f64 },
    #[error("model must not be empty")]
    EmptyModel,
    #[error("failed to read guard config '{path}': {reason}")]
    Read { path: String, reason: String },
    #[error("failed to parse guard config '{path}': {reason}")]
    Parse { path: String, reason: String },
}

/// Budget limits and pricing for one task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GuardSettings")]
pub struct GuardConfig {
    max_cost: f64,
    max_tokens_per_subcall: u64,
    max_recursion_depth: usize,
    max_runtime_seconds: f64,
    model: String,
    cost_per_1k_input: f64,
    cost_per_1k_output: f64,
}

impl GuardConfig {
    /// Start a builder from the default policy.
    pub fn builder() -> GuardConfigBuilder {
        GuardConfigBuilder::default()
    }

    /// Start a builder seeded with this policy, for deriving a variant.
    pub fn to_builder(&self) -> GuardConfigBuilder {
        GuardConfigBuilder {
            settings: GuardSettings {
                max_cost: self.max_cost,
                max_tokens_per_subcall: self.max_tokens_per_subcall,
                max_recursion_depth: self.max_recursion_depth,
                max_runtime_seconds: self.max_runtime_seconds,
                model: self.model.clone(),
                cost_per_1k_input: self.cost_per_1k_input,
                cost_per_1k_output: self.cost_per_1k_output,
            },
        }
    }

    /// Load a policy from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: GuardConfig = serde_json::from_str(&data).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(
            "Loaded guard config from {} (max_cost=${:.2}, model={})",
            path.display(),
            config.max_cost,
            config.model
        );
        Ok(config)
    }

    /// Maximum total spend in USD.
    pub fn max_cost(&self) -> f64 {
        self.max_cost
    }

    /// Maximum estimated tokens (prompt + chunk) for a single subcall.
    pub fn max_tokens_per_subcall(&self) -> u64 {
        self.max_tokens_per_subcall
    }

    /// Maximum subcall depth. Always [`MAX_RECURSION_DEPTH`].
    pub fn max_recursion_depth(&self) -> usize {
        self.max_recursion_depth
    }

    /// Wall-clock ceiling in seconds.
    pub fn max_runtime_seconds(&self) -> f64 {
        self.max_runtime_seconds
    }

    /// Model identifier passed to the subcall backend.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Per-1000-token pricing used by usage recording.
    pub fn rates(&self) -> ModelRates {
        ModelRates {
            input_per_1k: self.cost_per_1k_input,
            output_per_1k: self.cost_per_1k_output,
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        let s = GuardSettings::default();
        Self {
            max_cost: s.max_cost,
            max_tokens_per_subcall: s.max_tokens_per_subcall,
            max_recursion_depth: s.max_recursion_depth,
            max_runtime_seconds: s.max_runtime_seconds,
            model: s.model,
            cost_per_1k_input: s.cost_per_1k_input,
            cost_per_1k_output: s.cost_per_1k_output,
        }
    }
}

/// Unvalidated policy fields, as written in a config file or accumulated
/// by the builder.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct GuardSettings {
    max_cost: f64,
    max_tokens_per_subcall: u64,
    max_recursion_depth: usize,
    max_runtime_seconds: f64,
    model: String,
    cost_per_1k_input: f64,
    cost_per_1k_output: f64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            max_cost: DEFAULT_MAX_COST,
            max_tokens_per_subcall: DEFAULT_MAX_TOKENS_PER_SUBCALL,
            max_recursion_depth: MAX_RECURSION_DEPTH,
            max_runtime_seconds: DEFAULT_MAX_RUNTIME_SECONDS,
            model: DEFAULT_MODEL.to_string(),
            cost_per_1k_input: DEFAULT_COST_PER_1K_INPUT,
            cost_per_1k_output: DEFAULT_COST_PER_1K_OUTPUT,
        }
    }
}

impl TryFrom<GuardSettings> for GuardConfig {
    type Error = ConfigError;

    fn try_from(s: GuardSettings) -> Result<Self, Self::Error> {
        if s.max_recursion_depth != MAX_RECURSION_DEPTH {
            return Err(ConfigError::RecursionDepth(s.max_recursion_depth));
        }
        // `!(x >= 0.0)` also rejects NaN.
        if !(s.max_cost >= 0.0) || !s.max_cost.is_finite() {
            return Err(ConfigError::InvalidCost(s.max_cost));
        }
        if s.max_tokens_per_subcall == 0 {
            return Err(ConfigError::ZeroTokenLimit);
        }
        if !(s.max_runtime_seconds > 0.0) || !s.max_runtime_seconds.is_finite() {
            return Err(ConfigError::InvalidRuntime(s.max_runtime_seconds));
        }
        if !(s.cost_per_1k_input >= 0.0) || !(s.cost_per_1k_output >= 0.0) {
            return Err(ConfigError::InvalidRates {
                input: s.cost_per_1k_input,
                output: s.cost_per_1k_output,
            });
        }
        if s.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        Ok(Self {
            max_cost: s.max_cost,
            max_tokens_per_subcall: s.max_tokens_per_subcall,
            max_recursion_depth: s.max_recursion_depth,
            max_runtime_seconds: s.max_runtime_seconds,
            model: s.model,
            cost_per_1k_input: s.cost_per_1k_input,
            cost_per_1k_output: s.cost_per_1k_output,
        })
    }
}

/// Fluent builder for [`GuardConfig`]. Validation happens in [`build()`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct GuardConfigBuilder {
    settings: GuardSettings,
}

impl GuardConfigBuilder {
    /// Set the maximum total spend in USD.
    pub fn max_cost(mut self, usd: f64) -> Self {
        self.settings.max_cost = usd;
        self
    }

    /// Set the per-subcall token ceiling.
    pub fn max_tokens_per_subcall(mut self, tokens: u64) -> Self {
        self.settings.max_tokens_per_subcall = tokens;
        self
    }

    /// Set the recursion ceiling. Anything other than 1 fails at `build()`.
    pub fn max_recursion_depth(mut self, depth: usize) -> Self {
        self.settings.max_recursion_depth = depth;
        self
    }

    /// Set the wall-clock ceiling in seconds.
    pub fn max_runtime_seconds(mut self, seconds: f64) -> Self {
        self.settings.max_runtime_seconds = seconds;
        self
    }

    /// Set the model identifier, keeping the current cost rates.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.settings.model = model.into();
        self
    }

    /// Set the model identifier and take its rates from the pricing table.
    pub fn model_with_rates(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        let rates = rates_for_model(&model);
        self.settings.model = model;
        self.settings.cost_per_1k_input = rates.input_per_1k;
        self.settings.cost_per_1k_output = rates.output_per_1k;
        self
    }

    /// Set the price per 1000 input tokens.
    pub fn cost_per_1k_input(mut self, usd: f64) -> Self {
        self.settings.cost_per_1k_input = usd;
        self
    }

    /// Set the price per 1000 output tokens.
    pub fn cost_per_1k_output(mut self, usd: f64) -> Self {
        self.settings.cost_per_1k_output = usd;
        self
    }

    /// Validate and freeze the policy.
    pub fn build(self) -> Result<GuardConfig, ConfigError> {
        GuardConfig::try_from(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_policy() {
        let config = GuardConfig::default();
        assert_eq!(config.max_cost(), 0.50);
        assert_eq!(config.max_tokens_per_subcall(), 4000);
        assert_eq!(config.max_recursion_depth(), 1);
        assert_eq!(config.max_runtime_seconds(), 60.0);
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.rates().input_per_1k, 0.000_15);
        assert_eq!(config.rates().output_per_1k, 0.000_6);
        assert_eq!(GuardConfig::builder().build().unwrap(), config);
    }

    #[test]
    fn recursion_depth_other_than_one_is_rejected() {
        for depth in [0, 2, 5] {
            let err = GuardConfig::builder()
                .max_recursion_depth(depth)
                .build()
                .unwrap_err();
            assert_eq!(err, ConfigError::RecursionDepth(depth));
        }
    }

    #[test]
    fn invalid_limits_are_rejected() {
        assert!(matches!(
            GuardConfig::builder().max_cost(-0.01).build(),
            Err(ConfigError::InvalidCost(_))
        ));
        assert!(matches!(
            GuardConfig::builder().max_cost(f64::NAN).build(),
            Err(ConfigError::InvalidCost(_))
        ));
        assert_eq!(
            GuardConfig::builder().max_tokens_per_subcall(0).build(),
            Err(ConfigError::ZeroTokenLimit)
        );
        assert!(matches!(
            GuardConfig::builder().max_runtime_seconds(0.0).build(),
            Err(ConfigError::InvalidRuntime(_))
        ));
        assert_eq!(
            GuardConfig::builder().model("  ").build(),
            Err(ConfigError::EmptyModel)
        );
    }

    #[test]
    fn zero_cost_budget_is_allowed() {
        let config = GuardConfig::builder().max_cost(0.0).build().unwrap();
        assert_eq!(config.max_cost(), 0.0);
    }

    #[test]
    fn model_with_rates_uses_pricing_table() {
        let config = GuardConfig::builder()
            .model_with_rates("anthropic/claude-sonnet-4")
            .build()
            .unwrap();
        assert_eq!(config.model(), "anthropic/claude-sonnet-4");
        assert_eq!(config.rates(), rates_for_model("anthropic/claude-sonnet-4"));
    }

    #[test]
    fn to_builder_derives_variant() {
        let base = GuardConfig::builder().max_cost(1.0).build().unwrap();
        let derived = base.to_builder().max_runtime_seconds(5.0).build().unwrap();
        assert_eq!(derived.max_cost(), 1.0);
        assert_eq!(derived.max_runtime_seconds(), 5.0);
    }

    #[test]
    fn deserialize_fills_defaults_and_validates() {
        let config: GuardConfig = serde_json::from_str(r#"{"max_cost": 0.1}"#).unwrap();
        assert_eq!(config.max_cost(), 0.1);
        assert_eq!(config.max_tokens_per_subcall(), 4000);

        let err = serde_json::from_str::<GuardConfig>(r#"{"max_recursion_depth": 2}"#);
        assert!(err.is_err());

        let err = serde_json::from_str::<GuardConfig>(r#"{"max_cots": 2}"#);
        assert!(err.is_err(), "unknown fields should be rejected");
    }

    #[test]
    fn serialize_round_trips_through_validation() {
        let config = GuardConfig::builder().max_cost(0.2).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: GuardConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn load_reads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_cost": 0.05, "max_runtime_seconds": 10, "model": "openai/gpt-4o"}}"#
        )
        .unwrap();
        let config = GuardConfig::load(file.path()).unwrap();
        assert_eq!(config.max_cost(), 0.05);
        assert_eq!(config.max_runtime_seconds(), 10.0);
        assert_eq!(config.model(), "openai/gpt-4o");
    }

    #[test]
    fn load_reports_missing_and_invalid_files() {
        let missing = GuardConfig::load(Path::new("/nonexistent/leash-guard.json"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_recursion_depth": 3}}"#).unwrap();
        let invalid = GuardConfig::load(file.path());
        assert!(matches!(invalid, Err(ConfigError::Parse { .. })));
    }
}
