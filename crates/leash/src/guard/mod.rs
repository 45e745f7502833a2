//! Budget enforcement: policy, accounting, and violations.
//!
//! - [`config`]: [`GuardConfig`], the immutable policy for one task run
//!   (cost ceiling, per-subcall token ceiling, runtime ceiling, fixed
//!   recursion depth of 1, model and pricing).
//! - [`state`]: [`GuardState`], the lock-protected accumulator the
//!   [`SubcallGateway`](crate::subcall::SubcallGateway) checks and updates.
//! - [`error`]: [`GuardError`], one variant per limit, all carrying
//!   `limit` and `current`.
//!
//! Guards never clamp or downgrade. Every violation is returned as an error
//! at the checkpoint that detected it.

pub mod config;
pub mod error;
pub mod state;

pub use config::{ConfigError, DEFAULT_MODEL, GuardConfig, GuardConfigBuilder, MAX_RECURSION_DEPTH};
pub use error::GuardError;
pub use state::{BudgetSummary, DepthGuard, GuardState, estimate_tokens};
