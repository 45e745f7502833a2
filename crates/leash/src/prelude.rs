//! Convenience re-exports for writing tasks.
//!
//! ```
//! use leash::prelude::*;
//! ```
//!
//! Pulls in the runner, the scope handed to tasks, guard policy types, the
//! backend trait with its closure adapter, and the crate error. The
//! OpenRouter client and the access-log internals are left out; import
//! those from their modules when needed.

// ── Running tasks ───────────────────────────────────────────────────
pub use crate::runner::{Accumulator, TaskOutput, TaskRunner, TaskScope, TaskStatus};

// ── Budget policy ───────────────────────────────────────────────────
pub use crate::guard::{BudgetSummary, GuardConfig, GuardError, GuardState};

// ── Context access ──────────────────────────────────────────────────
pub use crate::context::{AccessLog, ContextView, SearchMatch};

// ── Subcalls ────────────────────────────────────────────────────────
pub use crate::subcall::{FnBackend, RawCompletion, SubcallBackend, SubcallGateway};

pub use crate::error::{Error, Result};
