//! Terminal task status and the structured output document.

use crate::context::AccessLogSummary;
use crate::error::Error;
use crate::guard::BudgetSummary;
use serde::Serialize;
use serde_json::Value;

/// How a task run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The task returned normally.
    Completed,
    /// Cost or runtime ran out mid-flight.
    Partial,
    /// Anything else went wrong.
    Error,
}

impl TaskStatus {
    /// Process exit code for scripts: 0, 2, and 1 respectively.
    pub fn exit_code(self) -> i32 {
        match self {
            TaskStatus::Completed => 0,
            TaskStatus::Partial => 2,
            TaskStatus::Error => 1,
        }
    }

    /// Status for a failed run.
    pub fn for_error(err: &Error) -> Self {
        match err.as_guard() {
            Some(guard) if guard.is_exhaustion() => TaskStatus::Partial,
            _ => TaskStatus::Error,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Partial => write!(f, "partial"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// Everything a caller learns about one task run.
///
/// Budget and access summaries are present on every branch, including
/// failures.
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutput {
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub budget_summary: BudgetSummary,
    pub access_log_summary: AccessLogSummary,
}

impl TaskOutput {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}

/// User-facing message for a failed run.
///
/// Guard violations get their fixed wording; anything else is prefixed
/// with its kind, e.g. `InvalidPattern: invalid search pattern: ...`.
pub fn error_message(err: &Error) -> String {
    match err.as_guard() {
        Some(guard) => guard.status_message(),
        None => format!("{}: {err}", err.kind()),
    }
}
