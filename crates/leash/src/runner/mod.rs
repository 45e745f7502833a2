//! Task execution harness.
//!
//! [`TaskRunner`] is the one place where errors become a terminal status.
//! Every run gets its own [`AccessLog`] and [`GuardState`], so a runner can
//! be reused, and runs on different threads never share counters.
//!
//! | Failure | Status | `result` |
//! |---------|--------|----------|
//! | none | `completed` | task return value |
//! | cost or runtime exhausted | `partial` | accumulator contents, else null |
//! | token or depth violation | `error` | accumulator contents, else null |
//! | anything else, panics included | `error` | accumulator contents, else null |

mod output;
mod scope;

pub use output::{TaskOutput, TaskStatus, error_message};
pub use scope::{Accumulator, TaskScope};

use crate::api::tracing::generate_trace_id;
use crate::context::AccessLog;
use crate::error::{Error, Result};
use crate::guard::{GuardConfig, GuardState};
use crate::subcall::SubcallBackend;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use tracing::{error, info, info_span, warn};

/// Runs task functions inside a fresh guard scope.
pub struct TaskRunner<'b> {
    backend: &'b dyn SubcallBackend,
    config: GuardConfig,
}

impl<'b> TaskRunner<'b> {
    /// Runner with the default policy.
    pub fn new(backend: &'b dyn SubcallBackend) -> Self {
        Self {
            backend,
            config: GuardConfig::default(),
        }
    }

    /// Replace the policy used for subsequent runs.
    pub fn with_config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Run `task` over `buffer`.
    ///
    /// The task's return value becomes `result` on success. On failure
    /// `result` is null; use [`run_with_accumulator`](Self::run_with_accumulator)
    /// to keep work done before the failure. A panicking task is caught and
    /// reported as `error` with a `Panic: ...` message.
    pub fn run<F>(&self, buffer: &str, task: F) -> TaskOutput
    where
        F: FnOnce(&TaskScope<'_>) -> Result<Value>,
    {
        self.execute(buffer, task)
    }

    /// Run `task` with an [`Accumulator`]. On any failure, budget, error or
    /// panic, `result` is the accumulator's partial-result document.
    pub fn run_with_accumulator<F>(&self, buffer: &str, task: F) -> TaskOutput
    where
        F: FnOnce(&TaskScope<'_>, &mut Accumulator) -> Result<Value>,
    {
        // Lives outside the unwind boundary so a panic keeps what was pushed.
        let mut acc = Accumulator::new();
        let mut output = self.execute(buffer, |scope| task(scope, &mut acc));
        if !output.is_completed() {
            output.result = Some(acc.into_partial_result());
        }
        output
    }

    fn execute<F>(&self, buffer: &str, task: F) -> TaskOutput
    where
        F: FnOnce(&TaskScope<'_>) -> Result<Value>,
    {
        let trace_id = generate_trace_id();
        let span = info_span!("task", %trace_id);
        let _enter = span.enter();

        let log = AccessLog::new();
        let state = GuardState::new(self.config.clone());
        info!(
            "Task started: {} chars, budget=${:.2}, runtime={:.0}s, tokens/subcall={}, model={}",
            buffer.chars().count(),
            self.config.max_cost(),
            self.config.max_runtime_seconds(),
            self.config.max_tokens_per_subcall(),
            self.config.model(),
        );

        let scope = TaskScope::new(buffer, &log, &state, self.backend);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(&scope))).unwrap_or_else(
            |payload| {
                let err = Error::from_panic(&*payload);
                error!("Task panicked: {err}");
                Err(err)
            },
        );
        let (status, result, error) = match outcome {
            Ok(value) => (TaskStatus::Completed, Some(value), None),
            Err(err) => {
                let status = TaskStatus::for_error(&err);
                let message = error_message(&err);
                if status == TaskStatus::Partial {
                    warn!("Task halted by budget: {message}");
                } else {
                    warn!("Task failed: {message}");
                }
                (status, None, Some(message))
            }
        };

        let output = TaskOutput {
            status,
            result,
            error,
            budget_summary: state.summary(),
            access_log_summary: log.summary(),
        };
        info!(
            "Task {}: {} calls, ${:.4}, {} context reads",
            output.status,
            output.budget_summary.total_calls,
            output.budget_summary.total_cost_usd,
            output.access_log_summary.total_operations,
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardError;
    use crate::subcall::{FnBackend, RawCompletion};
    use serde_json::json;

    fn backend() -> impl SubcallBackend {
        FnBackend::new(|_: &str, _: &str| Ok(RawCompletion::new("ok", 1000, 100)))
    }

    #[test]
    fn completed_run_carries_result_and_summaries() {
        let backend = backend();
        let runner = TaskRunner::new(&backend);
        let output = runner.run("hello world", |scope| {
            let head = scope.context().head(5);
            let answer = scope.subcall("Repeat", head)?;
            Ok(json!({ "head": head, "answer": answer }))
        });
        assert_eq!(output.status, TaskStatus::Completed);
        assert_eq!(output.result, Some(json!({"head": "hello", "answer": "ok"})));
        assert!(output.error.is_none());
        assert_eq!(output.budget_summary.total_calls, 1);
        assert_eq!(output.access_log_summary.total_operations, 1);
        assert_eq!(output.exit_code(), 0);
    }

    #[test]
    fn cost_exhaustion_is_partial_with_null_result() {
        let backend = backend();
        let config = GuardConfig::builder().max_cost(0.0).build().unwrap();
        let runner = TaskRunner::new(&backend).with_config(config);
        let output = runner.run("text", |scope| {
            scope.subcall("Summarize", scope.context().head(4))?;
            Ok(json!("unreachable"))
        });
        assert_eq!(output.status, TaskStatus::Partial);
        assert!(output.result.is_none());
        assert_eq!(
            output.error.as_deref(),
            Some("Cost budget exceeded: $0.0000 >= $0.0000")
        );
        assert_eq!(output.exit_code(), 2);
    }

    #[test]
    fn generic_errors_are_prefixed_with_kind() {
        let backend = backend();
        let runner = TaskRunner::new(&backend);
        let output = runner.run("text", |scope| {
            scope.context().search("(unclosed")?;
            Ok(Value::Null)
        });
        assert_eq!(output.status, TaskStatus::Error);
        let message = output.error.unwrap();
        assert!(message.starts_with("InvalidPattern: "), "{message}");
        assert!(output.result.is_none());
    }

    #[test]
    fn accumulator_keeps_items_on_any_failure() {
        let backend = backend();
        let runner = TaskRunner::new(&backend);
        let output = runner.run_with_accumulator("text", |_, acc| {
            acc.push(json!(1));
            Err(Error::task("gave up"))
        });
        assert_eq!(output.status, TaskStatus::Error);
        assert_eq!(output.error.as_deref(), Some("TaskError: gave up"));
        assert_eq!(output.result.unwrap()["items_processed"], 1);
    }

    #[test]
    fn panicking_task_becomes_an_error_output() {
        let backend = backend();
        let runner = TaskRunner::new(&backend);
        let output = runner.run("abc", |scope| {
            scope.context().head(1);
            let hits = scope.context().search("missing")?;
            Ok(json!(hits[0].start))
        });
        assert_eq!(output.status, TaskStatus::Error);
        assert!(output.result.is_none());
        let message = output.error.clone().unwrap();
        assert!(message.starts_with("Panic: index out of bounds"), "{message}");
        assert_eq!(output.access_log_summary.total_operations, 2);
        assert_eq!(output.exit_code(), 1);
    }

    #[test]
    fn accumulator_result_on_success_is_task_value() {
        let backend = backend();
        let runner = TaskRunner::new(&backend);
        let output = runner.run_with_accumulator("text", |_, acc| {
            acc.push(json!("a"));
            Ok(json!({"items": acc.items()}))
        });
        assert_eq!(output.result, Some(json!({"items": ["a"]})));
    }

    #[test]
    fn each_run_gets_fresh_state() {
        let backend = backend();
        let runner = TaskRunner::new(&backend);
        for _ in 0..2 {
            let output = runner.run("abc", |scope| {
                scope.context().tail(1);
                scope.subcall("p", "c")?;
                Ok(Value::Null)
            });
            assert_eq!(output.budget_summary.total_calls, 1);
            assert_eq!(output.access_log_summary.total_operations, 1);
        }
    }

    #[test]
    fn depth_violation_is_error() {
        let backend = backend();
        let runner = TaskRunner::new(&backend);
        let output = runner.run("abc", |scope| {
            let _outer = scope.guard().scoped_depth();
            scope.subcall("p", "c")?;
            Ok(Value::Null)
        });
        let expected = GuardError::Recursion {
            limit: 1,
            current: 2,
        }
        .status_message();
        assert_eq!(output.status, TaskStatus::Error);
        assert_eq!(output.error, Some(expected));
        assert!(output.result.is_none());
    }
}
