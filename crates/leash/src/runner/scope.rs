//! What a task function gets to work with.

use crate::context::{AccessLog, ContextView};
use crate::error::Result;
use crate::guard::GuardState;
use crate::subcall::{SubcallBackend, SubcallGateway};
use serde_json::{Value, json};

/// Handle passed to a task for the duration of one run.
///
/// Reads go through [`context`](Self::context) and are logged; model calls
/// go through [`gateway`](Self::gateway) and are charged to the run's
/// budget.
#[derive(Debug, Clone, Copy)]
pub struct TaskScope<'a> {
    buffer: &'a str,
    context: ContextView<'a>,
    gateway: SubcallGateway<'a>,
}

impl<'a> TaskScope<'a> {
    pub fn new(
        buffer: &'a str,
        log: &'a AccessLog,
        state: &'a GuardState,
        backend: &'a dyn SubcallBackend,
    ) -> Self {
        Self {
            buffer,
            context: ContextView::new(buffer, log),
            gateway: SubcallGateway::new(state, backend),
        }
    }

    /// The raw buffer. Reading it directly bypasses the access log; prefer
    /// [`context`](Self::context).
    pub fn buffer(&self) -> &'a str {
        self.buffer
    }

    pub fn context(&self) -> ContextView<'a> {
        self.context
    }

    pub fn gateway(&self) -> SubcallGateway<'a> {
        self.gateway
    }

    /// Read-only view of the run's budget counters.
    pub fn guard(&self) -> &'a GuardState {
        self.gateway.state()
    }

    /// Shorthand for `self.gateway().subcall(prompt, chunk)`.
    pub fn subcall(&self, prompt: &str, chunk: &str) -> Result<String> {
        self.gateway.subcall(prompt, chunk)
    }
}

/// Append-only collector of intermediate results.
///
/// Whatever was pushed before a failure is reported in the task output as
/// `{"partial_results": [...], "items_processed": n}`.
#[derive(Debug, Default, Clone)]
pub struct Accumulator {
    items: Vec<Value>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Value) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_partial_result(self) -> Value {
        let items_processed = self.items.len();
        json!({
            "partial_results": self.items,
            "items_processed": items_processed,
        })
    }
}
