//! Audit trail of context reads.
//!
//! Every context access function appends exactly one [`AccessLogEntry`] to
//! the [`AccessLog`] it was handed. The log is owned by one task run and
//! shared by reference (`&AccessLog`), so appends go through an internal
//! mutex.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// One context read, with operation-specific metadata.
///
/// Serializes with an `operation` tag, e.g.
/// `{"operation": "head", "n": 500, "context_length": 9000, "chars_accessed": 500}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "lowercase")]
pub enum AccessLogEntry {
    Head {
        n: usize,
        context_length: usize,
        chars_accessed: usize,
    },
    Tail {
        n: usize,
        context_length: usize,
        chars_accessed: usize,
    },
    Slice {
        start: usize,
        end: usize,
        context_length: usize,
        chars_accessed: usize,
    },
    Search {
        pattern: String,
        max_hits: usize,
        case_sensitive: bool,
        context_length: usize,
        matches_found: usize,
        /// Always 0: search reports positions, not text.
        chars_accessed: usize,
    },
    Chunk {
        start: usize,
        end: usize,
        chunk_size: usize,
        overlap: usize,
        context_length: usize,
        chars_accessed: usize,
    },
}

impl AccessLogEntry {
    /// Operation name (`head`, `tail`, `slice`, `search`, `chunk`).
    pub fn operation(&self) -> &'static str {
        match self {
            AccessLogEntry::Head { .. } => "head",
            AccessLogEntry::Tail { .. } => "tail",
            AccessLogEntry::Slice { .. } => "slice",
            AccessLogEntry::Search { .. } => "search",
            AccessLogEntry::Chunk { .. } => "chunk",
        }
    }

    /// Characters of buffer text handed back to the caller.
    pub fn chars_accessed(&self) -> usize {
        match *self {
            AccessLogEntry::Head { chars_accessed, .. }
            | AccessLogEntry::Tail { chars_accessed, .. }
            | AccessLogEntry::Slice { chars_accessed, .. }
            | AccessLogEntry::Search { chars_accessed, .. }
            | AccessLogEntry::Chunk { chars_accessed, .. } => chars_accessed,
        }
    }
}

/// Aggregate view of an [`AccessLog`], as reported in task output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessLogSummary {
    pub total_operations: usize,
    pub operations_by_type: BTreeMap<String, usize>,
    pub total_chars_accessed: usize,
}

/// Append-only, ordered log of context reads for one task run.
#[derive(Debug, Default)]
pub struct AccessLog {
    entries: Mutex<Vec<AccessLogEntry>>,
}

impl AccessLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries_mut(&self) -> MutexGuard<'_, Vec<AccessLogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one entry.
    pub fn record(&self, entry: AccessLogEntry) {
        trace!(
            "Context access: {} ({} chars)",
            entry.operation(),
            entry.chars_accessed()
        );
        self.entries_mut().push(entry);
    }

    /// Copy of all entries in the order they were recorded.
    pub fn entries(&self) -> Vec<AccessLogEntry> {
        self.entries_mut().clone()
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries_mut().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries_mut().clear();
    }

    /// Operation counts and total characters accessed.
    pub fn summary(&self) -> AccessLogSummary {
        let entries = self.entries_mut();
        let mut summary = AccessLogSummary {
            total_operations: entries.len(),
            ..Default::default()
        };
        for entry in entries.iter() {
            *summary
                .operations_by_type
                .entry(entry.operation().to_string())
                .or_insert(0) += 1;
            summary.total_chars_accessed += entry.chars_accessed();
        }
        summary
    }
}
