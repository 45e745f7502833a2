//! Audited read access to a large text buffer.
//!
//! Task code never indexes the buffer directly. It reads through the
//! functions here, each of which appends one entry to the run's
//! [`AccessLog`]:
//!
//! - **[`head`] / [`tail`]** bounded prefix and suffix.
//! - **[`slice`]** arbitrary character range, clamped and order-corrected.
//! - **[`search`]** regex hits with 1-indexed line numbers.
//! - **[`chunks`]** lazy overlapping windows, logged one per window.
//! - **[`around_match`]** a slice centred on a [`SearchMatch`].
//!
//! [`ContextView`] bundles a buffer with its log so task code can call
//! these as methods with the usual defaults.

pub mod access;
pub mod chunks;
pub mod log;

pub use access::{
    DEFAULT_AROUND, DEFAULT_MAX_HITS, SearchMatch, around_match, head, search, slice, tail,
};
pub use chunks::{Chunk, Chunks, chunks};
pub use log::{AccessLog, AccessLogEntry, AccessLogSummary};

use crate::error::Result;
use access::{around_match_counted, head_counted, search_counted, slice_counted, tail_counted};
use chunks::chunks_counted;

/// A buffer paired with the access log its reads are recorded in.
///
/// The character length is counted once here; reads through the view do
/// not rescan the buffer to find it.
#[derive(Debug, Clone, Copy)]
pub struct ContextView<'a> {
    buffer: &'a str,
    log: &'a AccessLog,
    len: usize,
}

impl<'a> ContextView<'a> {
    pub fn new(buffer: &'a str, log: &'a AccessLog) -> Self {
        Self {
            buffer,
            log,
            len: buffer.chars().count(),
        }
    }

    /// Buffer length in characters. Not logged.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn log(&self) -> &'a AccessLog {
        self.log
    }

    pub fn head(&self, n: usize) -> &'a str {
        head_counted(self.log, self.buffer, self.len, n)
    }

    pub fn tail(&self, n: usize) -> &'a str {
        tail_counted(self.log, self.buffer, self.len, n)
    }

    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        slice_counted(self.log, self.buffer, self.len, start, end)
    }

    /// Case-insensitive search with up to [`DEFAULT_MAX_HITS`] results.
    pub fn search(&self, pattern: &str) -> Result<Vec<SearchMatch>> {
        search_counted(
            self.log,
            self.buffer,
            self.len,
            pattern,
            DEFAULT_MAX_HITS,
            false,
        )
    }

    /// Search with explicit hit cap and case sensitivity.
    pub fn search_with(
        &self,
        pattern: &str,
        max_hits: usize,
        case_sensitive: bool,
    ) -> Result<Vec<SearchMatch>> {
        search_counted(
            self.log,
            self.buffer,
            self.len,
            pattern,
            max_hits,
            case_sensitive,
        )
    }

    pub fn chunks(&self, chunk_size: usize, overlap: usize) -> Result<Chunks<'a>> {
        chunks_counted(self.log, self.buffer, self.len, chunk_size, overlap)
    }

    /// [`DEFAULT_AROUND`] characters on each side of `m`.
    pub fn around(&self, m: &SearchMatch) -> &'a str {
        around_match_counted(
            self.log,
            self.buffer,
            self.len,
            m,
            DEFAULT_AROUND,
            DEFAULT_AROUND,
        )
    }

    pub fn around_match(&self, m: &SearchMatch, before: usize, after: usize) -> &'a str {
        around_match_counted(self.log, self.buffer, self.len, m, before, after)
    }
}
