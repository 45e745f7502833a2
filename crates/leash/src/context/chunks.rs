//! Lazy fixed-size windows over a buffer.

use super::access::{advance, between};
use super::log::{AccessLog, AccessLogEntry};
use crate::error::{Error, Result};
use std::iter::FusedIterator;

/// One window of the buffer. `start`/`end` are character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

/// Forward-only iterator over overlapping windows.
///
/// Each window is logged as it is produced, so a caller that stops early
/// only leaves entries for the windows it actually consumed.
#[derive(Debug)]
pub struct Chunks<'a> {
    log: &'a AccessLog,
    buffer: &'a str,
    chunk_size: usize,
    overlap: usize,
    context_length: usize,
    // Position of the next window, in chars and in bytes.
    pos: usize,
    byte_pos: usize,
    done: bool,
}

/// Split `buffer` into windows of `chunk_size` characters, each starting
/// `overlap` characters before the previous one ended.
///
/// Requires `chunk_size >= 1` and `overlap < chunk_size`. An empty buffer
/// yields no windows. Every call starts from offset 0, so two calls on the
/// same buffer give two independent, identical sequences.
pub fn chunks<'a>(
    log: &'a AccessLog,
    buffer: &'a str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Chunks<'a>> {
    chunks_counted(log, buffer, buffer.chars().count(), chunk_size, overlap)
}

pub(crate) fn chunks_counted<'a>(
    log: &'a AccessLog,
    buffer: &'a str,
    context_length: usize,
    chunk_size: usize,
    overlap: usize,
) -> Result<Chunks<'a>> {
    if chunk_size == 0 {
        return Err(Error::invalid_argument(
            "chunk_size must be positive, got 0",
        ));
    }
    if overlap >= chunk_size {
        return Err(Error::invalid_argument(format!(
            "overlap must be in [0, {chunk_size}), got {overlap}"
        )));
    }
    Ok(Chunks {
        log,
        buffer,
        chunk_size,
        overlap,
        context_length,
        pos: 0,
        byte_pos: 0,
        done: buffer.is_empty(),
    })
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        if self.done {
            return None;
        }
        let start = self.pos;
        let end = (start + self.chunk_size).min(self.context_length);
        let end_byte = advance(self.buffer, self.byte_pos, end - start);
        let text = between(self.buffer, self.byte_pos, end_byte);

        self.log.record(AccessLogEntry::Chunk {
            start,
            end,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            context_length: self.context_length,
            chars_accessed: end - start,
        });

        if end >= self.context_length {
            self.done = true;
        } else {
            // Step back `overlap` chars from the window end.
            self.pos = end - self.overlap;
            self.byte_pos += advance(text, 0, end - start - self.overlap);
        }
        Some(Chunk { start, end, text })
    }
}

impl FusedIterator for Chunks<'_> {}
