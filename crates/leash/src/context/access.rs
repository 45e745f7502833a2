//! Logged read primitives over a text buffer.
//!
//! All positions and lengths are measured in characters, not bytes, so a
//! `SearchMatch` from one call can be fed straight into `slice` or
//! `around_match` regardless of the buffer's encoding width.
//!
//! Each successful call appends one [`AccessLogEntry`] before returning.

use super::log::{AccessLog, AccessLogEntry};
use crate::error::{Error, Result};
use regex::RegexBuilder;
use serde::Serialize;

/// Default cap on search hits.
pub const DEFAULT_MAX_HITS: usize = 10;
/// Default characters kept on each side of a match by `around_match`.
pub const DEFAULT_AROUND: usize = 200;

/// One regex hit. `start`/`end` are character offsets, `line_number` is
/// 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub line_number: usize,
}

/// Byte index `n_chars` characters after `from`, or the end of `s`.
pub(crate) fn advance(s: &str, from: usize, n_chars: usize) -> usize {
    between(s, from, s.len())
        .char_indices()
        .nth(n_chars)
        .map_or(s.len(), |(i, _)| from + i)
}

/// Byte index `n_chars` characters before `from`, or 0.
fn retreat(s: &str, from: usize, n_chars: usize) -> usize {
    if n_chars == 0 {
        return from;
    }
    between(s, 0, from)
        .char_indices()
        .rev()
        .nth(n_chars - 1)
        .map_or(0, |(i, _)| i)
}

/// Substring between two byte offsets produced by `advance`/`retreat`.
#[allow(clippy::string_slice)] // offsets always sit on char boundaries
pub(crate) fn between(s: &str, start: usize, end: usize) -> &str {
    &s[start..end]
}

/// First `n` characters of `buffer` (the whole buffer when shorter).
pub fn head<'a>(log: &AccessLog, buffer: &'a str, n: usize) -> &'a str {
    head_counted(log, buffer, buffer.chars().count(), n)
}

/// [`head`] for a buffer whose length in characters is already known.
pub(crate) fn head_counted<'a>(
    log: &AccessLog,
    buffer: &'a str,
    context_length: usize,
    n: usize,
) -> &'a str {
    let result = between(buffer, 0, advance(buffer, 0, n));
    log.record(AccessLogEntry::Head {
        n,
        context_length,
        chars_accessed: n.min(context_length),
    });
    result
}

/// Last `n` characters of `buffer` (the whole buffer when shorter).
pub fn tail<'a>(log: &AccessLog, buffer: &'a str, n: usize) -> &'a str {
    tail_counted(log, buffer, buffer.chars().count(), n)
}

pub(crate) fn tail_counted<'a>(
    log: &AccessLog,
    buffer: &'a str,
    context_length: usize,
    n: usize,
) -> &'a str {
    let start = retreat(buffer, buffer.len(), n);
    let result = between(buffer, start, buffer.len());
    log.record(AccessLogEntry::Tail {
        n,
        context_length,
        chars_accessed: n.min(context_length),
    });
    result
}

/// Characters `start..end` of `buffer`.
///
/// Both bounds are clamped to the buffer length and an inverted range is
/// swapped rather than rejected, so `slice(b, 10, 5) == slice(b, 5, 10)`.
/// The logged entry carries the corrected bounds.
pub fn slice<'a>(log: &AccessLog, buffer: &'a str, start: usize, end: usize) -> &'a str {
    slice_counted(log, buffer, buffer.chars().count(), start, end)
}

pub(crate) fn slice_counted<'a>(
    log: &AccessLog,
    buffer: &'a str,
    len: usize,
    start: usize,
    end: usize,
) -> &'a str {
    let (mut start, mut end) = (start.min(len), end.min(len));
    if start > end {
        std::mem::swap(&mut start, &mut end);
    }
    let from = advance(buffer, 0, start);
    let to = advance(buffer, from, end - start);
    let result = between(buffer, from, to);
    log.record(AccessLogEntry::Slice {
        start,
        end,
        context_length: len,
        chars_accessed: end - start,
    });
    result
}

/// Regex search returning at most `max_hits` matches in buffer order.
///
/// Matching is case-insensitive unless `case_sensitive` is set. A pattern
/// that fails to compile yields [`Error::InvalidPattern`] and nothing is
/// logged. `max_hits` must be at least 1.
pub fn search(
    log: &AccessLog,
    buffer: &str,
    pattern: &str,
    max_hits: usize,
    case_sensitive: bool,
) -> Result<Vec<SearchMatch>> {
    search_counted(
        log,
        buffer,
        buffer.chars().count(),
        pattern,
        max_hits,
        case_sensitive,
    )
}

pub(crate) fn search_counted(
    log: &AccessLog,
    buffer: &str,
    context_length: usize,
    pattern: &str,
    max_hits: usize,
    case_sensitive: bool,
) -> Result<Vec<SearchMatch>> {
    if max_hits == 0 {
        return Err(Error::invalid_argument(
            "max_hits must be a positive integer, got 0",
        ));
    }
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()?;

    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(buffer.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    // Convert byte offsets to char offsets incrementally; matches arrive in
    // increasing order so each character is counted once.
    let mut byte_cursor = 0;
    let mut char_cursor = 0;
    let mut to_chars = |byte: usize| {
        char_cursor += between(buffer, byte_cursor, byte).chars().count();
        byte_cursor = byte;
        char_cursor
    };

    let mut matches = Vec::new();
    for m in regex.find_iter(buffer).take(max_hits) {
        let start = to_chars(m.start());
        let end = to_chars(m.end());
        matches.push(SearchMatch {
            text: m.as_str().to_string(),
            start,
            end,
            line_number: line_starts.partition_point(|&s| s <= m.start()),
        });
    }

    log.record(AccessLogEntry::Search {
        pattern: pattern.to_string(),
        max_hits,
        case_sensitive,
        context_length,
        matches_found: matches.len(),
        chars_accessed: 0,
    });
    Ok(matches)
}

/// The match plus up to `before` characters ahead of it and `after`
/// characters behind it, clamped to the buffer. Logged as a `slice`.
pub fn around_match<'a>(
    log: &AccessLog,
    buffer: &'a str,
    m: &SearchMatch,
    before: usize,
    after: usize,
) -> &'a str {
    around_match_counted(log, buffer, buffer.chars().count(), m, before, after)
}

pub(crate) fn around_match_counted<'a>(
    log: &AccessLog,
    buffer: &'a str,
    context_length: usize,
    m: &SearchMatch,
    before: usize,
    after: usize,
) -> &'a str {
    slice_counted(
        log,
        buffer,
        context_length,
        m.start.saturating_sub(before),
        m.end.saturating_add(after),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_and_tail_clamp_to_length() {
        let log = AccessLog::new();
        assert_eq!(head(&log, "hello", 3), "hel");
        assert_eq!(head(&log, "hello", 50), "hello");
        assert_eq!(tail(&log, "hello", 2), "lo");
        assert_eq!(tail(&log, "hello", 50), "hello");
        assert_eq!(tail(&log, "hello", 0), "");
        assert_eq!(log.len(), 5);

        let entries = log.entries();
        assert_eq!(
            entries[1],
            AccessLogEntry::Head {
                n: 50,
                context_length: 5,
                chars_accessed: 5
            }
        );
    }

    #[test]
    fn positions_count_characters() {
        let log = AccessLog::new();
        let buffer = "héllo wörld";
        assert_eq!(head(&log, buffer, 2), "hé");
        assert_eq!(tail(&log, buffer, 3), "rld");
        assert_eq!(slice(&log, buffer, 6, 8), "wö");
        assert_eq!(log.summary().total_chars_accessed, 7);
    }

    #[test]
    fn inverted_slice_is_swapped() {
        let log = AccessLog::new();
        let buffer = "0123456789abcdef";
        assert_eq!(slice(&log, buffer, 10, 5), slice(&log, buffer, 5, 10));
        assert_eq!(slice(&log, buffer, 5, 10), "56789");
        assert_eq!(
            log.entries()[0],
            AccessLogEntry::Slice {
                start: 5,
                end: 10,
                context_length: 16,
                chars_accessed: 5
            }
        );
    }

    #[test]
    fn slice_clamps_out_of_range_bounds() {
        let log = AccessLog::new();
        assert_eq!(slice(&log, "abc", 1, 100), "bc");
        assert_eq!(slice(&log, "abc", 100, 200), "");
        assert_eq!(slice(&log, "abc", 100, 1), "bc");
    }

    #[test]
    fn search_resolves_line_numbers() {
        let log = AccessLog::new();
        let matches = search(&log, "line1\nline2\nerror here", "error", 10, false).unwrap();
        assert_eq!(
            matches,
            vec![SearchMatch {
                text: "error".into(),
                start: 12,
                end: 17,
                line_number: 3
            }]
        );
    }

    #[test]
    fn search_is_case_insensitive_by_default() {
        let log = AccessLog::new();
        let buffer = "Error\nERROR\nerror";
        assert_eq!(search(&log, buffer, "error", 10, false).unwrap().len(), 3);
        let sensitive = search(&log, buffer, "error", 10, true).unwrap();
        assert_eq!(sensitive.len(), 1);
        assert_eq!(sensitive[0].line_number, 3);
    }

    #[test]
    fn search_caps_hits_and_logs_count() {
        let log = AccessLog::new();
        let matches = search(&log, "a a a a a", "a", 2, false).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].start, 2);
        match &log.entries()[0] {
            AccessLogEntry::Search {
                matches_found,
                chars_accessed,
                ..
            } => {
                assert_eq!(*matches_found, 2);
                assert_eq!(*chars_accessed, 0);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn search_offsets_are_characters() {
        let log = AccessLog::new();
        let buffer = "ünïcode\nfoo bar";
        let matches = search(&log, buffer, "bar", 10, false).unwrap();
        assert_eq!(matches[0].start, 12);
        assert_eq!(matches[0].end, 15);
        assert_eq!(slice(&log, buffer, matches[0].start, matches[0].end), "bar");
    }

    #[test]
    fn invalid_pattern_is_rejected_without_logging() {
        let log = AccessLog::new();
        let err = search(&log, "text", "(unclosed", 10, false).unwrap_err();
        assert_eq!(err.kind(), "InvalidPattern");
        assert!(log.is_empty());
    }

    #[test]
    fn zero_max_hits_is_invalid() {
        let log = AccessLog::new();
        let err = search(&log, "text", "t", 0, false).unwrap_err();
        assert_eq!(err.kind(), "InvalidArgument");
    }

    #[test]
    fn around_match_clamps_to_buffer() {
        let log = AccessLog::new();
        let buffer = "aaaa ERROR bbbb";
        let m = search(&log, buffer, "error", 1, false).unwrap().remove(0);
        assert_eq!(around_match(&log, buffer, &m, 2, 2), "a ERROR b");
        assert_eq!(around_match(&log, buffer, &m, 100, usize::MAX), buffer);
        let ops: Vec<&str> = log.entries().iter().map(|e| e.operation()).collect();
        assert_eq!(ops, ["search", "slice", "slice"]);
    }
}
