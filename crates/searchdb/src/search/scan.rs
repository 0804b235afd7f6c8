//! Chunk scanning with match collection, result caps, and cooperative
//! cancellation.
//!
//! The scanned buffers are bounds-checked slices over immutable contents
//! pieces, each capped at 100 KiB, so the maximum uninterruptible unit of
//! work is one `find_next` call over one piece: cancellation latency is
//! bounded by one scan iteration, never instantaneous.

use crate::progress::SearchProgress;
use crate::search::pattern::{CompiledTextSearch, TextRange};

/// Collects matches of `compiled` in `text`, in ascending offset order.
///
/// Scanning stops early when `max_results` matches were collected or the
/// shared `tracker` signals termination (driver cancellation or the global
/// cap across all parallel scans); on an early stop the pattern's `cancel`
/// hook runs so any scan state is released deterministically. Matches found
/// are reported to `tracker` as they are collected.
///
/// The second return value is true when scanning stopped before the end of
/// the buffer, meaning further matches may exist but were not collected.
/// Callers must surface that as a truncation indicator; the collected
/// matches alone cannot distinguish "found them all" from "hit the cap".
pub fn find_all(
    text: &[u8],
    compiled: &dyn CompiledTextSearch,
    tracker: &SearchProgress,
    max_results: usize,
) -> (Vec<TextRange>, bool) {
    let mut matches = Vec::new();
    if max_results == 0 || tracker.should_end() {
        return (matches, true);
    }

    let mut stopped_early = false;
    let mut start = 0;
    while let Some(found) = compiled.find_next(text, start) {
        matches.push(found);
        tracker.add_results(1);
        if matches.len() >= max_results || tracker.should_end() {
            stopped_early = true;
            compiled.cancel();
            break;
        }
        // An empty match (possible with regex patterns) must still advance.
        start = found.offset + found.length.max(1);
        if start > text.len() {
            break;
        }
    }
    (matches, stopped_early)
}

/// Returns the first match of `compiled` in `text`, if any.
pub fn find_first(text: &[u8], compiled: &dyn CompiledTextSearch) -> Option<TextRange> {
    compiled.find_next(text, 0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
