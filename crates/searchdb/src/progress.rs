//! Progress tracking and cooperative cancellation.
//!
//! Two shared flag-plus-counter objects are threaded through every parallel
//! operation in this crate:
//! - [`BuildProgress`] reports database build statistics and carries the
//!   build cancellation flag.
//! - [`SearchProgress`] counts hits across all parallel chunk scans of one
//!   search request and signals early termination once a global cap is
//!   reached or the driver cancels.
//!
//! Cancellation is cooperative: workers poll `should_end`/`is_cancelled` at
//! iteration boundaries, so the maximum latency before a worker notices is
//! one work unit (one scanned piece at most).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// How often tight per-element loops re-check the cancellation flag.
/// Power of 2 so the modulo reduces to a bitwise AND.
pub const CANCEL_CHECK_INTERVAL: usize = 0x400;

// ---------------------------------------------------------------------------
// Build progress
// ---------------------------------------------------------------------------

/// Statistics sink and cancellation flag for one database build.
///
/// All counters are monotonic for the duration of a build; `snapshot` reads
/// them with relaxed ordering, so a snapshot taken while workers run is a
/// consistent-enough view for reporting, not an exact cut.
#[derive(Debug, Default)]
pub struct BuildProgress {
    files_diffed: AtomicUsize,
    files_transferred: AtomicUsize,
    files_read: AtomicUsize,
    bytes_partitioned: AtomicU64,
    errors: AtomicUsize,
    cancelled: AtomicBool,
}

impl BuildProgress {
    /// Creates a fresh tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cooperative cancellation of the build.
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns true if the driver requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn add_files_diffed(&self, count: usize) {
        self.files_diffed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_files_transferred(&self, count: usize) {
        self.files_transferred.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_files_read(&self, count: usize) {
        self.files_read.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bytes_partitioned(&self, bytes: u64) {
        self.bytes_partitioned.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of the counters.
    pub fn snapshot(&self) -> BuildProgressSnapshot {
        BuildProgressSnapshot {
            files_diffed: self.files_diffed.load(Ordering::Relaxed),
            files_transferred: self.files_transferred.load(Ordering::Relaxed),
            files_read: self.files_read.load(Ordering::Relaxed),
            bytes_partitioned: self.bytes_partitioned.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`BuildProgress`] counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildProgressSnapshot {
    pub files_diffed: usize,
    pub files_transferred: usize,
    pub files_read: usize,
    pub bytes_partitioned: u64,
    pub errors: usize,
}

// ---------------------------------------------------------------------------
// Search progress
// ---------------------------------------------------------------------------

/// Shared hit counter and termination flag for one search request.
///
/// Every parallel chunk scan reports its matches through `add_results` and
/// polls `should_end` once per scan iteration. `should_end` fires when the
/// global hit cap is reached or the driver cancelled, whichever happens
/// first.
#[derive(Debug)]
pub struct SearchProgress {
    hit_count: AtomicUsize,
    max_hits: usize,
    cancelled: AtomicBool,
}

impl SearchProgress {
    /// Creates a tracker capped at `max_hits` total results.
    pub fn new(max_hits: usize) -> Self {
        Self {
            hit_count: AtomicUsize::new(0),
            max_hits,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Creates a tracker with no global cap (cancellation only).
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Records `count` new matches; returns the updated total.
    pub fn add_results(&self, count: usize) -> usize {
        self.hit_count.fetch_add(count, Ordering::Relaxed) + count
    }

    /// Total matches recorded so far across all workers.
    pub fn results_found(&self) -> usize {
        self.hit_count.load(Ordering::Relaxed)
    }

    /// Requests cooperative cancellation of the search.
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns true if the driver requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Returns true once scanning should stop: either the global cap was
    /// reached or the search was cancelled.
    pub fn should_end(&self) -> bool {
        self.is_cancelled() || self.results_found() >= self.max_hits
    }

    /// Sparse variant of [`should_end`](Self::should_end) for tight loops:
    /// only performs the atomic reads every [`CANCEL_CHECK_INTERVAL`]
    /// iterations.
    #[inline]
    pub fn should_end_sparse(&self, counter: usize) -> bool {
        if counter & (CANCEL_CHECK_INTERVAL - 1) == 0 {
            self.should_end()
        } else {
            false
        }
    }
}

impl Default for SearchProgress {
    fn default() -> Self {
        Self::unbounded()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
