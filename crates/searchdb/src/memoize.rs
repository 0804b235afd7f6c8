//! Content-addressed memoization of file contents.
//!
//! Many source trees hold the same bytes under many paths (generated and
//! vendored files especially). [`ContentsMemoization`] collapses freshly
//! read contents onto one canonical instance so duplicate buffers are
//! reclaimed immediately after a build.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::collections::SlimHashTable;
use crate::contents::FileContents;
use crate::names::FileName;

/// Fingerprint key of one contents instance.
///
/// The hash combines the file's leaf-name hash with both halves of the byte
/// length, while equality compares only byte length and last-write
/// timestamp (the same-contents policy of [`crate::contents`]). The hash is
/// deliberately narrower than equality: contents only collapse when their
/// leaf names hash alike, which is the duplicate population this cache
/// targets, and keeps a rename from aliasing unrelated same-sized files.
pub struct ContentsFingerprint {
    name_hash: u64,
    byte_length: u64,
    last_write: std::time::SystemTime,
}

impl ContentsFingerprint {
    fn new(name: &FileName, contents: &FileContents) -> Self {
        let mut hasher = fnv::FnvHasher::default();
        hasher.write(name.name().as_bytes());
        Self {
            name_hash: hasher.finish(),
            byte_length: contents.byte_length(),
            last_write: contents.last_write(),
        }
    }
}

impl Hash for ContentsFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.name_hash);
        state.write_u32(self.byte_length as u32);
        state.write_u32((self.byte_length >> 32) as u32);
    }
}

impl PartialEq for ContentsFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.byte_length == other.byte_length && self.last_write == other.last_write
    }
}

impl Eq for ContentsFingerprint {}

/// Deduplicating cache of file contents keyed by fingerprint.
#[derive(Default)]
pub struct ContentsMemoization {
    table: Mutex<SlimHashTable<ContentsFingerprint, Arc<FileContents>>>,
    saved_bytes: AtomicU64,
}

impl ContentsMemoization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical instance for `contents`, storing `contents`
    /// itself if no matching instance exists.
    pub fn intern(&self, name: &FileName, contents: Arc<FileContents>) -> Arc<FileContents> {
        let fingerprint = ContentsFingerprint::new(name, &contents);
        let canonical = {
            let mut table = self.table.lock();
            let candidate = Arc::clone(&contents);
            Arc::clone(table.get_or_insert_with(fingerprint, move || candidate))
        };
        if !Arc::ptr_eq(&canonical, &contents) {
            self.saved_bytes
                .fetch_add(contents.byte_length(), Ordering::Relaxed);
        }
        canonical
    }

    /// Number of distinct contents instances held.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Returns true if nothing has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Total bytes of duplicate buffers collapsed so far.
    pub fn saved_bytes(&self) -> u64 {
        self.saved_bytes.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::NameInterner;
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    fn contents(bytes: &[u8], seconds: u64) -> Arc<FileContents> {
        Arc::new(FileContents::new(
            bytes.to_vec(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(seconds),
        ))
    }

    #[test]
    fn identical_files_collapse() {
        let interner = NameInterner::new();
        let root = interner.root(Path::new("/r"));
        let a_dir = interner.directory(&root, "a");
        let b_dir = interner.directory(&root, "b");
        // Same leaf name under two directories, same bytes and timestamp.
        let a = interner.file(&a_dir, "LICENSE");
        let b = interner.file(&b_dir, "LICENSE");

        let memo = ContentsMemoization::new();
        let first = memo.intern(&a, contents(b"MIT", 100));
        let second = memo.intern(&b, contents(b"MIT", 100));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(memo.len(), 1);
        assert_eq!(memo.saved_bytes(), 3);
    }

    #[test]
    fn different_timestamps_stay_distinct() {
        let interner = NameInterner::new();
        let root = interner.root(Path::new("/r"));
        let name = interner.file(&root, "x.txt");

        let memo = ContentsMemoization::new();
        let first = memo.intern(&name, contents(b"abc", 100));
        let second = memo.intern(&name, contents(b"abc", 200));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(memo.len(), 2);
    }

    #[test]
    fn different_lengths_stay_distinct() {
        let interner = NameInterner::new();
        let root = interner.root(Path::new("/r"));
        let name = interner.file(&root, "x.txt");

        let memo = ContentsMemoization::new();
        let first = memo.intern(&name, contents(b"abc", 100));
        let second = memo.intern(&name, contents(b"abcd", 100));
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn same_length_and_timestamp_collapse_despite_bytes() {
        // The documented policy: bytes are not compared.
        let interner = NameInterner::new();
        let root = interner.root(Path::new("/r"));
        let name = interner.file(&root, "x.txt");

        let memo = ContentsMemoization::new();
        let first = memo.intern(&name, contents(b"abc", 100));
        let second = memo.intern(&name, contents(b"xyz", 100));
        assert!(Arc::ptr_eq(&first, &second));
    }
}
