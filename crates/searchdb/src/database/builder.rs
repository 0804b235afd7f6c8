//! Incremental file database builder.
//!
//! One build run takes the previously published snapshot plus a new
//! file-system tree snapshot and produces the next database snapshot:
//!
//! 1. **Diff** the previous and new file sets (added / removed / retained).
//! 2. **Transfer** retained files whose on-disk timestamp still matches the
//!    previously recorded contents, reusing the previous buffer by
//!    reference without touching its bytes. Transferred files are marked
//!    in a partitioned settled-membership bit set.
//! 3. **Read** every file phase 2 left unsettled from disk in parallel,
//!    interning buffers through this build's memoization map. Per-file I/O
//!    errors degrade that file to name-only indexing; they never abort the
//!    build.
//! 4. **Partition** all content pieces into byte-weight-balanced groups for
//!    parallel search.
//!
//! Cancellation is cooperative: once the progress tracker's flag is set,
//! remaining transfer/read work is skipped and the snapshot is published
//! with the affected files searchable by name only.

use std::fs;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fnv::FnvHashMap;
use log::{debug, info};
use rayon::prelude::*;

use crate::collections::{build_diff, PartitionedBitArray};
use crate::contents::{
    is_searchable_text, split_piece_ranges, FileContents, MAX_INDEXED_FILE_BYTES,
};
use crate::database::data::{ContentPiece, DirectoryData, FileData, FileDatabaseSnapshot};
use crate::database::partition::partition_by_weight;
use crate::memoize::ContentsMemoization;
use crate::names::{DirectoryName, FileName};
use crate::progress::BuildProgress;
use crate::snapshot::{DirectorySnapshot, FileSystemSnapshot};

/// Builds successive [`FileDatabaseSnapshot`]s from file-system tree
/// snapshots.
///
/// Each build run scopes its own content memoization map: duplicate
/// contents collapse within one snapshot, and the map is dropped with the
/// build so superseded buffers are never pinned across snapshots. Identity
/// across snapshots comes from the transfer-by-reference path instead.
/// Builds are intended to be serialized by the driver (one in flight at a
/// time); a build may run concurrently with searches against the previous
/// snapshot.
pub struct FileDatabaseBuilder {
    partition_count: usize,
    deduplicated_bytes: AtomicU64,
}

impl FileDatabaseBuilder {
    /// Creates a builder partitioning search work over the rayon pool width.
    pub fn new() -> Self {
        Self {
            partition_count: rayon::current_num_threads().max(1),
            deduplicated_bytes: AtomicU64::new(0),
        }
    }

    /// Overrides the number of search partitions.
    ///
    /// # Panics
    /// Panics if `partition_count` is zero.
    pub fn with_partition_count(mut self, partition_count: usize) -> Self {
        assert!(partition_count > 0, "partition count must be positive");
        self.partition_count = partition_count;
        self
    }

    /// Bytes of duplicate content collapsed by memoization across all
    /// builds so far.
    pub fn deduplicated_bytes(&self) -> u64 {
        self.deduplicated_bytes.load(Ordering::Relaxed)
    }

    /// Builds the next database snapshot. Pass
    /// [`FileDatabaseSnapshot::empty`] as `previous` for the first run.
    pub fn build(
        &self,
        previous: &FileDatabaseSnapshot,
        tree: &FileSystemSnapshot,
        progress: &BuildProgress,
    ) -> FileDatabaseSnapshot {
        // Phase 1: classify files against the previous snapshot.
        let new_files = tree.all_files();
        let new_names: Vec<FileName> = new_files.iter().map(|file| file.name.clone()).collect();
        let previous_names: Vec<FileName> = previous.files().keys().cloned().collect();
        let diff = build_diff(&previous_names, &new_names);
        progress.add_files_diffed(previous_names.len() + new_names.len());
        info!(
            "snapshot {} diff: {} added, {} removed, {} retained",
            tree.version(),
            diff.right_only.len(),
            diff.left_only.len(),
            diff.common.len()
        );

        // Every file gets a fresh FileData; retained files may reuse the old
        // contents buffer below, but never the old FileData.
        let files: FnvHashMap<FileName, Arc<FileData>> = new_names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    Arc::new(FileData::new(name.clone(), None)),
                )
            })
            .collect();

        // Contents dedup is scoped to this build run; the map drops with it.
        let memoization = ContentsMemoization::new();

        // Settled-contents membership, striped across the builder's
        // partition width so parallel transfers rarely contend on one lock.
        let settled = PartitionedBitArray::new(self.partition_count, new_names.len());
        let index_of: FnvHashMap<&FileName, usize> = new_names
            .iter()
            .enumerate()
            .map(|(index, name)| (name, index))
            .collect();

        // Phase 2: transfer unchanged contents without reading bytes.
        diff.common.par_iter().for_each(|(old_name, new_name)| {
            if progress.is_cancelled() {
                return;
            }
            if self.transfer_unchanged(previous, &files, &memoization, old_name, new_name) {
                if let Some(&index) = index_of.get(new_name) {
                    settled.set(index, true);
                }
                progress.add_files_transferred(1);
            }
        });

        // Phase 3: read every file phase 2 did not settle.
        new_names.par_iter().enumerate().for_each(|(index, name)| {
            if settled.get(index) || progress.is_cancelled() {
                return;
            }
            let data = &files[name];
            match self.read_contents(name) {
                Ok(Some(contents)) => {
                    let canonical = memoization.intern(name, Arc::new(contents));
                    data.swap_contents(Some(canonical));
                    progress.add_files_read(1);
                }
                Ok(None) => {} // binary or oversized: searchable by name only
                Err(err) => {
                    debug!(
                        "reading {} failed, indexing by name only: {err}",
                        name.full_path().display()
                    );
                    progress.add_error();
                }
            }
        });

        // Phase 4: split contents into pieces and balance them.
        let mut pieces = Vec::new();
        let mut searchable_file_count = 0;
        for data in files.values() {
            let Some(contents) = data.contents() else {
                continue;
            };
            searchable_file_count += 1;
            for range in split_piece_ranges(contents.byte_length()) {
                pieces.push(ContentPiece::new(Arc::clone(data), range));
            }
            progress.add_bytes_partitioned(contents.byte_length());
        }
        let partitions = partition_by_weight(pieces, self.partition_count, ContentPiece::byte_length);

        let mut directories = FnvHashMap::default();
        collect_directory_data(tree.root(), &mut directories);

        self.deduplicated_bytes
            .fetch_add(memoization.saved_bytes(), Ordering::Relaxed);

        let stats = progress.snapshot();
        info!(
            "snapshot {} built: {} files ({} searchable), {} directories, \
             {} transferred, {} read, {} errors, {} bytes deduplicated",
            tree.version(),
            files.len(),
            searchable_file_count,
            directories.len(),
            stats.files_transferred,
            stats.files_read,
            stats.errors,
            memoization.saved_bytes()
        );

        FileDatabaseSnapshot::new(
            tree.version(),
            files,
            directories,
            partitions,
            searchable_file_count,
        )
    }

    /// Refreshes the contents of known-changed files on an already published
    /// snapshot by swapping their contents references in place.
    ///
    /// This is the low-latency live-edit path and deliberately trades strict
    /// snapshot purity for responsiveness: piece boundaries and the
    /// searchable-file count are not recomputed, so a grown file's new tail
    /// becomes searchable only on the next full build. Readers still never
    /// observe a torn contents reference.
    pub fn update_changed_files(&self, snapshot: &FileDatabaseSnapshot, changed: &[FileName]) {
        for name in changed {
            let Some(data) = snapshot.file(name) else {
                continue;
            };
            match self.read_contents(name) {
                Ok(contents) => {
                    // No interning here: the new buffer simply replaces the
                    // old reference, which frees as its readers finish.
                    data.swap_contents(contents.map(Arc::new));
                }
                Err(err) => {
                    debug!(
                        "refreshing {} failed, dropping its contents: {err}",
                        name.full_path().display()
                    );
                    data.swap_contents(None);
                }
            }
        }
    }

    /// Reuses the previous contents buffer if the file still exists on disk
    /// with a matching timestamp and length. Returns true on reuse.
    fn transfer_unchanged(
        &self,
        previous: &FileDatabaseSnapshot,
        files: &FnvHashMap<FileName, Arc<FileData>>,
        memoization: &ContentsMemoization,
        old_name: &FileName,
        new_name: &FileName,
    ) -> bool {
        let Some(prev_data) = previous.file(old_name) else {
            return false;
        };
        let Some(prev_contents) = prev_data.contents() else {
            return false;
        };
        let Ok(metadata) = fs::metadata(new_name.full_path()) else {
            // File vanished since the scan; the read phase will settle it.
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        if modified != prev_contents.last_write() || metadata.len() != prev_contents.byte_length()
        {
            return false;
        }
        let Some(data) = files.get(new_name) else {
            return false;
        };
        let canonical = memoization.intern(new_name, prev_contents);
        data.swap_contents(Some(canonical));
        true
    }

    /// Reads one file's contents, applying the size and text policies.
    /// `Ok(None)` means the file is indexed by name only.
    fn read_contents(&self, name: &FileName) -> io::Result<Option<FileContents>> {
        let path = name.full_path();
        let metadata = fs::metadata(&path)?;
        if metadata.len() > MAX_INDEXED_FILE_BYTES {
            debug!("{} exceeds the content size cap", path.display());
            return Ok(None);
        }
        let modified = metadata.modified()?;
        let bytes = fs::read(&path)?;
        if !is_searchable_text(&bytes) {
            return Ok(None);
        }
        Ok(Some(FileContents::new(bytes, modified)))
    }
}

impl Default for FileDatabaseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_directory_data(
    dir: &DirectorySnapshot,
    out: &mut FnvHashMap<DirectoryName, DirectoryData>,
) {
    out.insert(
        dir.name.clone(),
        DirectoryData {
            name: dir.name.clone(),
            direct_file_count: dir.files.len(),
        },
    );
    for child in &dir.directories {
        collect_directory_data(child, out);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
