//! File database data structures.
//!
//! A published [`FileDatabaseSnapshot`] is immutable: any number of search
//! threads read it without locking while the next snapshot is built. The
//! one sanctioned exception is the per-file contents field, which is an
//! atomically swappable pointer so the update-changed-files fast path can
//! refresh individual files without rebuilding the snapshot.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use fnv::FnvHashMap;

use crate::contents::{FileContents, PieceRange};
use crate::names::{DirectoryName, FileName};

/// One file in the database: an interned identity plus optionally its
/// indexed contents.
///
/// `contents() == None` means the file exists but is not searchable by
/// content (binary, over the size cap, or unreadable). Readers always
/// observe a fully formed contents reference or none; the swap is atomic.
#[derive(Debug)]
pub struct FileData {
    name: FileName,
    contents: ArcSwapOption<FileContents>,
}

impl FileData {
    pub fn new(name: FileName, contents: Option<Arc<FileContents>>) -> Self {
        Self {
            name,
            contents: ArcSwapOption::new(contents),
        }
    }

    pub fn name(&self) -> &FileName {
        &self.name
    }

    /// Loads the current contents reference, if the file is content-indexed.
    pub fn contents(&self) -> Option<Arc<FileContents>> {
        self.contents.load_full()
    }

    pub fn has_contents(&self) -> bool {
        self.contents.load().is_some()
    }

    /// Atomically replaces the contents reference. Used during the build
    /// and by the update-changed-files fast path.
    pub fn swap_contents(&self, contents: Option<Arc<FileContents>>) {
        self.contents.store(contents);
    }
}

/// Metadata the database keeps per directory.
#[derive(Debug, Clone)]
pub struct DirectoryData {
    pub name: DirectoryName,
    /// Number of files directly inside this directory (not recursive).
    pub direct_file_count: usize,
}

// ---------------------------------------------------------------------------
// Content pieces
// ---------------------------------------------------------------------------

/// A bounded view over one file's contents: the unit of parallel search.
///
/// A piece references the file, not a contents buffer, so a fast-path
/// contents swap is picked up by the next scan. If the swapped-in buffer is
/// shorter than the piece range, the range is clamped; bytes beyond the old
/// ranges of a grown file become searchable on the next full rebuild.
#[derive(Debug, Clone)]
pub struct ContentPiece {
    file: Arc<FileData>,
    range: PieceRange,
}

impl ContentPiece {
    pub fn new(file: Arc<FileData>, range: PieceRange) -> Self {
        Self { file, range }
    }

    pub fn file(&self) -> &Arc<FileData> {
        &self.file
    }

    pub fn range(&self) -> PieceRange {
        self.range
    }

    pub fn byte_length(&self) -> u64 {
        self.range.length
    }

    /// Slices this piece's range out of `contents`, clamped to the buffer.
    pub fn clamped_bytes<'a>(&self, contents: &'a FileContents) -> &'a [u8] {
        let bytes = contents.bytes();
        let start = (self.range.offset as usize).min(bytes.len());
        let end = ((self.range.offset + self.range.length) as usize).min(bytes.len());
        &bytes[start..end]
    }
}

// ---------------------------------------------------------------------------
// Database snapshot
// ---------------------------------------------------------------------------

/// An immutable, queryable snapshot of the indexed tree.
#[derive(Debug, Default)]
pub struct FileDatabaseSnapshot {
    version: u64,
    files: FnvHashMap<FileName, Arc<FileData>>,
    directories: FnvHashMap<DirectoryName, DirectoryData>,
    /// Content pieces grouped into near-equal-byte-weight partitions, each
    /// partition sorted ascending by piece length.
    partitions: Vec<Vec<ContentPiece>>,
    searchable_file_count: usize,
}

impl FileDatabaseSnapshot {
    pub fn new(
        version: u64,
        files: FnvHashMap<FileName, Arc<FileData>>,
        directories: FnvHashMap<DirectoryName, DirectoryData>,
        partitions: Vec<Vec<ContentPiece>>,
        searchable_file_count: usize,
    ) -> Self {
        Self {
            version,
            files,
            directories,
            partitions,
            searchable_file_count,
        }
    }

    /// An empty snapshot, used before the first build completes.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn files(&self) -> &FnvHashMap<FileName, Arc<FileData>> {
        &self.files
    }

    pub fn directories(&self) -> &FnvHashMap<DirectoryName, DirectoryData> {
        &self.directories
    }

    pub fn partitions(&self) -> &[Vec<ContentPiece>] {
        &self.partitions
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of files indexed for content search.
    pub fn searchable_file_count(&self) -> usize {
        self.searchable_file_count
    }

    pub fn file(&self, name: &FileName) -> Option<&Arc<FileData>> {
        self.files.get(name)
    }
}

// ---------------------------------------------------------------------------
// Database holder
// ---------------------------------------------------------------------------

/// Owner of the currently published snapshot.
///
/// Publication is one atomic pointer swap: a search request observes either
/// the fully old or the fully new snapshot, never a partial one. A build
/// may therefore run concurrently with searches against the previous
/// snapshot.
pub struct FileDatabase {
    current: ArcSwap<FileDatabaseSnapshot>,
}

impl FileDatabase {
    /// Creates a database holding an empty snapshot.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(FileDatabaseSnapshot::empty()),
        }
    }

    /// The currently published snapshot.
    pub fn current(&self) -> Arc<FileDatabaseSnapshot> {
        self.current.load_full()
    }

    /// Atomically publishes a new snapshot.
    pub fn publish(&self, snapshot: Arc<FileDatabaseSnapshot>) {
        self.current.store(snapshot);
    }
}

impl Default for FileDatabase {
    fn default() -> Self {
        Self::new()
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
    use std::time::SystemTime;

    fn file_data(bytes: &[u8]) -> Arc<FileData> {
        let interner = NameInterner::new();
        let root = interner.root(Path::new("/r"));
        let name = interner.file(&root, "f.txt");
        let contents = Arc::new(FileContents::new(bytes.to_vec(), SystemTime::UNIX_EPOCH));
        Arc::new(FileData::new(name, Some(contents)))
    }

    #[test]
    fn contents_swap_is_visible() {
        let data = file_data(b"before");
        assert!(data.has_contents());
        data.swap_contents(None);
        assert!(!data.has_contents());

        let replacement = Arc::new(FileContents::new(b"after".to_vec(), SystemTime::UNIX_EPOCH));
        data.swap_contents(Some(Arc::clone(&replacement)));
        let loaded = data.contents().expect("contents present");
        assert!(Arc::ptr_eq(&loaded, &replacement));
    }

    #[test]
    fn piece_clamps_to_shrunk_contents() {
        let data = file_data(b"0123456789");
        let piece = ContentPiece::new(
            Arc::clone(&data),
            PieceRange {
                offset: 5,
                length: 5,
            },
        );
        let full = data.contents().unwrap();
        assert_eq!(piece.clamped_bytes(&full), b"56789");

        // Swap in a shorter buffer: the piece range is clamped, not a panic.
        data.swap_contents(Some(Arc::new(FileContents::new(
            b"0123456".to_vec(),
            SystemTime::UNIX_EPOCH,
        ))));
        let shrunk = data.contents().unwrap();
        assert_eq!(piece.clamped_bytes(&shrunk), b"56");

        data.swap_contents(Some(Arc::new(FileContents::new(
            b"012".to_vec(),
            SystemTime::UNIX_EPOCH,
        ))));
        let tiny = data.contents().unwrap();
        assert_eq!(piece.clamped_bytes(&tiny), b"");
    }

    #[test]
    fn publish_swaps_whole_snapshot() {
        let db = FileDatabase::new();
        let before = db.current();
        assert_eq!(before.file_count(), 0);

        let snapshot = Arc::new(FileDatabaseSnapshot::new(
            7,
            FnvHashMap::default(),
            FnvHashMap::default(),
            Vec::new(),
            0,
        ));
        db.publish(Arc::clone(&snapshot));
        assert_eq!(db.current().version(), 7);
        // The old reference stays valid for in-flight readers.
        assert_eq!(before.version(), 0);
    }
}
