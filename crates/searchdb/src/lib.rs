//! In-process search index over large file trees.
//!
//! The crate builds an immutable [`FileDatabaseSnapshot`] from a scanned
//! tree and answers name and content queries against it:
//!
//! - [`names`]: interned, parent-linked path names shared across snapshots
//! - [`snapshot`]: filesystem scanning into a versioned tree snapshot
//! - [`contents`]: file contents, text sniffing, and piece splitting
//! - [`memoize`]: content deduplication across identical files
//! - [`collections`]: the compact hash table, concurrent bit arrays, and
//!   array diffing the builder is made of
//! - [`database`]: the incremental snapshot builder and published database
//! - [`search`]: pattern compilation and parallel query execution
//! - [`progress`]: cooperative cancellation and progress counters
//!
//! A typical cycle: scan the tree, diff it against the previous snapshot,
//! transfer unchanged contents by reference, read only what changed, then
//! publish the new snapshot with one atomic swap while searches keep
//! running against the old one.

pub mod collections;
pub mod contents;
pub mod database;
pub mod error;
pub mod memoize;
pub mod names;
pub mod progress;
pub mod search;
pub mod snapshot;

pub use contents::FileContents;
pub use database::{FileDatabase, FileDatabaseBuilder, FileDatabaseSnapshot};
pub use error::{Result, SearchDbError};
pub use memoize::ContentsMemoization;
pub use names::{DirectoryName, FileName, NameInterner};
pub use progress::{BuildProgress, SearchProgress};
pub use search::{
    search_directory_names, search_file_contents, search_file_names, SearchOptions,
};
pub use snapshot::{scan, FileSystemSnapshot};
