//! File-system tree snapshots.
//!
//! A [`FileSystemSnapshot`] is the immutable input to a database build: a
//! tree of directory and file identities with per-file last-write
//! timestamps, produced by an external scanner or watcher. [`scan`] is a
//! plain walker for drivers and tests; ignore-pattern filtering and change
//! watching are the caller's concern.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use log::warn;

use crate::error::Result;
use crate::names::{DirectoryName, FileName, NameInterner};

/// One file in a snapshot: interned identity plus the last-write timestamp
/// observed by the scanner.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    pub name: FileName,
    pub last_write: SystemTime,
}

/// One directory in a snapshot, with children sorted by name.
#[derive(Debug)]
pub struct DirectorySnapshot {
    pub name: DirectoryName,
    pub directories: Vec<DirectorySnapshot>,
    pub files: Vec<FileSnapshot>,
}

/// An immutable point-in-time view of a file tree.
#[derive(Debug)]
pub struct FileSystemSnapshot {
    version: u64,
    root: DirectorySnapshot,
}

impl FileSystemSnapshot {
    /// Wraps a scanned tree with its version number. Versions are assigned
    /// by the driver and only need to be monotonic per tree.
    pub fn new(version: u64, root: DirectorySnapshot) -> Self {
        Self { version, root }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn root(&self) -> &DirectorySnapshot {
        &self.root
    }

    /// Flattens the tree into every file it contains.
    pub fn all_files(&self) -> Vec<FileSnapshot> {
        let mut out = Vec::new();
        collect_files(&self.root, &mut out);
        out
    }

    /// Flattens the tree into every directory identity it contains,
    /// including the root.
    pub fn all_directories(&self) -> Vec<DirectoryName> {
        let mut out = Vec::new();
        collect_directories(&self.root, &mut out);
        out
    }
}

fn collect_files(dir: &DirectorySnapshot, out: &mut Vec<FileSnapshot>) {
    out.extend(dir.files.iter().cloned());
    for child in &dir.directories {
        collect_files(child, out);
    }
}

fn collect_directories(dir: &DirectorySnapshot, out: &mut Vec<DirectoryName>) {
    out.push(dir.name.clone());
    for child in &dir.directories {
        collect_directories(child, out);
    }
}

// ---------------------------------------------------------------------------
// Disk scanning
// ---------------------------------------------------------------------------

/// Walks `root_path` into a snapshot, interning every name through
/// `interner`. Entries that cannot be read are logged and skipped.
pub fn scan(root_path: &Path, interner: &NameInterner, version: u64) -> Result<FileSystemSnapshot> {
    let root_name = interner.root(root_path);
    let root = scan_directory(root_path, root_name, interner)?;
    Ok(FileSystemSnapshot::new(version, root))
}

fn scan_directory(
    path: &Path,
    name: DirectoryName,
    interner: &NameInterner,
) -> Result<DirectorySnapshot> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(err) => warn!("skipping unreadable entry under {}: {err}", path.display()),
        }
    }
    // Sorted children keep snapshots deterministic, so consecutive scans of
    // an unchanged tree diff as identical-in-order.
    entries.sort_by_key(|entry| entry.file_name());

    let mut directories = Vec::new();
    let mut files = Vec::new();
    for entry in entries {
        let segment = entry.file_name();
        let segment = segment.to_string_lossy();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                warn!("skipping {}: {err}", entry.path().display());
                continue;
            }
        };
        if file_type.is_dir() {
            let child_name = interner.directory(&name, &segment);
            match scan_directory(&entry.path(), child_name, interner) {
                Ok(child) => directories.push(child),
                Err(err) => warn!("skipping directory {}: {err}", entry.path().display()),
            }
        } else if file_type.is_file() {
            let last_write = entry
                .metadata()
                .and_then(|metadata| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push(FileSnapshot {
                name: interner.file(&name, &segment),
                last_write,
            });
        }
        // Symlinks and special files are not indexed.
    }

    Ok(DirectorySnapshot {
        name,
        directories,
        files,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
