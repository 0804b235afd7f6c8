//! Interned hierarchical file and directory identities.
//!
//! A [`FileName`] or [`DirectoryName`] is a directory chain plus a leaf
//! segment with value equality and a precomputed stable hash. Identities are
//! interned through a [`NameInterner`] so the same path is shared by
//! reference across snapshots: the same logical path recurs in every
//! snapshot of a tree, and interning keeps one instance alive for all of
//! them. Names are never mutated after creation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fnv::FnvHasher;

use crate::collections::ConcurrentHashSet;

/// Shared node of a name chain: an optional parent directory plus one path
/// segment. The hash covers the whole chain and is computed once.
struct NameNode {
    parent: Option<DirectoryName>,
    segment: Arc<str>,
    hash: u64,
}

impl NameNode {
    fn new(parent: Option<DirectoryName>, segment: Arc<str>) -> Self {
        let mut hasher = FnvHasher::default();
        hasher.write_u64(parent.as_ref().map_or(0, |p| p.hash()));
        hasher.write(segment.as_bytes());
        let hash = hasher.finish();
        Self {
            parent,
            segment,
            hash,
        }
    }

    fn chain_eq(&self, other: &NameNode) -> bool {
        if self.hash != other.hash || self.segment != other.segment {
            return false;
        }
        match (&self.parent, &other.parent) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn push_path(&self, out: &mut PathBuf) {
        if let Some(parent) = &self.parent {
            parent.0.push_path(out);
        }
        out.push(&*self.segment);
    }
}

macro_rules! name_type {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone)]
        pub struct $name(Arc<NameNode>);

        impl $name {
            /// Leaf segment of this name.
            pub fn name(&self) -> &str {
                &self.0.segment
            }

            /// Parent directory, if this is not a root.
            pub fn parent(&self) -> Option<&DirectoryName> {
                self.0.parent.as_ref()
            }

            /// Precomputed hash over the whole directory chain.
            pub fn hash(&self) -> u64 {
                self.0.hash
            }

            /// Reconstructs the full path by walking the chain.
            pub fn full_path(&self) -> PathBuf {
                let mut out = PathBuf::new();
                self.0.push_path(&mut out);
                out
            }

            /// Slash-separated path relative to the scan root (whose segment
            /// holds the absolute root path and is excluded). Empty for the
            /// root itself.
            pub fn relative_path(&self) -> String {
                let mut segments: Vec<&str> = Vec::new();
                let mut node = &self.0;
                while let Some(parent) = &node.parent {
                    segments.push(&node.segment);
                    node = &parent.0;
                }
                segments.reverse();
                segments.join("/")
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0) || self.0.chain_eq(&other.0)
            }
        }

        impl Eq for $name {}

        impl Hash for $name {
            fn hash<H: Hasher>(&self, state: &mut H) {
                state.write_u64(self.0.hash);
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.full_path().display())
            }
        }
    };
}

name_type!(
    DirectoryName,
    "Interned identity of a directory: chain of segments from the scan root."
);
name_type!(
    FileName,
    "Interned identity of a file: directory chain plus leaf file name."
);

// ---------------------------------------------------------------------------
// Interner
// ---------------------------------------------------------------------------

/// Deduplicating store of name identities.
///
/// Construction goes through `get_or_add` on a [`ConcurrentHashSet`], so
/// equal names from different snapshots collapse to one shared instance.
/// The interner is intended to live for the process lifetime.
#[derive(Default)]
pub struct NameInterner {
    directories: ConcurrentHashSet<DirectoryName>,
    files: ConcurrentHashSet<FileName>,
}

impl NameInterner {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns the root directory of a tree. The root segment carries the
    /// absolute path of the scanned directory.
    pub fn root(&self, path: &Path) -> DirectoryName {
        let segment: Arc<str> = path.to_string_lossy().into_owned().into();
        self.directories
            .get_or_add(DirectoryName(Arc::new(NameNode::new(None, segment))))
    }

    /// Interns a child directory of `parent`.
    pub fn directory(&self, parent: &DirectoryName, segment: &str) -> DirectoryName {
        let node = NameNode::new(Some(parent.clone()), segment.into());
        self.directories.get_or_add(DirectoryName(Arc::new(node)))
    }

    /// Interns a file under `parent`.
    pub fn file(&self, parent: &DirectoryName, segment: &str) -> FileName {
        let node = NameNode::new(Some(parent.clone()), segment.into());
        self.files.get_or_add(FileName(Arc::new(node)))
    }

    /// Number of distinct directory identities interned.
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    /// Number of distinct file identities interned.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
