//! Query surface over a published database snapshot.
//!
//! All three entry points run against an immutable
//! [`FileDatabaseSnapshot`], so they are safe to call from any number of
//! threads while the next snapshot builds. Content search fans out across
//! the snapshot's pre-balanced partitions; name searches walk the interned
//! name maps with sparse cancellation checks.
//!
//! Callers pass the shared [`SearchProgress`] for this request, normally
//! created with the same cap as `max_results`: the tracker is what lets one
//! partition's hits stop the other partitions' scanning early.

use fnv::FnvHashMap;
use rayon::prelude::*;

use crate::database::FileDatabaseSnapshot;
use crate::error::Result;
use crate::names::{DirectoryName, FileName};
use crate::progress::SearchProgress;
use crate::search::pattern::{compile_pattern, CompiledTextSearch, SearchOptions, TextRange};
use crate::search::scan::{find_all, find_first};

/// Result of a file- or directory-name search.
#[derive(Debug, Clone)]
pub struct NameSearchResults<N> {
    /// Matching names, sorted by relative path.
    pub names: Vec<N>,
    /// True when the result set was cut off by the cap or by cancellation.
    pub truncated: bool,
}

impl<N> Default for NameSearchResults<N> {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            truncated: false,
        }
    }
}

/// Match spans within one file, offsets relative to the file's contents.
#[derive(Debug, Clone)]
pub struct FileContentsMatches {
    pub file: FileName,
    /// Ascending, non-overlapping spans.
    pub spans: Vec<TextRange>,
}

/// Result of a content search.
#[derive(Debug, Clone, Default)]
pub struct ContentSearchResults {
    /// Per-file matches, sorted by relative path.
    pub files: Vec<FileContentsMatches>,
    /// Total spans across all files.
    pub match_count: usize,
    /// True when the result set was cut off by the cap or by cancellation.
    pub truncated: bool,
}

/// Searches file names (relative paths) for `pattern`.
///
/// The pattern is case-insensitive and may contain `*`/`?` wildcards.
pub fn search_file_names(
    snapshot: &FileDatabaseSnapshot,
    pattern: &str,
    max_results: usize,
    progress: &SearchProgress,
) -> Result<NameSearchResults<FileName>> {
    if pattern.is_empty() || max_results == 0 {
        return Ok(NameSearchResults::default());
    }
    let compiled = compile_pattern(pattern, SearchOptions::default())?;
    Ok(filter_names(
        snapshot.files().keys().cloned(),
        |name| name.relative_path(),
        &*compiled,
        max_results,
        progress,
    ))
}

/// Searches directory names (relative paths) for `pattern`.
pub fn search_directory_names(
    snapshot: &FileDatabaseSnapshot,
    pattern: &str,
    max_results: usize,
    progress: &SearchProgress,
) -> Result<NameSearchResults<DirectoryName>> {
    if pattern.is_empty() || max_results == 0 {
        return Ok(NameSearchResults::default());
    }
    let compiled = compile_pattern(pattern, SearchOptions::default())?;
    Ok(filter_names(
        snapshot.directories().keys().cloned(),
        |name| name.relative_path(),
        &*compiled,
        max_results,
        progress,
    ))
}

fn filter_names<N>(
    names: impl Iterator<Item = N>,
    relative_path: impl Fn(&N) -> String,
    compiled: &dyn CompiledTextSearch,
    max_results: usize,
    progress: &SearchProgress,
) -> NameSearchResults<N> {
    let mut matched: Vec<(String, N)> = Vec::new();
    let mut cancelled = false;
    for (index, name) in names.enumerate() {
        if progress.should_end_sparse(index) {
            cancelled = true;
            break;
        }
        let path = relative_path(&name);
        if find_first(path.as_bytes(), compiled).is_some() {
            matched.push((path, name));
        }
    }
    matched.sort_by(|a, b| a.0.cmp(&b.0));
    let truncated = cancelled || matched.len() > max_results;
    matched.truncate(max_results);
    NameSearchResults {
        names: matched.into_iter().map(|(_, name)| name).collect(),
        truncated,
    }
}

/// Searches indexed file contents for `pattern` under `options`.
///
/// Partitions are scanned in parallel; within each partition, pieces are
/// visited smallest-first so a hit cap is satisfied before large files are
/// touched. Spans are reported in file-absolute offsets, ascending per
/// file; the per-file groups are sorted by relative path (order across
/// partitions is otherwise unspecified).
pub fn search_file_contents(
    snapshot: &FileDatabaseSnapshot,
    pattern: &str,
    options: SearchOptions,
    max_results: usize,
    progress: &SearchProgress,
) -> Result<ContentSearchResults> {
    if pattern.is_empty() || max_results == 0 {
        return Ok(ContentSearchResults::default());
    }
    let compiled = compile_pattern(pattern, options)?;
    let compiled = &*compiled;

    let per_partition: Vec<(Vec<(FileName, Vec<TextRange>)>, bool)> = snapshot
        .partitions()
        .par_iter()
        .map(|partition| {
            let mut found = Vec::new();
            let mut stopped_early = false;
            for piece in partition {
                if progress.should_end() {
                    stopped_early = true;
                    break;
                }
                let Some(contents) = piece.file().contents() else {
                    continue;
                };
                let bytes = piece.clamped_bytes(&contents);
                let (spans, hit_cap) = find_all(bytes, compiled, progress, max_results);
                stopped_early |= hit_cap;
                if spans.is_empty() {
                    continue;
                }
                let base = piece.range().offset as usize;
                let absolute = spans
                    .into_iter()
                    .map(|span| TextRange {
                        offset: base + span.offset,
                        length: span.length,
                    })
                    .collect();
                found.push((piece.file().name().clone(), absolute));
            }
            (found, stopped_early)
        })
        .collect();

    // Merge per-piece groups: a large file contributes spans from several
    // pieces, possibly in different partitions.
    let mut by_file: FnvHashMap<FileName, Vec<TextRange>> = FnvHashMap::default();
    let mut total = 0;
    let mut stopped_early = false;
    for (group, stopped) in per_partition {
        stopped_early |= stopped;
        for (name, spans) in group {
            total += spans.len();
            by_file.entry(name).or_default().extend(spans);
        }
    }

    let mut files: Vec<FileContentsMatches> = by_file
        .into_iter()
        .map(|(file, mut spans)| {
            spans.sort();
            FileContentsMatches { file, spans }
        })
        .collect();
    files.sort_by_key(|matches| matches.file.relative_path());

    // Parallel partitions can overshoot the cap slightly; trim to it. Any
    // scan that stopped before its buffer's end means matches were left
    // uncollected, so the cap being hit always reads as truncation.
    let truncated = stopped_early || progress.should_end() || total > max_results;
    if total > max_results {
        let mut remaining = max_results;
        files.retain_mut(|matches| {
            if remaining == 0 {
                return false;
            }
            if matches.spans.len() > remaining {
                matches.spans.truncate(remaining);
            }
            remaining -= matches.spans.len();
            true
        });
    }
    let match_count = files.iter().map(|matches| matches.spans.len()).sum();

    Ok(ContentSearchResults {
        files,
        match_count,
        truncated,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contents::{split_piece_ranges, FileContents};
    use crate::database::{partition_by_weight, ContentPiece, DirectoryData, FileData};
    use crate::names::NameInterner;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::SystemTime;

    /// Builds an in-memory snapshot straight from (path, contents) pairs,
    /// bypassing disk.
    fn snapshot_of(entries: &[(&str, Option<&[u8]>)]) -> FileDatabaseSnapshot {
        let interner = NameInterner::new();
        let root = interner.root(Path::new("/mem"));
        let mut files = FnvHashMap::default();
        let mut directories = FnvHashMap::default();
        directories.insert(
            root.clone(),
            DirectoryData {
                name: root.clone(),
                direct_file_count: entries.len(),
            },
        );

        let mut pieces = Vec::new();
        let mut searchable = 0;
        for (path, bytes) in entries {
            let mut parent = root.clone();
            let mut segments: Vec<&str> = path.split('/').collect();
            let leaf = segments.pop().expect("leaf segment");
            for segment in segments {
                parent = interner.directory(&parent, segment);
                directories.entry(parent.clone()).or_insert(DirectoryData {
                    name: parent.clone(),
                    direct_file_count: 0,
                });
            }
            let name = interner.file(&parent, leaf);
            let contents = bytes.map(|bytes| {
                Arc::new(FileContents::new(bytes.to_vec(), SystemTime::UNIX_EPOCH))
            });
            let data = Arc::new(FileData::new(name.clone(), contents.clone()));
            if let Some(contents) = contents {
                searchable += 1;
                for range in split_piece_ranges(contents.byte_length()) {
                    pieces.push(ContentPiece::new(Arc::clone(&data), range));
                }
            }
            files.insert(name, data);
        }
        let partitions = partition_by_weight(pieces, 2, ContentPiece::byte_length);
        FileDatabaseSnapshot::new(1, files, directories, partitions, searchable)
    }

    #[test]
    fn contents_search_reports_absolute_spans() {
        let snapshot = snapshot_of(&[
            ("a.txt", Some(b"hello world")),
            ("b.txt", Some(b"say hello there")),
        ]);
        let progress = SearchProgress::new(10);
        let results =
            search_file_contents(&snapshot, "hello", SearchOptions::default(), 10, &progress)
                .expect("search");

        assert_eq!(results.files.len(), 2);
        assert!(!results.truncated);
        assert_eq!(results.match_count, 2);
        assert_eq!(results.files[0].file.name(), "a.txt");
        assert_eq!(results.files[0].spans, vec![TextRange { offset: 0, length: 5 }]);
        assert_eq!(results.files[1].spans, vec![TextRange { offset: 4, length: 5 }]);
    }

    #[test]
    fn content_cap_truncates_and_flags() {
        let snapshot = snapshot_of(&[("many.txt", Some(b"x x x x x x x x"))]);
        let progress = SearchProgress::new(3);
        let results =
            search_file_contents(&snapshot, "x", SearchOptions::default(), 3, &progress)
                .expect("search");
        assert_eq!(results.match_count, 3);
        assert!(results.truncated);
        let spans = &results.files[0].spans;
        assert!(spans.windows(2).all(|pair| pair[0].offset < pair[1].offset));
    }

    #[test]
    fn cap_hit_flags_truncation_without_tracker_cap() {
        // The tracker cap and max_results are independent; hitting
        // max_results alone must still read as truncated.
        let snapshot = snapshot_of(&[("five.txt", Some(b"x x x x x"))]);
        let progress = SearchProgress::unbounded();
        let results =
            search_file_contents(&snapshot, "x", SearchOptions::default(), 3, &progress)
                .expect("search");
        assert_eq!(results.match_count, 3);
        assert!(results.truncated);
    }

    #[test]
    fn name_only_files_are_skipped_by_content_search() {
        let snapshot = snapshot_of(&[
            ("binary.bin", None),
            ("text.txt", Some(b"binary is a word here")),
        ]);
        let progress = SearchProgress::new(10);
        let results =
            search_file_contents(&snapshot, "binary", SearchOptions::default(), 10, &progress)
                .expect("search");
        assert_eq!(results.files.len(), 1);
        assert_eq!(results.files[0].file.name(), "text.txt");
    }

    #[test]
    fn file_name_search_matches_relative_paths() {
        let snapshot = snapshot_of(&[
            ("src/lib.rs", Some(b"")),
            ("src/main.rs", Some(b"")),
            ("tests/lib.rs", Some(b"")),
        ]);
        let progress = SearchProgress::unbounded();

        let results =
            search_file_names(&snapshot, "lib.rs", 10, &progress).expect("search");
        assert_eq!(results.names.len(), 2);
        assert_eq!(results.names[0].relative_path(), "src/lib.rs");
        assert_eq!(results.names[1].relative_path(), "tests/lib.rs");

        let results = search_file_names(&snapshot, "src/*.rs", 10, &progress).expect("search");
        assert_eq!(results.names.len(), 2);

        let results = search_file_names(&snapshot, "lib.rs", 1, &progress).expect("search");
        assert_eq!(results.names.len(), 1);
        assert!(results.truncated);
    }

    #[test]
    fn directory_name_search() {
        let snapshot = snapshot_of(&[("src/inner/lib.rs", Some(b"")), ("docs/readme.md", None)]);
        let progress = SearchProgress::unbounded();
        let results =
            search_directory_names(&snapshot, "inner", 10, &progress).expect("search");
        assert_eq!(results.names.len(), 1);
        assert_eq!(results.names[0].relative_path(), "src/inner");
    }

    #[test]
    fn empty_pattern_yields_empty_results() {
        let snapshot = snapshot_of(&[("a.txt", Some(b"anything"))]);
        let progress = SearchProgress::unbounded();
        let results =
            search_file_contents(&snapshot, "", SearchOptions::default(), 10, &progress)
                .expect("search");
        assert!(results.files.is_empty() && !results.truncated);
        let results = search_file_names(&snapshot, "", 10, &progress).expect("search");
        assert!(results.names.is_empty());
    }

    #[test]
    fn scanned_tree_end_to_end() {
        use crate::database::FileDatabaseBuilder;
        use crate::progress::BuildProgress;
        use crate::snapshot::scan;
        use std::fs;

        let _ = env_logger::builder().is_test(true).try_init();

        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), b"hello world").unwrap();
        fs::write(dir.path().join("b.txt"), b"hello there").unwrap();

        let interner = NameInterner::new();
        let tree = scan(dir.path(), &interner, 1).expect("scan");
        let builder = FileDatabaseBuilder::new();
        let snapshot =
            builder.build(&FileDatabaseSnapshot::empty(), &tree, &BuildProgress::new());

        let progress = SearchProgress::new(10);
        let results =
            search_file_contents(&snapshot, "hello", SearchOptions::default(), 10, &progress)
                .expect("search");
        assert_eq!(results.files.len(), 2);
        assert_eq!(results.match_count, 2);
        for matches in &results.files {
            assert_eq!(matches.spans, vec![TextRange { offset: 0, length: 5 }]);
        }

        // Rewrite one file; after an incremental rebuild the other file's
        // contents must be carried over by reference, not re-read.
        fs::write(dir.path().join("b.txt"), b"goodbye there").unwrap();
        let tree = scan(dir.path(), &interner, 2).expect("scan");
        let rebuilt = builder.build(&snapshot, &tree, &BuildProgress::new());

        let name_a = interner.file(&interner.root(dir.path()), "a.txt");
        let before = snapshot.file(&name_a).unwrap().contents().unwrap();
        let after = rebuilt.file(&name_a).unwrap().contents().unwrap();
        assert!(Arc::ptr_eq(&before, &after));

        let progress = SearchProgress::new(10);
        let results =
            search_file_contents(&rebuilt, "goodbye", SearchOptions::default(), 10, &progress)
                .expect("search");
        assert_eq!(results.files.len(), 1);
        assert_eq!(results.files[0].file.name(), "b.txt");
    }

    #[test]
    fn pattern_error_surfaces_before_scanning() {
        let snapshot = snapshot_of(&[("a.txt", Some(b"text"))]);
        let progress = SearchProgress::unbounded();
        let options = SearchOptions {
            use_regex: true,
            ..Default::default()
        };
        let result = search_file_contents(&snapshot, "(unclosed", options, 10, &progress);
        assert!(result.is_err());
        assert_eq!(progress.results_found(), 0);
    }
}
