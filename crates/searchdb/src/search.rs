//! Text search over a database snapshot.
//!
//! Three layers:
//!
//! - [`pattern`]: compiles a user pattern (plain text, wildcards, or regex)
//!   into a [`CompiledTextSearch`] strategy
//! - [`scan`]: runs a compiled search over one byte slice with a shared hit
//!   cap and cancellation
//! - [`query`]: the snapshot-level entry points for file-name,
//!   directory-name, and file-contents search

pub mod pattern;
pub mod query;
pub mod scan;

pub use pattern::{compile_pattern, CompiledTextSearch, SearchOptions, TextRange};
pub use query::{
    search_directory_names, search_file_contents, search_file_names, ContentSearchResults,
    FileContentsMatches, NameSearchResults,
};
pub use scan::{find_all, find_first};
