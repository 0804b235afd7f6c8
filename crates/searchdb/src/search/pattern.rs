//! Compiled search patterns.
//!
//! A pattern compiles once, before any scanning, into a
//! [`CompiledTextSearch`]: substring patterns use a `memchr` finder,
//! wildcard and regex patterns compile through `regex::bytes`, and
//! whole-word matching wraps any of them with a boundary check. A malformed
//! pattern fails here with a structured error; scanning itself never fails.

use memchr::memmem;
use regex::bytes::{Regex, RegexBuilder};

use crate::error::{Result, SearchDbError};

/// Options controlling how a pattern is compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Case-sensitive matching. Off by default.
    pub match_case: bool,
    /// Interpret the pattern as a regular expression.
    pub use_regex: bool,
    /// Only accept matches bounded by non-word bytes.
    pub whole_word: bool,
}

/// A match span, relative to the scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextRange {
    pub offset: usize,
    pub length: usize,
}

impl TextRange {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// A pattern ready for repeated matching against byte buffers.
///
/// Implementations are pure over immutable bytes: `find_next` is
/// deterministic and never fails. The search loop calls [`cancel`]
/// (Self::cancel) when it stops early so implementations holding scan state
/// can release it; the built-in implementations hold none.
pub trait CompiledTextSearch: Send + Sync {
    /// Finds the first match starting at or after `start`, in ascending
    /// offset order across successive calls.
    fn find_next(&self, text: &[u8], start: usize) -> Option<TextRange>;

    /// Hook invoked on early termination of a scan.
    fn cancel(&self) {}
}

/// Compiles `pattern` under `options`.
///
/// Non-regex patterns containing `*` or `?` are treated as wildcards.
/// Errors: [`SearchDbError::InvalidInput`] for an empty pattern,
/// [`SearchDbError::PatternSyntax`] for a malformed regex.
pub fn compile_pattern(pattern: &str, options: SearchOptions) -> Result<Box<dyn CompiledTextSearch>> {
    if pattern.is_empty() {
        return Err(SearchDbError::InvalidInput("empty search pattern".into()));
    }

    let inner: Box<dyn CompiledTextSearch> = if options.use_regex {
        Box::new(RegexSearch::compile(pattern, options.match_case)?)
    } else if pattern.contains('*') || pattern.contains('?') {
        let translated = wildcard_to_regex(pattern);
        Box::new(RegexSearch::compile(&translated, options.match_case)?)
    } else if options.match_case {
        Box::new(SubstringSearch::new(pattern))
    } else {
        // Case folding through the regex engine keeps the haystack
        // untouched; escaping makes the pattern literal.
        Box::new(RegexSearch::compile(&regex::escape(pattern), false)?)
    };

    Ok(if options.whole_word {
        Box::new(WholeWordSearch { inner })
    } else {
        inner
    })
}

/// Translates `*`/`?` wildcards into an anchored-nowhere regex.
fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Substring search
// ---------------------------------------------------------------------------

/// Case-sensitive substring matching over raw bytes.
struct SubstringSearch {
    finder: memmem::Finder<'static>,
    needle_length: usize,
}

impl SubstringSearch {
    fn new(needle: &str) -> Self {
        Self {
            finder: memmem::Finder::new(needle.as_bytes()).into_owned(),
            needle_length: needle.len(),
        }
    }
}

impl CompiledTextSearch for SubstringSearch {
    fn find_next(&self, text: &[u8], start: usize) -> Option<TextRange> {
        if start > text.len() {
            return None;
        }
        self.finder.find(&text[start..]).map(|position| TextRange {
            offset: start + position,
            length: self.needle_length,
        })
    }
}

// ---------------------------------------------------------------------------
// Regex search
// ---------------------------------------------------------------------------

/// Regex matching over raw bytes; also backs wildcard and case-insensitive
/// literal patterns.
struct RegexSearch {
    regex: Regex,
}

impl RegexSearch {
    fn compile(pattern: &str, match_case: bool) -> Result<Self> {
        // ASCII patterns take the cheaper byte-oriented mode; non-ASCII
        // patterns need unicode mode, without which case-insensitive
        // matching of non-ASCII characters refuses to compile.
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!match_case)
            .unicode(!pattern.is_ascii())
            .build()
            .map_err(|err| SearchDbError::PatternSyntax(err.to_string()))?;
        Ok(Self { regex })
    }
}

impl CompiledTextSearch for RegexSearch {
    fn find_next(&self, text: &[u8], start: usize) -> Option<TextRange> {
        if start > text.len() {
            return None;
        }
        self.regex.find_at(text, start).map(|found| TextRange {
            offset: found.start(),
            length: found.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Whole-word decorator
// ---------------------------------------------------------------------------

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Filters an inner pattern's matches down to those bounded by non-word
/// bytes (or the buffer edges).
struct WholeWordSearch {
    inner: Box<dyn CompiledTextSearch>,
}

impl CompiledTextSearch for WholeWordSearch {
    fn find_next(&self, text: &[u8], start: usize) -> Option<TextRange> {
        let mut cursor = start;
        loop {
            let found = self.inner.find_next(text, cursor)?;
            let left_ok = found.offset == 0 || !is_word_byte(text[found.offset - 1]);
            let right_ok = found.end() >= text.len() || !is_word_byte(text[found.end()]);
            if left_ok && right_ok {
                return Some(found);
            }
            cursor = found.offset + 1;
        }
    }

    fn cancel(&self) {
        self.inner.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(pattern: &str, options: SearchOptions) -> Box<dyn CompiledTextSearch> {
        compile_pattern(pattern, options).expect("pattern should compile")
    }

    #[test]
    fn substring_case_sensitive() {
        let search = compile(
            "world",
            SearchOptions {
                match_case: true,
                ..Default::default()
            },
        );
        let text = b"hello world, World";
        let found = search.find_next(text, 0).unwrap();
        assert_eq!((found.offset, found.length), (6, 5));
        assert!(search.find_next(text, found.end()).is_none());
    }

    #[test]
    fn substring_case_insensitive_by_default() {
        let search = compile("world", SearchOptions::default());
        let text = b"hello World and WORLD";
        let first = search.find_next(text, 0).unwrap();
        assert_eq!(first.offset, 6);
        let second = search.find_next(text, first.end()).unwrap();
        assert_eq!(second.offset, 16);
    }

    #[test]
    fn regex_pattern() {
        let search = compile(
            r"fn \w+",
            SearchOptions {
                use_regex: true,
                match_case: true,
                ..Default::default()
            },
        );
        let text = b"pub fn main() { fn_ptr(); }";
        let found = search.find_next(text, 0).unwrap();
        assert_eq!(&text[found.offset..found.end()], b"fn main");
    }

    #[test]
    fn malformed_regex_fails_at_compile_time() {
        let result = compile_pattern(
            "[unclosed",
            SearchOptions {
                use_regex: true,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(SearchDbError::PatternSyntax(_))));
    }

    #[test]
    fn empty_pattern_rejected() {
        let result = compile_pattern("", SearchOptions::default());
        assert!(matches!(result, Err(SearchDbError::InvalidInput(_))));
    }

    #[test]
    fn non_ascii_literal_case_insensitive() {
        let search = compile("héllo", SearchOptions::default());
        let text = "say Héllo there".as_bytes();
        let found = search.find_next(text, 0).unwrap();
        assert_eq!(&text[found.offset..found.end()], "Héllo".as_bytes());

        let search = compile(
            "héllo",
            SearchOptions {
                match_case: true,
                ..Default::default()
            },
        );
        assert!(search.find_next(text, 0).is_none());
        assert!(search.find_next("say héllo".as_bytes(), 0).is_some());
    }

    #[test]
    fn wildcard_translation() {
        let search = compile("foo*bar", SearchOptions::default());
        let text = b"xx foo_anything_bar yy";
        let found = search.find_next(text, 0).unwrap();
        assert_eq!(&text[found.offset..found.end()], b"foo_anything_bar");

        let search = compile("f?o", SearchOptions { match_case: true, ..Default::default() });
        assert!(search.find_next(b"fio", 0).is_some());
        assert!(search.find_next(b"fo", 0).is_none());
    }

    #[test]
    fn whole_word_boundaries() {
        let search = compile(
            "cat",
            SearchOptions {
                match_case: true,
                whole_word: true,
                ..Default::default()
            },
        );
        let text = b"concatenate cat catalog (cat)";
        let first = search.find_next(text, 0).unwrap();
        assert_eq!(first.offset, 12);
        let second = search.find_next(text, first.end()).unwrap();
        assert_eq!(second.offset, 25);
        assert!(search.find_next(text, second.end()).is_none());
    }

    #[test]
    fn whole_word_at_buffer_edges() {
        let search = compile(
            "edge",
            SearchOptions {
                whole_word: true,
                ..Default::default()
            },
        );
        assert_eq!(search.find_next(b"edge", 0).unwrap().offset, 0);
        assert_eq!(search.find_next(b"the edge", 0).unwrap().offset, 4);
    }

    #[test]
    fn find_next_past_end_is_none() {
        let search = compile("x", SearchOptions::default());
        assert!(search.find_next(b"x", 1).is_none());
        assert!(search.find_next(b"x", 2).is_none());
    }
}
