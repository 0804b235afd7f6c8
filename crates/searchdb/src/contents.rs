//! Immutable file contents and piece ranges.
//!
//! A [`FileContents`] is a read-once byte buffer plus the last-write
//! timestamp it was read at. Buffers never change after construction; a
//! refreshed file gets a new `FileContents` instance.
//!
//! ## Same-contents policy
//!
//! Two buffers count as "same contents" when their byte length and
//! last-write timestamp match; bytes are never re-compared. This is a
//! deliberate performance tradeoff inherited by the memoization map and the
//! incremental-reuse path: a file rewritten with identical length within the
//! file system's timestamp granularity will be treated as unchanged. Do not
//! strengthen this to byte comparison without accepting the re-read cost.

use std::time::SystemTime;

/// Upper bound on one searchable piece. Large files split into multiple
/// pieces so they can be scanned in parallel and abandoned early.
pub const MAX_PIECE_BYTES: u64 = 100 * 1024;

/// Files larger than this are indexed by name only.
pub const MAX_INDEXED_FILE_BYTES: u64 = 8 * 1024 * 1024;

/// How many leading bytes the text sniffer inspects.
const SNIFF_BYTES: usize = 8 * 1024;

/// An immutable byte buffer read from one file at one point in time.
#[derive(Debug)]
pub struct FileContents {
    bytes: Vec<u8>,
    last_write: SystemTime,
}

impl FileContents {
    pub fn new(bytes: Vec<u8>, last_write: SystemTime) -> Self {
        Self { bytes, last_write }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_length(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn last_write(&self) -> SystemTime {
        self.last_write
    }

    /// Cheap equality used for cache hits: byte length and timestamp only
    /// (see the module docs for why bytes are not compared).
    pub fn same_contents(&self, other: &FileContents) -> bool {
        self.byte_length() == other.byte_length() && self.last_write == other.last_write
    }
}

// ---------------------------------------------------------------------------
// Piece ranges
// ---------------------------------------------------------------------------

/// A half-open byte range of one piece within a contents buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceRange {
    pub offset: u64,
    pub length: u64,
}

/// Splits a buffer of `byte_length` bytes into piece ranges of at most
/// [`MAX_PIECE_BYTES`] each.
///
/// The ranges are contiguous, non-overlapping, and sum to `byte_length`;
/// an empty buffer yields no pieces.
pub fn split_piece_ranges(byte_length: u64) -> Vec<PieceRange> {
    let mut ranges = Vec::with_capacity(byte_length.div_ceil(MAX_PIECE_BYTES) as usize);
    let mut offset = 0;
    while offset < byte_length {
        let length = MAX_PIECE_BYTES.min(byte_length - offset);
        ranges.push(PieceRange { offset, length });
        offset += length;
    }
    ranges
}

// ---------------------------------------------------------------------------
// Text detection
// ---------------------------------------------------------------------------

/// Returns true if the buffer looks like searchable text.
///
/// A NUL byte in the sniffed prefix marks the file as binary; everything
/// else is accepted, since source trees carry many encodings and the search
/// layer operates on raw bytes.
pub fn is_searchable_text(bytes: &[u8]) -> bool {
    let prefix = &bytes[..bytes.len().min(SNIFF_BYTES)];
    !prefix.contains(&0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn contents(bytes: &[u8], seconds: u64) -> FileContents {
        FileContents::new(
            bytes.to_vec(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(seconds),
        )
    }

    #[test]
    fn same_contents_ignores_bytes() {
        let a = contents(b"aaaa", 100);
        let b = contents(b"bbbb", 100);
        let c = contents(b"aaaa", 101);
        let d = contents(b"aaa", 100);
        // Equal length + timestamp: same, even though bytes differ.
        assert!(a.same_contents(&b));
        assert!(!a.same_contents(&c));
        assert!(!a.same_contents(&d));
    }

    #[test]
    fn piece_ranges_cover_exactly() {
        for byte_length in [
            0,
            1,
            MAX_PIECE_BYTES - 1,
            MAX_PIECE_BYTES,
            MAX_PIECE_BYTES + 1,
            3 * MAX_PIECE_BYTES + 17,
        ] {
            let ranges = split_piece_ranges(byte_length);
            let total: u64 = ranges.iter().map(|range| range.length).sum();
            assert_eq!(total, byte_length, "length {byte_length}");

            let mut expected_offset = 0;
            for range in &ranges {
                assert_eq!(range.offset, expected_offset, "length {byte_length}");
                assert!(range.length > 0 && range.length <= MAX_PIECE_BYTES);
                expected_offset += range.length;
            }
        }
    }

    #[test]
    fn empty_buffer_has_no_pieces() {
        assert!(split_piece_ranges(0).is_empty());
    }

    #[test]
    fn text_sniffing() {
        assert!(is_searchable_text(b"fn main() {}\n"));
        assert!(is_searchable_text(b""));
        assert!(is_searchable_text("héllo wörld".as_bytes()));
        assert!(!is_searchable_text(b"\x7fELF\x00\x01\x02"));
    }
}
