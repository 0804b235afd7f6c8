//! Concurrent collection primitives the database is built on.
//!
//! - `hash_table` - open-addressing hash table with overflow chaining and a
//!   freelist, plus a lock-wrapped concurrent set
//! - `bit_array` - growable concurrent bit set and its lock-striped variant
//! - `diff` - left-only / right-only / common partitioning of unordered
//!   collections

mod bit_array;
mod diff;
mod hash_table;

pub use bit_array::{ConcurrentBitArray, PartitionedBitArray};
pub use diff::{build_diff, ArrayDiff};
pub use hash_table::{ConcurrentHashSet, SlimHashTable};
