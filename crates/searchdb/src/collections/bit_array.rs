//! Thread-safe growable bit sets.
//!
//! [`ConcurrentBitArray`] guards a vector of 64-bit words with one exclusive
//! lock and grows on demand. [`PartitionedBitArray`] stripes a logical bit
//! space across N independently locked sub-arrays so that, under uniform
//! access, each lock sees roughly `1/N` of the traffic.

use parking_lot::Mutex;

const BITS_PER_WORD: usize = 64;

/// A growable bit set safe for concurrent use.
///
/// `set` grows the backing storage to cover the index; `get` past the
/// current capacity returns false rather than panicking.
#[derive(Debug, Default)]
pub struct ConcurrentBitArray {
    words: Mutex<Vec<u64>>,
}

impl ConcurrentBitArray {
    /// Creates an empty bit array.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bit array pre-sized to cover `bit_capacity` bits.
    pub fn with_capacity(bit_capacity: usize) -> Self {
        Self {
            words: Mutex::new(vec![0; bit_capacity.div_ceil(BITS_PER_WORD)]),
        }
    }

    /// Sets or clears the bit at `index`, growing storage as needed.
    pub fn set(&self, index: usize, value: bool) {
        let word = index / BITS_PER_WORD;
        let mask = 1u64 << (index % BITS_PER_WORD);
        let mut words = self.words.lock();
        if word >= words.len() {
            if !value {
                // Clearing a bit past capacity is a no-op.
                return;
            }
            words.resize(word + 1, 0);
        }
        if value {
            words[word] |= mask;
        } else {
            words[word] &= !mask;
        }
    }

    /// Returns the bit at `index`; indexes past capacity read as false.
    pub fn get(&self, index: usize) -> bool {
        let word = index / BITS_PER_WORD;
        let mask = 1u64 << (index % BITS_PER_WORD);
        let words = self.words.lock();
        words.get(word).is_some_and(|bits| bits & mask != 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        let words = self.words.lock();
        words.iter().map(|bits| bits.count_ones() as usize).sum()
    }
}

// ---------------------------------------------------------------------------
// Partitioned variant
// ---------------------------------------------------------------------------

/// A bit set striped across independently locked partitions.
///
/// A logical index maps to `(index / partition_size, index % partition_size)`;
/// each partition is its own [`ConcurrentBitArray`]. [`count`](Self::count)
/// sums the per-partition counts under their own locks, so under concurrent
/// mutation the total is only eventually consistent — callers must tolerate
/// a momentarily stale sum.
#[derive(Debug)]
pub struct PartitionedBitArray {
    partitions: Vec<ConcurrentBitArray>,
    partition_size: usize,
}

impl PartitionedBitArray {
    /// Creates a bit array covering `total_bits` striped over
    /// `partition_count` partitions.
    ///
    /// # Panics
    /// Panics if `partition_count` is zero.
    pub fn new(partition_count: usize, total_bits: usize) -> Self {
        assert!(partition_count > 0, "partition count must be positive");
        let partition_size = total_bits.div_ceil(partition_count).max(1);
        let partitions = (0..partition_count)
            .map(|_| ConcurrentBitArray::with_capacity(partition_size))
            .collect();
        Self {
            partitions,
            partition_size,
        }
    }

    fn locate(&self, index: usize) -> (usize, usize) {
        let partition = (index / self.partition_size).min(self.partitions.len() - 1);
        (partition, index - partition * self.partition_size)
    }

    /// Sets or clears the bit at logical `index`.
    pub fn set(&self, index: usize, value: bool) {
        let (partition, offset) = self.locate(index);
        self.partitions[partition].set(offset, value);
    }

    /// Returns the bit at logical `index`.
    pub fn get(&self, index: usize) -> bool {
        let (partition, offset) = self.locate(index);
        self.partitions[partition].get(offset)
    }

    /// Total set bits, summed per partition under each partition's own lock.
    pub fn count(&self) -> usize {
        self.partitions.iter().map(ConcurrentBitArray::count).sum()
    }

    /// Number of partitions the bit space is striped over.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
