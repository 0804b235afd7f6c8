//! Byte-weight-balanced partitioning of search work.
//!
//! Pieces are distributed over P partitions so that each partition carries
//! as close to an equal total byte weight as possible, not merely an equal
//! piece count; one oversized file must not serialize a whole partition's
//! worth of scanning behind it.

/// Distributes `items` across `partition_count` bins by greedy running-total
/// weight, then sorts each bin ascending by weight.
///
/// The greedy pass assigns every item to the currently lightest bin, which
/// bounds the final spread: max bin weight minus min bin weight never
/// exceeds the single largest item. Bins are sorted smallest-first because
/// searches that hit a result cap abandon the rest of a partition, and
/// small pieces maximize the chance of filling the cap before any large,
/// low-hit-density piece is touched.
pub fn partition_by_weight<T>(
    items: Vec<T>,
    partition_count: usize,
    weight: impl Fn(&T) -> u64,
) -> Vec<Vec<T>> {
    assert!(partition_count > 0, "partition count must be positive");

    let mut bins: Vec<Vec<T>> = (0..partition_count).map(|_| Vec::new()).collect();
    let mut bin_weights = vec![0u64; partition_count];

    for item in items {
        let lightest = bin_weights
            .iter()
            .enumerate()
            .min_by_key(|(_, weight)| **weight)
            .map(|(index, _)| index)
            .unwrap_or(0);
        bin_weights[lightest] += weight(&item);
        bins[lightest].push(item);
    }

    for bin in &mut bins {
        bin.sort_by_key(&weight);
    }
    bins
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
