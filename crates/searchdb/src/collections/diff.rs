//! Unordered collection diffing.
//!
//! [`build_diff`] partitions two unordered collections into left-only,
//! right-only, and paired common elements. Small inputs use a direct
//! quadratic membership scan (cheaper than hashing below the threshold);
//! large inputs build one hash index and probe it.

use std::collections::VecDeque;
use std::hash::Hash;

use fnv::FnvHashMap;

/// Below this combined element count the quadratic scan beats the hashing
/// overhead.
const LINEAR_SCAN_MAX: usize = 200;

/// Result of diffing two unordered collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDiff<T> {
    /// Elements present only in the left collection.
    pub left_only: Vec<T>,
    /// Elements present only in the right collection.
    pub right_only: Vec<T>,
    /// Paired matches, `(left instance, right instance)`, paired in
    /// first-seen order when duplicates exist on either side.
    pub common: Vec<(T, T)>,
}

// Manual impl: an empty diff needs no `T: Default`.
impl<T> Default for ArrayDiff<T> {
    fn default() -> Self {
        Self {
            left_only: Vec::new(),
            right_only: Vec::new(),
            common: Vec::new(),
        }
    }
}

/// Partitions `left` and `right` into left-only, right-only, and common
/// pairs under `T`'s equality.
///
/// Every element of each input lands in exactly one bucket:
/// `left_only + right_only + 2 * common == left.len() + right.len()`.
pub fn build_diff<T: Hash + Eq + Clone>(left: &[T], right: &[T]) -> ArrayDiff<T> {
    let diff = build_diff_inner(left, right);
    assert_eq!(
        diff.left_only.len() + diff.right_only.len() + 2 * diff.common.len(),
        left.len() + right.len(),
        "diff dropped or double-counted elements"
    );
    diff
}

fn build_diff_inner<T: Hash + Eq + Clone>(left: &[T], right: &[T]) -> ArrayDiff<T> {
    if left.is_empty() {
        return ArrayDiff {
            left_only: Vec::new(),
            right_only: right.to_vec(),
            common: Vec::new(),
        };
    }
    if right.is_empty() {
        return ArrayDiff {
            left_only: left.to_vec(),
            right_only: Vec::new(),
            common: Vec::new(),
        };
    }

    // Identical-in-order inputs are the overwhelmingly common case for
    // consecutive snapshots; a positional comparison avoids hashing anything.
    if left.len() == right.len() && left.iter().zip(right).all(|(a, b)| a == b) {
        return ArrayDiff {
            left_only: Vec::new(),
            right_only: Vec::new(),
            common: left.iter().cloned().zip(right.iter().cloned()).collect(),
        };
    }

    if left.len() + right.len() <= LINEAR_SCAN_MAX {
        diff_linear(left, right)
    } else {
        diff_hashed(left, right)
    }
}

/// O(n*m) membership scan for small inputs.
fn diff_linear<T: Eq + Clone>(left: &[T], right: &[T]) -> ArrayDiff<T> {
    let mut diff = ArrayDiff::default();
    let mut right_matched = vec![false; right.len()];

    for item in left {
        let matched = right
            .iter()
            .enumerate()
            .find(|(index, candidate)| !right_matched[*index] && *candidate == item);
        match matched {
            Some((index, candidate)) => {
                right_matched[index] = true;
                diff.common.push((item.clone(), candidate.clone()));
            }
            None => diff.left_only.push(item.clone()),
        }
    }

    diff.right_only.extend(
        right
            .iter()
            .zip(&right_matched)
            .filter(|(_, matched)| !**matched)
            .map(|(item, _)| item.clone()),
    );
    diff
}

/// O(n+m) hash-indexed diff for large inputs.
fn diff_hashed<T: Hash + Eq + Clone>(left: &[T], right: &[T]) -> ArrayDiff<T> {
    let mut buckets: FnvHashMap<&T, VecDeque<usize>> = FnvHashMap::default();
    for (index, item) in right.iter().enumerate() {
        buckets.entry(item).or_default().push_back(index);
    }

    let mut diff = ArrayDiff::default();
    let mut right_matched = vec![false; right.len()];

    for item in left {
        let matched = buckets
            .get_mut(item)
            .and_then(|indices| indices.pop_front());
        match matched {
            Some(index) => {
                right_matched[index] = true;
                diff.common.push((item.clone(), right[index].clone()));
            }
            None => diff.left_only.push(item.clone()),
        }
    }

    diff.right_only.extend(
        right
            .iter()
            .zip(&right_matched)
            .filter(|(_, matched)| !**matched)
            .map(|(item, _)| item.clone()),
    );
    diff
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
