//! Dataset Partitioner
//!
//! Two split policies:
//! - Arrival-order 70/15/15 labelling at import time. Not randomized, so later
//!   sessions land in validation/test and drift is modeled realistically.
//! - Seeded random 70/30 train/test split used by training when a user's
//!   captures carry no split label.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::record::DataSplit;

/// Boundaries in whole percent, so `floor(0.70 * N)` is exact for every N
pub const TRAIN_PERCENT: usize = 70;
pub const VALIDATION_END_PERCENT: usize = 85;

/// Fraction held out by the fallback split
pub const FALLBACK_TEST_RATIO: f64 = 0.30;
pub const FALLBACK_SEED: u64 = 42;

/// Split label for every index `0..total`, in arrival order.
pub fn assign_splits(total: usize) -> Vec<DataSplit> {
    let train_end = total * TRAIN_PERCENT / 100;
    let validation_end = total * VALIDATION_END_PERCENT / 100;

    (0..total)
        .map(|idx| {
            if idx < train_end {
                DataSplit::Train
            } else if idx < validation_end {
                DataSplit::Validation
            } else {
                DataSplit::Test
            }
        })
        .collect()
}

/// Counts of (train, validation, test) for `total` captures.
pub fn split_counts(total: usize) -> (usize, usize, usize) {
    assign_splits(total)
        .iter()
        .fold((0, 0, 0), |(tr, va, te), split| match split {
            DataSplit::Train => (tr + 1, va, te),
            DataSplit::Validation => (tr, va + 1, te),
            DataSplit::Test => (tr, va, te + 1),
        })
}

/// Shuffle with a fixed seed and hold out `ceil(test_ratio * n)` items.
/// Returns (train, test).
pub fn random_split<T>(items: Vec<T>, test_ratio: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let n = items.len();
    let n_test = ((test_ratio * n as f64).ceil() as usize).min(n);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_set: std::collections::HashSet<usize> = indices[..n_test].iter().copied().collect();

    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (idx, item) in items.into_iter().enumerate() {
        if test_set.contains(&idx) {
            test.push(item);
        } else {
            train.push(item);
        }
    }

    (train, test)
}

/// The fallback 70/30 split used by the training pipeline.
pub fn fallback_split<T>(items: Vec<T>) -> (Vec<T>, Vec<T>) {
    random_split(items, FALLBACK_TEST_RATIO, FALLBACK_SEED)
}
