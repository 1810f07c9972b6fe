//! Impostor Sampler
//!
//! Other users' captures stand in for attackers, both as negatives for the
//! supervised variants and as the impostor half of the evaluation set.

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::constants::{MIN_IMPOSTOR_EVAL_COUNT, MIN_REAL_IMPOSTORS, RANDOM_SEED};
use crate::error::Result;
use crate::logic::dataset::DataSplit;
use crate::logic::features::{self, FeatureVector};
use crate::logic::model::{to_matrix, Normalizer};
use crate::logic::store::{CaptureQuery, SampleStore, UserDirectory};

pub struct ImpostorSampler<'a> {
    samples: &'a dyn SampleStore,
    users: &'a dyn UserDirectory,
}

/// Normalized evaluation impostors
#[derive(Debug, Clone)]
pub struct ImpostorSet {
    pub matrix: Array2<f64>,
    /// Rows were synthesized from the target's own test distribution
    pub simulated: bool,
}

/// Evaluation draws `max(20, 2 * n_test)` impostors.
pub fn evaluation_impostor_count(n_test: usize) -> usize {
    MIN_IMPOSTOR_EVAL_COUNT.max(2 * n_test)
}

impl<'a> ImpostorSampler<'a> {
    pub fn new(samples: &'a dyn SampleStore, users: &'a dyn UserDirectory) -> Self {
        Self { samples, users }
    }

    /// Up to `count` feature vectors from at most `max_users` other users'
    /// `split` captures, in directory order, `count / n_users + 1` per user.
    pub fn sample(
        &self,
        target_user: &str,
        count: usize,
        split: DataSplit,
        max_users: usize,
    ) -> Result<Vec<FeatureVector>> {
        let others: Vec<String> = self
            .users
            .user_ids()?
            .into_iter()
            .filter(|u| u != target_user)
            .take(max_users)
            .collect();

        let mut vectors = Vec::with_capacity(count);
        if others.is_empty() || count == 0 {
            return Ok(vectors);
        }

        let quota = count / others.len() + 1;
        for user in &others {
            let captures = self
                .samples
                .captures(user, &CaptureQuery::split(split).limit(quota))?;
            for stored in captures {
                if vectors.len() >= count {
                    break;
                }
                vectors.push(features::extract(&stored.capture));
            }
            if vectors.len() >= count {
                break;
            }
        }

        log::debug!(
            "Sampled {} {} impostor vectors for {} from {} users",
            vectors.len(),
            split,
            target_user,
            others.len()
        );
        Ok(vectors)
    }

    /// Evaluation impostors for a target whose normalized test matrix is
    /// `x_test`. Falls back to simulation below `MIN_REAL_IMPOSTORS` real rows.
    pub fn evaluation_set(
        &self,
        target_user: &str,
        normalizer: &Normalizer,
        x_test: &Array2<f64>,
        max_users: usize,
    ) -> Result<ImpostorSet> {
        let count = evaluation_impostor_count(x_test.nrows());
        let real = self.sample(target_user, count, DataSplit::Test, max_users)?;

        if real.len() < MIN_REAL_IMPOSTORS {
            log::warn!(
                "Impostor data unavailable for {} ({} real vectors); using {} simulated impostors",
                target_user,
                real.len(),
                count
            );
            return Ok(ImpostorSet {
                matrix: simulate_impostors(x_test, count, RANDOM_SEED),
                simulated: true,
            });
        }

        Ok(ImpostorSet {
            matrix: normalizer.transform(&to_matrix(&real))?,
            simulated: false,
        })
    }
}

/// `count` rows drawn column-wise from N(mean, std) of `x`.
pub fn simulate_impostors(x: &Array2<f64>, count: usize, seed: u64) -> Array2<f64> {
    let d = x.ncols();
    if x.nrows() == 0 {
        return Array2::zeros((count, d));
    }

    let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| ndarray::Array1::zeros(d));
    let std = x.std_axis(Axis(0), 0.0);
    let columns: Vec<Option<Normal<f64>>> = (0..d)
        .map(|j| Normal::new(mean[j], std[j]).ok())
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((count, d), |(_, j)| match &columns[j] {
        Some(normal) => normal.sample(&mut rng),
        None => mean[j],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::dataset::{NewCapture, RawKeystrokeCapture};
    use crate::logic::store::MemoryStore;

    fn capture(speed: f64) -> RawKeystrokeCapture {
        RawKeystrokeCapture {
            dwell_times: vec![100.0, 110.0, 95.0],
            flight_times: vec![50.0, 60.0],
            pause_patterns: vec![],
            typing_speed: speed,
        }
    }

    fn store_with(users: &[(&str, usize)]) -> MemoryStore {
        let store = MemoryStore::new();
        for (user, n) in users {
            for i in 0..*n {
                let c = NewCapture::live(user, "s", capture(i as f64))
                    .with_split(DataSplit::Test);
                store.insert(c).unwrap();
            }
        }
        store
    }

    #[test]
    fn test_excludes_target_and_honors_count() {
        let store = store_with(&[("target", 10), ("u1", 10), ("u2", 10), ("u3", 10)]);
        let sampler = ImpostorSampler::new(&store, &store);

        let vectors = sampler.sample("target", 7, DataSplit::Test, 20).unwrap();
        assert_eq!(vectors.len(), 7);

        // quota = 7 / 3 + 1 = 3 per user, directory order: u1, u1, u1, u2, u2, u2, u3
        let speeds: Vec<f64> = vectors.iter().map(|v| v.values[19]).collect();
        assert_eq!(speeds, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_max_users_and_split_respected() {
        let store = store_with(&[("target", 1), ("u1", 2), ("u2", 5)]);
        let sampler = ImpostorSampler::new(&store, &store);

        let vectors = sampler.sample("target", 20, DataSplit::Test, 1).unwrap();
        // only u1 considered
        assert_eq!(vectors.len(), 2);

        assert!(sampler
            .sample("target", 20, DataSplit::Train, 20)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_no_other_users() {
        let store = store_with(&[("target", 3)]);
        let sampler = ImpostorSampler::new(&store, &store);
        assert!(sampler.sample("target", 10, DataSplit::Test, 20).unwrap().is_empty());
    }

    #[test]
    fn test_evaluation_falls_back_to_simulation() {
        let store = store_with(&[("target", 4), ("u1", 3)]);
        let sampler = ImpostorSampler::new(&store, &store);

        let x_test = crate::logic::model::test_support::genuine_cluster(6, 21, 0.0);
        let normalizer = Normalizer::fit(&x_test).unwrap();
        let set = sampler.evaluation_set("target", &normalizer, &x_test, 20).unwrap();

        assert!(set.simulated);
        assert_eq!(set.matrix.dim(), (20, 21));
    }

    #[test]
    fn test_evaluation_uses_real_impostors() {
        let store = store_with(&[("target", 4), ("u1", 30)]);
        let sampler = ImpostorSampler::new(&store, &store);

        let x_test = crate::logic::model::test_support::genuine_cluster(12, 21, 0.0);
        let normalizer = Normalizer::fit(&x_test).unwrap();
        let set = sampler.evaluation_set("target", &normalizer, &x_test, 20).unwrap();

        assert!(!set.simulated);
        // max(20, 2 * 12) = 24 requested, u1 has 30
        assert_eq!(set.matrix.nrows(), 24);
    }

    #[test]
    fn test_simulation_is_seeded() {
        let x = crate::logic::model::test_support::genuine_cluster(10, 3, 1.0);
        assert_eq!(simulate_impostors(&x, 5, 42), simulate_impostors(&x, 5, 42));
        assert_eq!(evaluation_impostor_count(3), 20);
        assert_eq!(evaluation_impostor_count(51), 102);
    }
}
