//! Synthetic impostors for the MLP
//!
//! Perturbed copies of the user's own normalized training rows: half the
//! rows, drawn without replacement, plus N(0, noise_std) noise, times a
//! uniform per-value jitter.

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};

use super::TrainingConfig;
use crate::error::ModelError;

pub fn synthetic_impostors(x_train: &Array2<f64>, config: &TrainingConfig) -> Result<Array2<f64>, ModelError> {
    let n = x_train.nrows();
    let count = n / 2;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let picked = index::sample(&mut rng, n, count).into_vec();
    let mut rows = x_train.select(Axis(0), &picked);

    let noise = Normal::new(0.0, config.synthetic_noise_std)
        .map_err(|e| ModelError::Other(format!("invalid synthetic noise: {}", e)))?;
    rows.mapv_inplace(|v| v + noise.sample(&mut rng));

    let (low, high) = config.synthetic_jitter;
    if !(low < high) {
        return Err(ModelError::Other(format!(
            "invalid synthetic jitter range ({}, {})",
            low, high
        )));
    }
    let jitter = Uniform::new(low, high);
    rows.mapv_inplace(|v| v * jitter.sample(&mut rng));

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::test_support::genuine_cluster;

    #[test]
    fn test_half_the_rows() {
        let x = genuine_cluster(41, 4, 0.0);
        let synth = synthetic_impostors(&x, &TrainingConfig::default()).unwrap();
        assert_eq!(synth.dim(), (20, 4));
        assert!(synth.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_seeded() {
        let x = genuine_cluster(10, 3, 0.0);
        let config = TrainingConfig::default();
        assert_eq!(
            synthetic_impostors(&x, &config).unwrap(),
            synthetic_impostors(&x, &config).unwrap()
        );
    }

    #[test]
    fn test_rows_are_perturbed() {
        let x = genuine_cluster(10, 3, 0.0);
        let synth = synthetic_impostors(&x, &TrainingConfig::default()).unwrap();
        for row in synth.rows() {
            assert!(x.rows().into_iter().all(|orig| orig != row));
        }
    }
}
