//! Random forest - bagged CART trees over genuine (1) vs impostor (0) rows

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::Discriminator;
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 300,
            max_depth: 25,
            seed: crate::constants::RANDOM_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(x: &Array2<f64>, y: &[f64], params: &RandomForestParams) -> Result<Self, ModelError> {
        let n = x.nrows();
        if n < 2 || y.len() != n {
            return Err(ModelError::NotEnoughSamples {
                model: "RandomForest",
                available: n,
            });
        }
        if !(y.iter().any(|v| *v > 0.5) && y.iter().any(|v| *v <= 0.5)) {
            return Err(ModelError::MissingImpostors {
                model: "RandomForest",
            });
        }

        let d = x.ncols();
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            max_features: Some(((d as f64).sqrt() as usize).max(1)),
            ..TreeParams::default()
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_trees);
        for _ in 0..params.n_trees.max(1) {
            let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(RegressionTree::fit(x, y, &bootstrap, &tree_params, &mut rng));
        }

        Ok(Self {
            trees,
            n_features: d,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn genuine_probability(&self, row: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }
}

impl Discriminator for RandomForest {
    fn predict(&self, row: ArrayView1<f64>) -> bool {
        self.genuine_probability(row) > 0.5
    }

    fn predict_proba(&self, row: ArrayView1<f64>) -> Option<f64> {
        Some(self.genuine_probability(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::model::test_support::two_clusters;

    #[test]
    fn test_random_forest_separates_clusters() {
        let (x, y) = two_clusters(40, 4);
        let params = RandomForestParams {
            n_trees: 15,
            max_depth: 8,
            seed: 42,
        };
        let forest = RandomForest::fit(&x, &y, &params).unwrap();
        assert_eq!(forest.n_trees(), 15);

        let genuine = ndarray::Array1::from_elem(4, 2.0);
        let impostor = ndarray::Array1::from_elem(4, -2.0);
        assert!(forest.predict(genuine.view()));
        assert!(!forest.predict(impostor.view()));

        let p = forest.predict_proba(genuine.view()).unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_random_forest_requires_both_classes() {
        let (x, _) = two_clusters(10, 3);
        let y = vec![1.0; x.nrows()];
        assert!(matches!(
            RandomForest::fit(&x, &y, &RandomForestParams::default()),
            Err(ModelError::MissingImpostors { .. })
        ));
    }

    #[test]
    fn test_random_forest_is_deterministic() {
        let (x, y) = two_clusters(20, 3);
        let params = RandomForestParams {
            n_trees: 5,
            max_depth: 5,
            seed: 42,
        };
        let a = RandomForest::fit(&x, &y, &params).unwrap();
        let b = RandomForest::fit(&x, &y, &params).unwrap();
        assert_eq!(a, b);
    }
}
