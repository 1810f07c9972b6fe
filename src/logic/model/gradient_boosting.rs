//! Gradient boosting - log-loss boosting of shallow regression trees
//!
//! F(x) = init + lr * sum(tree_k(x)); P(genuine) = sigmoid(F(x)).
//! Each stage fits the residual y - p and sets leaf values with a single
//! Newton step: sum(r) / sum(p * (1 - p)).

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use super::Discriminator;
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingParams {
    pub n_stages: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub seed: u64,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_stages: 100,
            learning_rate: 0.1,
            max_depth: 3,
            seed: crate::constants::RANDOM_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl GradientBoosting {
    pub fn fit(
        x: &Array2<f64>,
        y: &[f64],
        params: &GradientBoostingParams,
    ) -> Result<Self, ModelError> {
        let n = x.nrows();
        if n < 2 || y.len() != n {
            return Err(ModelError::NotEnoughSamples {
                model: "GradientBoosting",
                available: n,
            });
        }

        let prior = y.iter().sum::<f64>() / n as f64;
        if prior <= 0.0 || prior >= 1.0 {
            return Err(ModelError::MissingImpostors {
                model: "GradientBoosting",
            });
        }
        let init = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            ..TreeParams::default()
        };
        let indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut raw = vec![init; n];
        let mut trees = Vec::with_capacity(params.n_stages);

        for _ in 0..params.n_stages {
            let prob: Vec<f64> = raw.iter().map(|f| sigmoid(*f)).collect();
            let residual: Vec<f64> = y.iter().zip(&prob).map(|(t, p)| t - p).collect();

            let newton_step = |idx: &[usize]| {
                let numerator: f64 = idx.iter().map(|&i| residual[i]).sum();
                let denominator: f64 = idx.iter().map(|&i| prob[i] * (1.0 - prob[i])).sum();
                if denominator.abs() < 1e-12 {
                    0.0
                } else {
                    numerator / denominator
                }
            };

            let tree = RegressionTree::fit_with_leaf(
                x,
                &residual,
                &indices,
                &tree_params,
                &mut rng,
                &newton_step,
            );

            for (i, f) in raw.iter_mut().enumerate() {
                *f += params.learning_rate * tree.predict(x.row(i));
            }
            if raw.iter().any(|f| !f.is_finite()) {
                return Err(ModelError::NonFinite {
                    model: "GradientBoosting",
                });
            }
            trees.push(tree);
        }

        Ok(Self {
            init,
            learning_rate: params.learning_rate,
            trees,
            n_features: x.ncols(),
        })
    }

    pub fn n_stages(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    fn decision(&self, row: ArrayView1<f64>) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }
}

impl Discriminator for GradientBoosting {
    fn predict(&self, row: ArrayView1<f64>) -> bool {
        sigmoid(self.decision(row)) > 0.5
    }

    fn predict_proba(&self, row: ArrayView1<f64>) -> Option<f64> {
        Some(sigmoid(self.decision(row)))
    }
}
