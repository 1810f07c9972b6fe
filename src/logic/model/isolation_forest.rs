//! Isolation forest - random-split trees over the genuine samples
//!
//! Anomalies isolate in fewer splits. Score = -2^(-E[h(x)] / c(psi)); the
//! decision offset is the `contamination` quantile of training scores, so
//! about that share of training samples falls outside.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Discriminator;
use crate::error::ModelError;
use crate::logic::features::stats::percentile;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsolationForestParams {
    pub n_trees: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestParams {
    fn default() -> Self {
        Self {
            n_trees: 300,
            max_samples: 256,
            contamination: 0.10,
            seed: crate::constants::RANDOM_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum IsolationNode {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<IsolationNode>,
}

impl IsolationTree {
    fn build(x: &Array2<f64>, idx: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, idx, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &Array2<f64>,
        idx: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(IsolationNode::Leaf { size: idx.len() });

        if depth >= max_depth || idx.len() <= 1 {
            return node_id;
        }

        // Random feature among the non-constant ones
        let d = x.ncols();
        let mut candidates: Vec<usize> = (0..d).collect();
        let mut chosen = None;
        while !candidates.is_empty() {
            let pick = candidates.swap_remove(rng.gen_range(0..candidates.len()));
            let (lo, hi) = idx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(x[[i, pick]]), hi.max(x[[i, pick]]))
            });
            if hi > lo {
                chosen = Some((pick, lo, hi));
                break;
            }
        }

        let Some((feature, lo, hi)) = chosen else {
            return node_id;
        };

        let threshold = rng.gen_range(lo..hi);
        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            idx.iter().partition(|&&i| x[[i, feature]] < threshold);

        let left = self.grow(x, left_idx, depth + 1, max_depth, rng);
        let right = self.grow(x, right_idx, depth + 1, max_depth, rng);
        self.nodes[node_id] = IsolationNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    fn path_length(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(node) {
                Some(IsolationNode::Leaf { size }) => return depth + average_path_length(*size),
                Some(IsolationNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    node = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                None => return depth,
            }
        }
    }
}

/// Average unsuccessful-search path length in a BST of `n` nodes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    max_samples: usize,
    offset: f64,
    n_features: usize,
}

impl IsolationForest {
    pub fn fit(x: &Array2<f64>, params: &IsolationForestParams) -> Result<Self, ModelError> {
        let n = x.nrows();
        if n < 2 {
            return Err(ModelError::NotEnoughSamples {
                model: "IsolationForest",
                available: n,
            });
        }
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(ModelError::Other(format!(
                "contamination must be in (0, 0.5], got {}",
                params.contamination
            )));
        }

        let max_samples = params.max_samples.clamp(2, n);
        let max_depth = (max_samples as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let sample = index::sample(&mut rng, n, max_samples).into_vec();
                IsolationTree::build(x, sample, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            max_samples,
            offset: 0.0,
            n_features: x.ncols(),
        };

        let scores: Vec<f64> = x.rows().into_iter().map(|r| forest.score_sample(r)).collect();
        forest.offset = percentile(&scores, 100.0 * params.contamination);

        if !forest.offset.is_finite() {
            return Err(ModelError::NonFinite {
                model: "IsolationForest",
            });
        }
        Ok(forest)
    }

    /// Higher is more normal; in [-1, 0).
    pub fn score_sample(&self, row: ArrayView1<f64>) -> f64 {
        let mean_path = self.trees.iter().map(|t| t.path_length(row)).sum::<f64>()
            / self.trees.len().max(1) as f64;
        let norm = average_path_length(self.max_samples).max(f64::MIN_POSITIVE);
        -(2f64).powf(-mean_path / norm)
    }

    pub fn decision_function(&self, row: ArrayView1<f64>) -> f64 {
        self.score_sample(row) - self.offset
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

impl Discriminator for IsolationForest {
    fn predict(&self, row: ArrayView1<f64>) -> bool {
        self.decision_function(row) >= 0.0
    }

    fn predict_proba(&self, _row: ArrayView1<f64>) -> Option<f64> {
        None
    }
}
