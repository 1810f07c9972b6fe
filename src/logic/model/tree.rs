//! CART regression tree
//!
//! Shared by the random forest (fitted on 0/1 labels, where squared error
//! splits match gini) and gradient boosting (fitted on residuals with a
//! Newton leaf value).

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; `None` = all
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: usize::MAX,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    cost: f64,
}

impl RegressionTree {
    /// Fit on the rows in `indices` (duplicates act as sample weights).
    /// Leaves predict the mean target.
    pub fn fit(
        x: &Array2<f64>,
        y: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mean_leaf = |idx: &[usize]| idx.iter().map(|&i| y[i]).sum::<f64>() / idx.len() as f64;
        Self::fit_with_leaf(x, y, indices, params, rng, &mean_leaf)
    }

    /// Fit with a custom leaf value over the rows reaching each leaf.
    pub fn fit_with_leaf(
        x: &Array2<f64>,
        y: &[f64],
        indices: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        if indices.is_empty() {
            tree.nodes.push(TreeNode::Leaf { value: 0.0 });
            return tree;
        }
        tree.grow(x, y, indices.to_vec(), 0, params, rng, leaf_value);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn grow(
        &mut self,
        x: &Array2<f64>,
        y: &[f64],
        idx: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: 0.0 });

        let n = idx.len() as f64;
        let sum: f64 = idx.iter().map(|&i| y[i]).sum();
        let sum_sq: f64 = idx.iter().map(|&i| y[i] * y[i]).sum();
        let node_sse = sum_sq - sum * sum / n;

        let can_split = depth < params.max_depth
            && idx.len() >= params.min_samples_split.max(2)
            && idx.len() >= 2 * params.min_samples_leaf.max(1)
            && node_sse > 1e-12;

        let split = if can_split {
            best_split(x, y, &idx, params, rng).filter(|s| s.cost < node_sse - 1e-12)
        } else {
            None
        };

        match split {
            None => {
                self.nodes[node_id] = TreeNode::Leaf {
                    value: leaf_value(&idx),
                };
            }
            Some(split) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
                    .iter()
                    .partition(|&&i| x[[i, split.feature]] <= split.threshold);
                let left = self.grow(x, y, left_idx, depth + 1, params, rng, leaf_value);
                let right = self.grow(x, y, right_idx, depth + 1, params, rng, leaf_value);
                self.nodes[node_id] = TreeNode::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left,
                    right,
                };
            }
        }

        node_id
    }

    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        let mut node = 0;
        loop {
            match self.nodes.get(node) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    node = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], id: usize) -> usize {
            match nodes.get(id) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Lowest weighted squared error split over the sampled features.
fn best_split(
    x: &Array2<f64>,
    y: &[f64],
    idx: &[usize],
    params: &TreeParams,
    rng: &mut StdRng,
) -> Option<BestSplit> {
    let d = x.ncols();
    let features: Vec<usize> = match params.max_features {
        Some(k) if k < d => index::sample(rng, d, k.max(1)).into_vec(),
        _ => (0..d).collect(),
    };

    let n = idx.len();
    let total_sum: f64 = idx.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = idx.iter().map(|&i| y[i] * y[i]).sum();
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<BestSplit> = None;
    let mut order = idx.to_vec();

    for feature in features {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let i = order[k];
            left_sum += y[i];
            left_sq += y[i] * y[i];

            let n_left = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let value = x[[i, feature]];
            let next = x[[order[k + 1], feature]];
            if next <= value {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let sse_left = left_sq - left_sum * left_sum / n_left as f64;
            let sse_right = (total_sq - left_sq) - right_sum * right_sum / n_right as f64;
            let cost = sse_left + sse_right;

            if best.as_ref().map_or(true, |b| cost < b.cost) {
                let mut threshold = (value + next) / 2.0;
                if threshold >= next {
                    threshold = value;
                }
                best = Some(BestSplit {
                    feature,
                    threshold,
                    cost,
                });
            }
        }
    }

    best
}
