//! One-class SVM - RBF boundary around the genuine user's samples
//!
//! Dual problem (nu formulation, unit box):
//!   min 0.5 * a'Ka  s.t.  0 <= a_i <= 1,  sum(a) = nu * l
//! solved with SMO using second-order working set selection.
//! Decision: f(x) = sum(a_i * K(x_i, x)) - rho; genuine when f(x) > 0.
//!
//! Kernel rows are computed on demand and held in a bounded cache, so memory
//! stays at `cache_size_mb` however many training rows a user has.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::Discriminator;
use crate::error::ModelError;

const TAU: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OneClassSvmParams {
    pub nu: f64,
    /// KKT tolerance
    pub tolerance: f64,
    /// Kernel row cache budget
    pub cache_size_mb: usize,
}

impl Default for OneClassSvmParams {
    fn default() -> Self {
        Self {
            nu: 0.15,
            tolerance: 1e-3,
            cache_size_mb: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneClassSvm {
    support_vectors: Array2<f64>,
    dual_coef: Vec<f64>,
    rho: f64,
    gamma: f64,
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let dist: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    (-gamma * dist).exp()
}

// ============================================================================
// KERNEL CACHE
// ============================================================================

/// RBF kernel rows over the training matrix, computed on first use.
/// Oldest rows are evicted once `capacity` rows are held. The diagonal is
/// always 1 for an RBF kernel and is never stored.
struct KernelCache<'a> {
    x: &'a Array2<f64>,
    gamma: f64,
    rows: HashMap<usize, Rc<Vec<f64>>>,
    order: VecDeque<usize>,
    capacity: usize,
}

impl<'a> KernelCache<'a> {
    fn new(x: &'a Array2<f64>, gamma: f64, cache_size_mb: usize) -> Self {
        let row_bytes = (x.nrows() * std::mem::size_of::<f64>()).max(1);
        let capacity = (cache_size_mb * 1024 * 1024 / row_bytes).clamp(2, x.nrows().max(2));
        Self {
            x,
            gamma,
            rows: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn row(&mut self, i: usize) -> Rc<Vec<f64>> {
        if let Some(row) = self.rows.get(&i) {
            return Rc::clone(row);
        }

        let xi = self.x.row(i);
        let row: Rc<Vec<f64>> = Rc::new(
            self.x
                .rows()
                .into_iter()
                .map(|xt| rbf(xi, xt, self.gamma))
                .collect(),
        );

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.rows.remove(&oldest);
            }
        }
        self.order.push_back(i);
        self.rows.insert(i, Rc::clone(&row));
        row
    }

    #[cfg(test)]
    fn cached_rows(&self) -> usize {
        self.rows.len()
    }
}

/// gamma = 1 / (d * Var(X)) over all entries; 1 when X is constant.
pub fn scale_gamma(x: &Array2<f64>) -> f64 {
    let count = x.len() as f64;
    if count == 0.0 {
        return 1.0;
    }
    let mean = x.sum() / count;
    let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count;
    if var > 0.0 {
        1.0 / (x.ncols() as f64 * var)
    } else {
        1.0
    }
}

impl OneClassSvm {
    pub fn fit(x: &Array2<f64>, params: &OneClassSvmParams) -> Result<Self, ModelError> {
        let l = x.nrows();
        if l < 2 {
            return Err(ModelError::NotEnoughSamples {
                model: "OneClassSVM",
                available: l,
            });
        }
        if !(params.nu > 0.0 && params.nu <= 1.0) {
            return Err(ModelError::Other(format!("nu must be in (0, 1], got {}", params.nu)));
        }

        let gamma = scale_gamma(x);
        let mut kernel = KernelCache::new(x, gamma, params.cache_size_mb);

        // Feasible start: the first floor(nu * l) alphas at the upper bound.
        let mut alpha = vec![0.0; l];
        let total = params.nu * l as f64;
        let full = total.floor() as usize;
        for a in alpha.iter_mut().take(full.min(l)) {
            *a = 1.0;
        }
        if full < l {
            alpha[full] = total - full as f64;
        }

        // grad = K * alpha, summed over the non-zero alphas only
        let mut grad = vec![0.0; l];
        for s in (0..l).filter(|&s| alpha[s] > 0.0) {
            let k_s = kernel.row(s);
            for (g, k) in grad.iter_mut().zip(k_s.iter()) {
                *g += k * alpha[s];
            }
        }

        let max_iter = (100 * l).max(10_000);
        let mut iter = 0;
        while iter < max_iter {
            let Some((i, j)) = select_working_set(&alpha, &grad, &mut kernel, params.tolerance)
            else {
                break;
            };
            iter += 1;

            let (k_i, k_j) = (kernel.row(i), kernel.row(j));
            let quad = (2.0 - 2.0 * k_i[j]).max(TAU);
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            let (old_i, old_j) = (alpha[i], alpha[j]);

            let mut new_i = old_i - delta;
            let mut new_j = old_j + delta;
            if sum > 1.0 {
                if new_i > 1.0 {
                    new_i = 1.0;
                    new_j = sum - 1.0;
                }
                if new_j > 1.0 {
                    new_j = 1.0;
                    new_i = sum - 1.0;
                }
            } else {
                if new_j < 0.0 {
                    new_j = 0.0;
                    new_i = sum;
                }
                if new_i < 0.0 {
                    new_i = 0.0;
                    new_j = sum;
                }
            }
            alpha[i] = new_i;
            alpha[j] = new_j;

            let (di, dj) = (new_i - old_i, new_j - old_j);
            for (t, g) in grad.iter_mut().enumerate() {
                *g += k_i[t] * di + k_j[t] * dj;
            }
        }

        if iter >= max_iter {
            log::warn!("OneClassSVM reached {} iterations without converging", max_iter);
        }

        let rho = compute_rho(&alpha, &grad);
        if !rho.is_finite() || grad.iter().any(|g| !g.is_finite()) {
            return Err(ModelError::NonFinite {
                model: "OneClassSVM",
            });
        }

        let support: Vec<usize> = (0..l).filter(|&t| alpha[t] > 0.0).collect();
        let support_vectors =
            Array2::from_shape_fn((support.len(), x.ncols()), |(r, c)| x[[support[r], c]]);
        let dual_coef = support.iter().map(|&t| alpha[t]).collect();

        log::debug!(
            "OneClassSVM converged after {} iterations ({} support vectors, gamma {:.5})",
            iter,
            support.len(),
            gamma
        );

        Ok(Self {
            support_vectors,
            dual_coef,
            rho,
            gamma,
        })
    }

    pub fn decision_function(&self, row: ArrayView1<f64>) -> f64 {
        self.support_vectors
            .rows()
            .into_iter()
            .zip(self.dual_coef.iter())
            .map(|(sv, a)| a * rbf(sv, row, self.gamma))
            .sum::<f64>()
            - self.rho
    }

    #[cfg(test)]
    fn n_support(&self) -> usize {
        self.dual_coef.len()
    }

    pub fn n_features(&self) -> usize {
        self.support_vectors.ncols()
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    #[cfg(test)]
    fn dual_sum(&self) -> f64 {
        self.dual_coef.iter().sum()
    }
}

/// Maximal violating pair with second-order choice of `j`.
/// Returns `None` once the KKT gap is below `tolerance`.
fn select_working_set(
    alpha: &[f64],
    grad: &[f64],
    kernel: &mut KernelCache,
    tolerance: f64,
) -> Option<(usize, usize)> {
    let mut g_max = f64::NEG_INFINITY;
    let mut i = None;
    for (t, (&a, &g)) in alpha.iter().zip(grad).enumerate() {
        if a < 1.0 && -g >= g_max {
            g_max = -g;
            i = Some(t);
        }
    }
    let i = i?;
    let k_i = kernel.row(i);

    let mut g_max2 = f64::NEG_INFINITY;
    let mut obj_min = f64::INFINITY;
    let mut j = None;
    for (t, (&a, &g)) in alpha.iter().zip(grad).enumerate() {
        if a <= 0.0 {
            continue;
        }
        g_max2 = g_max2.max(g);
        let b = g_max + g;
        if b > 0.0 {
            let quad = (2.0 - 2.0 * k_i[t]).max(TAU);
            let obj = -(b * b) / quad;
            if obj <= obj_min {
                obj_min = obj;
                j = Some(t);
            }
        }
    }

    if g_max + g_max2 < tolerance {
        return None;
    }
    j.map(|j| (i, j))
}

fn compute_rho(alpha: &[f64], grad: &[f64]) -> f64 {
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;
    let mut free = 0usize;
    let mut free_sum = 0.0;

    for (&a, &g) in alpha.iter().zip(grad) {
        if a >= 1.0 {
            lb = lb.max(g);
        } else if a <= 0.0 {
            ub = ub.min(g);
        } else {
            free += 1;
            free_sum += g;
        }
    }

    if free > 0 {
        free_sum / free as f64
    } else {
        (ub + lb) / 2.0
    }
}

impl Discriminator for OneClassSvm {
    fn predict(&self, row: ArrayView1<f64>) -> bool {
        self.decision_function(row) > 0.0
    }

    fn predict_proba(&self, _row: ArrayView1<f64>) -> Option<f64> {
        None
    }
}
