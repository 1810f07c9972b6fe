//! MLP classifier - small feed-forward network, genuine (1) vs impostor (0)
//!
//! ReLU hidden layers, sigmoid output, binary cross-entropy with L2 penalty,
//! Adam over shuffled mini-batches. Training stops early once the epoch
//! loss fails to improve by `tolerance` for `n_iter_no_change` epochs.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Discriminator;
use crate::error::ModelError;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;
const PROBA_CLIP: f64 = 1e-15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// L2 penalty
    pub alpha: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub tolerance: f64,
    pub n_iter_no_change: usize,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32, 16],
            learning_rate: 1e-3,
            alpha: 1e-4,
            batch_size: 200,
            max_epochs: 800,
            tolerance: 1e-4,
            n_iter_no_change: 10,
            seed: crate::constants::RANDOM_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Dense {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

/// Adam moments for one layer
struct DenseMoments {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl DenseMoments {
    fn zeros(layer: &Dense) -> Self {
        Self {
            m_w: Array2::zeros(layer.weights.raw_dim()),
            v_w: Array2::zeros(layer.weights.raw_dim()),
            m_b: Array1::zeros(layer.bias.raw_dim()),
            v_b: Array1::zeros(layer.bias.raw_dim()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpClassifier {
    layers: Vec<Dense>,
    epochs_run: usize,
    final_loss: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Glorot uniform init, bound sqrt(6 / (fan_in + fan_out)).
fn init_layer(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Dense {
    let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Dense {
        weights: Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-bound..bound)),
        bias: Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound)),
    }
}

fn bce(prob: &Array1<f64>, y: &Array1<f64>) -> f64 {
    let n = prob.len().max(1) as f64;
    prob.iter()
        .zip(y.iter())
        .map(|(p, t)| {
            let p = p.clamp(PROBA_CLIP, 1.0 - PROBA_CLIP);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum::<f64>()
        / n
}

impl MlpClassifier {
    pub fn fit(x: &Array2<f64>, y: &[f64], params: &MlpParams) -> Result<Self, ModelError> {
        let n = x.nrows();
        if n < 2 || y.len() != n {
            return Err(ModelError::NotEnoughSamples {
                model: "MLPClassifier",
                available: n,
            });
        }
        if !(y.iter().any(|v| *v > 0.5) && y.iter().any(|v| *v <= 0.5)) {
            return Err(ModelError::MissingImpostors {
                model: "MLPClassifier",
            });
        }

        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut sizes = vec![x.ncols()];
        sizes.extend(params.hidden_layers.iter().copied());
        sizes.push(1);
        let mut layers: Vec<Dense> = sizes
            .windows(2)
            .map(|w| init_layer(w[0], w[1], &mut rng))
            .collect();
        let mut moments: Vec<DenseMoments> = layers.iter().map(DenseMoments::zeros).collect();

        let batch_size = params.batch_size.clamp(1, n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut step = 0i32;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut epochs_run = 0;
        let mut last_loss = f64::INFINITY;

        for _epoch in 0..params.max_epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in order.chunks(batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = Array1::from_iter(batch.iter().map(|&i| y[i]));

                let (activations, pre_activations) = forward(&layers, &xb);
                let prob = activations
                    .last()
                    .map(|a| a.column(0).to_owned())
                    .unwrap_or_else(|| Array1::zeros(batch.len()));

                let l2: f64 = layers.iter().map(|l| l.weights.mapv(|w| w * w).sum()).sum();
                let batch_loss = bce(&prob, &yb) + 0.5 * params.alpha * l2 / batch.len() as f64;
                epoch_loss += batch_loss * batch.len() as f64;

                step += 1;
                backward_and_update(
                    &mut layers,
                    &mut moments,
                    &activations,
                    &pre_activations,
                    &prob,
                    &yb,
                    params,
                    step,
                );
            }

            epoch_loss /= n as f64;
            epochs_run += 1;
            last_loss = epoch_loss;

            if !epoch_loss.is_finite() {
                return Err(ModelError::NonFinite {
                    model: "MLPClassifier",
                });
            }

            if epoch_loss > best_loss - params.tolerance {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
            }
            if no_improvement > params.n_iter_no_change {
                log::debug!(
                    "MLPClassifier stopped after {} epochs (loss {:.5})",
                    epochs_run,
                    epoch_loss
                );
                break;
            }
        }

        Ok(Self {
            layers,
            epochs_run,
            final_loss: last_loss,
        })
    }

    pub fn epochs_run(&self) -> usize {
        self.epochs_run
    }

    pub fn final_loss(&self) -> f64 {
        self.final_loss
    }

    pub fn n_features(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    fn genuine_probability(&self, row: ArrayView1<f64>) -> f64 {
        let mut a = row.to_owned();
        let last = self.layers.len().saturating_sub(1);
        for (k, layer) in self.layers.iter().enumerate() {
            let z = a.dot(&layer.weights) + &layer.bias;
            a = if k == last {
                z.mapv(sigmoid)
            } else {
                z.mapv(|v| v.max(0.0))
            };
        }
        a.get(0).copied().unwrap_or(0.0)
    }
}

/// Returns (activations incl. input, pre-activations per layer).
fn forward(layers: &[Dense], x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
    let mut activations = vec![x.clone()];
    let mut pre_activations = Vec::with_capacity(layers.len());
    let last = layers.len().saturating_sub(1);

    for (k, layer) in layers.iter().enumerate() {
        let z = activations[k].dot(&layer.weights) + &layer.bias;
        let a = if k == last {
            z.mapv(sigmoid)
        } else {
            z.mapv(|v| v.max(0.0))
        };
        pre_activations.push(z);
        activations.push(a);
    }

    (activations, pre_activations)
}

#[allow(clippy::too_many_arguments)]
fn backward_and_update(
    layers: &mut [Dense],
    moments: &mut [DenseMoments],
    activations: &[Array2<f64>],
    pre_activations: &[Array2<f64>],
    prob: &Array1<f64>,
    y: &Array1<f64>,
    params: &MlpParams,
    step: i32,
) {
    let batch = prob.len() as f64;
    // sigmoid + BCE: dL/dz = p - y
    let mut delta: Array2<f64> = (prob - y).insert_axis(Axis(1)) / batch;

    let lr_t = params.learning_rate * (1.0 - ADAM_BETA2.powi(step)).sqrt()
        / (1.0 - ADAM_BETA1.powi(step));

    for k in (0..layers.len()).rev() {
        let grad_w = activations[k].t().dot(&delta) + &(&layers[k].weights * (params.alpha / batch));
        let grad_b = delta.sum_axis(Axis(0));

        // propagate before updating this layer's weights
        let next_delta = if k > 0 {
            let back = delta.dot(&layers[k].weights.t());
            let mask = pre_activations[k - 1].mapv(|z| if z > 0.0 { 1.0 } else { 0.0 });
            Some(back * mask)
        } else {
            None
        };

        let m = &mut moments[k];
        m.m_w = &m.m_w * ADAM_BETA1 + &(&grad_w * (1.0 - ADAM_BETA1));
        m.v_w = &m.v_w * ADAM_BETA2 + &(grad_w.mapv(|g| g * g) * (1.0 - ADAM_BETA2));
        m.m_b = &m.m_b * ADAM_BETA1 + &(&grad_b * (1.0 - ADAM_BETA1));
        m.v_b = &m.v_b * ADAM_BETA2 + &(grad_b.mapv(|g| g * g) * (1.0 - ADAM_BETA2));

        let layer = &mut layers[k];
        layer
            .weights
            .zip_mut_with(&(&m.m_w / &m.v_w.mapv(|v| v.sqrt() + ADAM_EPSILON)), |w, u| {
                *w -= lr_t * u
            });
        layer
            .bias
            .zip_mut_with(&(&m.m_b / &m.v_b.mapv(|v| v.sqrt() + ADAM_EPSILON)), |b, u| {
                *b -= lr_t * u
            });

        if let Some(d) = next_delta {
            delta = d;
        }
    }
}

impl Discriminator for MlpClassifier {
    fn predict(&self, row: ArrayView1<f64>) -> bool {
        self.genuine_probability(row) >= 0.5
    }

    fn predict_proba(&self, row: ArrayView1<f64>) -> Option<f64> {
        Some(self.genuine_probability(row))
    }
}
