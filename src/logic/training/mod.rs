//! Training Module - per-user model selection
//!
//! Load -> extract -> normalize -> fit every variant -> evaluate against
//! cross-user impostors -> keep the most accurate -> activate.

pub mod pipeline;
pub mod synthetic;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::constants::{
    EVALUATION_IMPOSTOR_USERS, MIN_TRAINING_SAMPLES, RANDOM_SEED, TRAINING_IMPOSTOR_USERS,
};
use crate::logic::model::{
    GradientBoostingParams, IsolationForestParams, MlpParams, OneClassSvmParams,
    RandomForestParams,
};

pub use pipeline::{TrainAllReport, TrainingFailure, TrainingPipeline};

/// Model hyperparameters and sampling limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub min_training_samples: usize,
    /// Real impostor rows needed before the supervised ensembles train
    pub min_supervised_impostors: usize,
    pub training_impostor_users: usize,
    pub evaluation_impostor_users: usize,
    pub random_forest: RandomForestParams,
    pub gradient_boosting: GradientBoostingParams,
    pub one_class_svm: OneClassSvmParams,
    pub isolation_forest: IsolationForestParams,
    pub mlp: MlpParams,
    /// Std of the additive noise on synthetic MLP impostors
    pub synthetic_noise_std: f64,
    /// Multiplicative jitter range on synthetic MLP impostors
    pub synthetic_jitter: (f64, f64),
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_training_samples: MIN_TRAINING_SAMPLES,
            min_supervised_impostors: 10,
            training_impostor_users: TRAINING_IMPOSTOR_USERS,
            evaluation_impostor_users: EVALUATION_IMPOSTOR_USERS,
            random_forest: RandomForestParams::default(),
            gradient_boosting: GradientBoostingParams::default(),
            one_class_svm: OneClassSvmParams::default(),
            isolation_forest: IsolationForestParams::default(),
            mlp: MlpParams::default(),
            synthetic_noise_std: 0.8,
            synthetic_jitter: (0.7, 1.3),
            seed: RANDOM_SEED,
        }
    }
}

impl TrainingConfig {
    /// Smaller ensembles and fewer epochs. Same protocol, much faster.
    pub fn fast() -> Self {
        let defaults = Self::default();
        Self {
            random_forest: RandomForestParams {
                n_trees: 25,
                max_depth: 12,
                ..defaults.random_forest
            },
            gradient_boosting: GradientBoostingParams {
                n_stages: 20,
                ..defaults.gradient_boosting
            },
            isolation_forest: IsolationForestParams {
                n_trees: 50,
                ..defaults.isolation_forest
            },
            mlp: MlpParams {
                hidden_layers: vec![16, 8],
                max_epochs: 60,
                learning_rate: 1e-2,
                ..defaults.mlp.clone()
            },
            ..defaults
        }
    }
}
