//! Model Module - Per-user keystroke discriminators
//!
//! Five candidate variants behind one [`Discriminator`] interface. The
//! training pipeline fits all of them, keeps the most accurate one and
//! persists it as a [`ModelBundle`] together with its [`Normalizer`].

pub mod threshold;
pub mod normalizer;
pub mod tree;
pub mod random_forest;
pub mod gradient_boosting;
pub mod ocsvm;
pub mod isolation_forest;
pub mod mlp;
pub mod bundle;
pub mod storage;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

// Re-export common types
pub use threshold::ThresholdConfig;
pub use normalizer::{to_matrix, Normalizer};
pub use random_forest::{RandomForest, RandomForestParams};
pub use gradient_boosting::{GradientBoosting, GradientBoostingParams};
pub use ocsvm::{OneClassSvm, OneClassSvmParams};
pub use isolation_forest::{IsolationForest, IsolationForestParams};
pub use mlp::{MlpClassifier, MlpParams};
pub use bundle::{BundleMetadata, BundleSummary, ModelBundle, VariantComparison, VariantStatus};

// ============================================================================
// DISCRIMINATOR
// ============================================================================

/// Genuine-vs-impostor decision over one normalized feature row.
pub trait Discriminator {
    /// `true` = accepted as the genuine user
    fn predict(&self, row: ArrayView1<f64>) -> bool;

    /// P(genuine) when the variant has a calibrated-ish posterior
    fn predict_proba(&self, row: ArrayView1<f64>) -> Option<f64>;

    fn predict_batch(&self, x: &Array2<f64>) -> Vec<bool> {
        x.rows().into_iter().map(|row| self.predict(row)).collect()
    }
}

// ============================================================================
// MODEL KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    GradientBoosting,
    #[serde(rename = "OneClassSVM")]
    OneClassSvm,
    IsolationForest,
    #[serde(rename = "MLPClassifier")]
    Mlp,
}

impl ModelKind {
    /// Training order; accuracy ties go to the earlier kind.
    pub const ALL: [ModelKind; 5] = [
        ModelKind::RandomForest,
        ModelKind::GradientBoosting,
        ModelKind::OneClassSvm,
        ModelKind::IsolationForest,
        ModelKind::Mlp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "RandomForest",
            ModelKind::GradientBoosting => "GradientBoosting",
            ModelKind::OneClassSvm => "OneClassSVM",
            ModelKind::IsolationForest => "IsolationForest",
            ModelKind::Mlp => "MLPClassifier",
        }
    }

    /// Needs real impostor samples from other users to train.
    pub fn needs_real_impostors(&self) -> bool {
        matches!(self, ModelKind::RandomForest | ModelKind::GradientBoosting)
    }

    pub fn has_probability(&self) -> bool {
        !matches!(self, ModelKind::OneClassSvm | ModelKind::IsolationForest)
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// TRAINED MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", content = "params")]
pub enum TrainedModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    #[serde(rename = "OneClassSVM")]
    OneClassSvm(OneClassSvm),
    IsolationForest(IsolationForest),
    #[serde(rename = "MLPClassifier")]
    Mlp(MlpClassifier),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
            TrainedModel::OneClassSvm(_) => ModelKind::OneClassSvm,
            TrainedModel::IsolationForest(_) => ModelKind::IsolationForest,
            TrainedModel::Mlp(_) => ModelKind::Mlp,
        }
    }

    /// Input width the model was fitted on
    pub fn n_features(&self) -> usize {
        match self {
            TrainedModel::RandomForest(m) => m.n_features(),
            TrainedModel::GradientBoosting(m) => m.n_features(),
            TrainedModel::OneClassSvm(m) => m.n_features(),
            TrainedModel::IsolationForest(m) => m.n_features(),
            TrainedModel::Mlp(m) => m.n_features(),
        }
    }

    fn inner(&self) -> &dyn Discriminator {
        match self {
            TrainedModel::RandomForest(m) => m,
            TrainedModel::GradientBoosting(m) => m,
            TrainedModel::OneClassSvm(m) => m,
            TrainedModel::IsolationForest(m) => m,
            TrainedModel::Mlp(m) => m,
        }
    }
}

impl Discriminator for TrainedModel {
    fn predict(&self, row: ArrayView1<f64>) -> bool {
        self.inner().predict(row)
    }

    fn predict_proba(&self, row: ArrayView1<f64>) -> Option<f64> {
        self.inner().predict_proba(row)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    /// `n` rows of N(center, 1) noise.
    pub fn genuine_cluster(n: usize, d: usize, center: f64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        let normal = Normal::new(center, 1.0).unwrap();
        Array2::from_shape_fn((n, d), |_| normal.sample(&mut rng))
    }

    /// `n` genuine rows around +2 (label 1) then `n` impostor rows around -2 (label 0).
    pub fn two_clusters(n: usize, d: usize) -> (Array2<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(11);
        let noise = Normal::new(0.0, 0.5).unwrap();
        let x = Array2::from_shape_fn((2 * n, d), |(i, _)| {
            let center = if i < n { 2.0 } else { -2.0 };
            center + noise.sample(&mut rng)
        });
        let y = (0..2 * n).map(|i| if i < n { 1.0 } else { 0.0 }).collect();
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_and_names() {
        let names: Vec<&str> = ModelKind::ALL.iter().map(|k| k.name()).collect();
        assert_eq!(
            names,
            vec![
                "RandomForest",
                "GradientBoosting",
                "OneClassSVM",
                "IsolationForest",
                "MLPClassifier"
            ]
        );
        assert!(ModelKind::RandomForest.needs_real_impostors());
        assert!(!ModelKind::Mlp.needs_real_impostors());
        assert!(!ModelKind::OneClassSvm.has_probability());
    }

    #[test]
    fn test_kind_serde_uses_display_names() {
        let json = serde_json::to_string(&ModelKind::OneClassSvm).unwrap();
        assert_eq!(json, "\"OneClassSVM\"");
        let kind: ModelKind = serde_json::from_str("\"MLPClassifier\"").unwrap();
        assert_eq!(kind, ModelKind::Mlp);
    }

    #[test]
    fn test_trained_model_roundtrip_keeps_predictions() {
        let x = test_support::genuine_cluster(30, 3, 0.0);
        let svm = OneClassSvm::fit(&x, &OneClassSvmParams::default()).unwrap();
        let model = TrainedModel::OneClassSvm(svm);

        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"algorithm\":\"OneClassSVM\""));
        let restored: TrainedModel = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.kind(), ModelKind::OneClassSvm);
        assert_eq!(restored.n_features(), 3);
        assert_eq!(restored.predict_batch(&x), model.predict_batch(&x));
    }
}
