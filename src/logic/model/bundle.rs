//! Model Bundle - the persisted unit of a trained user model
//!
//! Discriminator + normalizer + training metadata. Bundles are immutable
//! once built; retraining produces a new bundle and the store flips which
//! one is active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Discriminator, ModelKind, Normalizer, TrainedModel};
use crate::error::{BioAuthError, Result};
use crate::logic::evaluation::EvaluationMetrics;
use crate::logic::features::{FeatureVector, LayoutInfo, FEATURE_COUNT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VariantStatus {
    Trained,
    Skipped { reason: String },
    Failed { error: String },
}

/// One row of the per-variant comparison table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantComparison {
    pub algorithm: ModelKind,
    pub status: VariantStatus,
    /// `None` unless the variant trained
    pub metrics: Option<EvaluationMetrics>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub algorithm: ModelKind,
    pub metrics: EvaluationMetrics,
    pub comparisons: Vec<VariantComparison>,
    pub train_samples: usize,
    pub test_samples: usize,
    pub total_samples: usize,
    pub impostor_eval_samples: usize,
    /// Evaluation impostors were synthesized, not drawn from other users
    pub simulated_impostors: bool,
    pub layout: LayoutInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub id: String,
    pub user_id: String,
    /// `<Algorithm>_<YYYYmmdd_HHMMSS>`
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub model: TrainedModel,
    pub normalizer: Normalizer,
    pub metadata: BundleMetadata,
    /// SHA-256 of the serialized model and normalizer
    pub checksum: String,
}

/// Listing view of a bundle, without the model itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleSummary {
    pub id: String,
    pub user_id: String,
    pub version: String,
    pub algorithm: ModelKind,
    pub accuracy: f64,
    pub far: f64,
    pub frr: f64,
    pub eer: f64,
    pub total_samples: usize,
    pub simulated_impostors: bool,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Raw model output for one vector, before thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelOutput {
    pub is_genuine: bool,
    pub probability: Option<f64>,
}

pub fn version_string(kind: ModelKind, at: DateTime<Utc>) -> String {
    format!("{}_{}", kind.name(), at.format("%Y%m%d_%H%M%S"))
}

impl ModelBundle {
    pub fn new(
        user_id: &str,
        model: TrainedModel,
        normalizer: Normalizer,
        metadata: BundleMetadata,
    ) -> Result<Self> {
        let created_at = Utc::now();
        let checksum = Self::compute_checksum(&model, &normalizer)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            version: version_string(model.kind(), created_at),
            created_at,
            model,
            normalizer,
            metadata,
            checksum,
        })
    }

    pub fn compute_checksum(model: &TrainedModel, normalizer: &Normalizer) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(model)?);
        hasher.update(serde_json::to_vec(normalizer)?);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Layout, width and checksum checks for a bundle loaded from storage.
    pub fn verify(&self) -> Result<()> {
        self.metadata.layout.validate()?;

        for width in [self.model.n_features(), self.normalizer.width()] {
            if width != FEATURE_COUNT {
                return Err(BioAuthError::FeatureDimensionMismatch {
                    expected: FEATURE_COUNT,
                    actual: width,
                });
            }
        }

        if Self::compute_checksum(&self.model, &self.normalizer)? != self.checksum {
            return Err(BioAuthError::ChecksumMismatch {
                bundle_id: self.id.clone(),
            });
        }
        Ok(())
    }

    pub fn algorithm(&self) -> ModelKind {
        self.model.kind()
    }

    /// Normalize with the bundle's own normalizer and run the model.
    pub fn decide(&self, vector: &FeatureVector) -> Result<ModelOutput> {
        let row = self.normalizer.transform_vector(vector)?;
        Ok(ModelOutput {
            is_genuine: self.model.predict(row.view()),
            probability: self
                .algorithm()
                .has_probability()
                .then(|| self.model.predict_proba(row.view()))
                .flatten(),
        })
    }

    pub fn summary(&self, is_active: bool) -> BundleSummary {
        BundleSummary {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            version: self.version.clone(),
            algorithm: self.algorithm(),
            accuracy: self.metadata.metrics.accuracy,
            far: self.metadata.metrics.far,
            frr: self.metadata.metrics.frr,
            eer: self.metadata.metrics.eer,
            total_samples: self.metadata.total_samples,
            simulated_impostors: self.metadata.simulated_impostors,
            created_at: self.created_at,
            is_active,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::logic::evaluation::{ConfusionCounts, EvaluationMetrics};
    use crate::logic::model::test_support::genuine_cluster;
    use crate::logic::model::{IsolationForest, IsolationForestParams};

    /// A small but real bundle for store tests.
    pub fn sample_bundle(user_id: &str) -> ModelBundle {
        let x = genuine_cluster(20, FEATURE_COUNT, 0.0);
        let normalizer = Normalizer::fit(&x).unwrap();
        let scaled = normalizer.transform(&x).unwrap();
        let params = IsolationForestParams {
            n_trees: 5,
            ..IsolationForestParams::default()
        };
        let model = TrainedModel::IsolationForest(IsolationForest::fit(&scaled, &params).unwrap());
        let metrics = EvaluationMetrics::from_counts(ConfusionCounts {
            tp: 5,
            fn_: 1,
            fp: 2,
            tn: 10,
        });
        let metadata = BundleMetadata {
            algorithm: ModelKind::IsolationForest,
            metrics,
            comparisons: vec![VariantComparison {
                algorithm: ModelKind::IsolationForest,
                status: VariantStatus::Trained,
                metrics: Some(metrics),
                selected: true,
            }],
            train_samples: 14,
            test_samples: 6,
            total_samples: 20,
            impostor_eval_samples: 12,
            simulated_impostors: false,
            layout: LayoutInfo::current(),
        };
        ModelBundle::new(user_id, model, normalizer, metadata).unwrap()
    }
}
