use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::synthetic::synthetic_impostors;
use super::TrainingConfig;
use crate::error::{BioAuthError, ModelError, Result};
use crate::logic::dataset::{fallback_split, DataSplit, StoredCapture};
use crate::logic::evaluation::{evaluate, EvaluationMetrics, ImpostorSampler};
use crate::logic::features::{self, FeatureVector, LayoutInfo};
use crate::logic::model::{
    to_matrix, BundleMetadata, BundleSummary, GradientBoosting, IsolationForest, MlpClassifier,
    ModelBundle, ModelKind, Normalizer, OneClassSvm, RandomForest, TrainedModel,
    VariantComparison, VariantStatus,
};
use crate::logic::store::{CaptureQuery, ModelStore, SampleStore, UserDirectory};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Result of fitting one variant
enum VariantOutcome {
    Trained(TrainedModel),
    Skipped(String),
}

struct Candidate {
    kind: ModelKind,
    result: std::result::Result<(TrainedModel, EvaluationMetrics), VariantStatus>,
}

/// Normalized matrices shared by every variant
struct TrainingData {
    x_train: Array2<f64>,
    x_test: Array2<f64>,
    /// Real impostors from other users' train split, normalized
    impostors_train: Array2<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingFailure {
    pub user_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainAllReport {
    pub trained: Vec<BundleSummary>,
    pub failures: Vec<TrainingFailure>,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct TrainingPipeline<'a> {
    samples: &'a dyn SampleStore,
    users: &'a dyn UserDirectory,
    models: &'a dyn ModelStore,
    config: &'a TrainingConfig,
}

impl<'a> TrainingPipeline<'a> {
    pub fn new(
        samples: &'a dyn SampleStore,
        users: &'a dyn UserDirectory,
        models: &'a dyn ModelStore,
        config: &'a TrainingConfig,
    ) -> Self {
        Self {
            samples,
            users,
            models,
            config,
        }
    }

    fn vectors(captures: &[StoredCapture]) -> Vec<FeatureVector> {
        features::extract_all(captures.iter().map(|c| &c.capture))
    }

    /// Train/test vectors for `user_id`.
    ///
    /// Split labels win; without train labels all training captures are
    /// split 70/30 (seed 42), and without test labels the train set is.
    pub fn load_split(&self, user_id: &str) -> Result<(Vec<FeatureVector>, Vec<FeatureVector>)> {
        let required = self.config.min_training_samples;
        let train = self
            .samples
            .captures(user_id, &CaptureQuery::split(DataSplit::Train))?;

        if train.is_empty() {
            let all = self.samples.captures(user_id, &CaptureQuery::training())?;
            if all.len() < required {
                return Err(BioAuthError::InsufficientTrainingData {
                    user_id: user_id.to_string(),
                    required,
                    available: all.len(),
                });
            }
            log::info!(
                "{} has no split labels; random 70/30 split of {} captures",
                user_id,
                all.len()
            );
            return Ok(fallback_split(Self::vectors(&all)));
        }

        if train.len() < required {
            return Err(BioAuthError::InsufficientTrainingData {
                user_id: user_id.to_string(),
                required,
                available: train.len(),
            });
        }

        let test = self
            .samples
            .captures(user_id, &CaptureQuery::split(DataSplit::Test))?;
        if test.is_empty() {
            log::info!("{} has no test split; holding out 30% of train", user_id);
            return Ok(fallback_split(Self::vectors(&train)));
        }

        Ok((Self::vectors(&train), Self::vectors(&test)))
    }

    pub fn train_user_model(&self, user_id: &str) -> Result<ModelBundle> {
        if !self.users.user_ids()?.iter().any(|u| u == user_id) {
            return Err(BioAuthError::UnknownUser(user_id.to_string()));
        }

        let (train_vectors, test_vectors) = self.load_split(user_id)?;
        log::info!(
            "Training {}: {} train / {} test vectors",
            user_id,
            train_vectors.len(),
            test_vectors.len()
        );

        let normalizer = Normalizer::fit(&to_matrix(&train_vectors))?;
        let x_train = normalizer.transform(&to_matrix(&train_vectors))?;
        let x_test = normalizer.transform(&to_matrix(&test_vectors))?;

        let sampler = ImpostorSampler::new(self.samples, self.users);
        let train_impostors = sampler.sample(
            user_id,
            x_train.nrows() / 2,
            DataSplit::Train,
            self.config.training_impostor_users,
        )?;
        let impostors_train = normalizer.transform(&to_matrix(&train_impostors))?;

        let eval_impostors = sampler.evaluation_set(
            user_id,
            &normalizer,
            &x_test,
            self.config.evaluation_impostor_users,
        )?;

        let data = TrainingData {
            x_train,
            x_test,
            impostors_train,
        };

        let mut candidates = Vec::with_capacity(ModelKind::ALL.len());
        for kind in ModelKind::ALL {
            let result = match self.fit_variant(kind, &data) {
                Ok(VariantOutcome::Trained(model)) => {
                    let metrics = evaluate(&model, &data.x_test, &eval_impostors.matrix);
                    log::info!(
                        "{} trained for {}: acc={:.4} far={:.4} frr={:.4}",
                        kind,
                        user_id,
                        metrics.accuracy,
                        metrics.far,
                        metrics.frr
                    );
                    Ok((model, metrics))
                }
                Ok(VariantOutcome::Skipped(reason)) => {
                    log::warn!("{} skipped for {}: {}", kind, user_id, reason);
                    Err(VariantStatus::Skipped { reason })
                }
                Err(e) => {
                    log::error!("{} failed for {}: {}", kind, user_id, e);
                    Err(VariantStatus::Failed {
                        error: e.to_string(),
                    })
                }
            };
            candidates.push(Candidate { kind, result });
        }

        let accuracies: Vec<Option<f64>> = candidates
            .iter()
            .map(|c| c.result.as_ref().ok().map(|(_, m)| m.accuracy))
            .collect();
        let Some(best) = select_best(&accuracies) else {
            log::error!("All model variants failed for {}", user_id);
            return Err(BioAuthError::AllModelsFailed {
                user_id: user_id.to_string(),
            });
        };

        let comparisons = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| match &c.result {
                Ok((_, metrics)) => VariantComparison {
                    algorithm: c.kind,
                    status: VariantStatus::Trained,
                    metrics: Some(*metrics),
                    selected: i == best,
                },
                Err(status) => VariantComparison {
                    algorithm: c.kind,
                    status: status.clone(),
                    metrics: None,
                    selected: false,
                },
            })
            .collect();

        let (model, metrics) = match candidates.swap_remove(best).result {
            Ok(winner) => winner,
            Err(_) => {
                return Err(BioAuthError::AllModelsFailed {
                    user_id: user_id.to_string(),
                })
            }
        };

        let metadata = BundleMetadata {
            algorithm: model.kind(),
            metrics,
            comparisons,
            train_samples: train_vectors.len(),
            test_samples: test_vectors.len(),
            total_samples: train_vectors.len() + test_vectors.len(),
            impostor_eval_samples: eval_impostors.matrix.nrows(),
            simulated_impostors: eval_impostors.simulated,
            layout: LayoutInfo::current(),
        };

        let bundle = ModelBundle::new(user_id, model, normalizer, metadata)?;
        log::info!(
            "Selected {} for {} (accuracy {:.4}, simulated impostors: {})",
            bundle.version,
            user_id,
            bundle.metadata.metrics.accuracy,
            bundle.metadata.simulated_impostors
        );

        self.models.activate(bundle.clone())?;
        Ok(bundle)
    }

    fn fit_variant(
        &self,
        kind: ModelKind,
        data: &TrainingData,
    ) -> std::result::Result<VariantOutcome, ModelError> {
        let config = self.config;
        if kind.needs_real_impostors() && data.impostors_train.nrows() < config.min_supervised_impostors {
            return Ok(VariantOutcome::Skipped(format!(
                "not enough impostor data ({} < {})",
                data.impostors_train.nrows(),
                config.min_supervised_impostors
            )));
        }

        let model = match kind {
            ModelKind::RandomForest | ModelKind::GradientBoosting => {
                let (x, y) = labeled(&data.x_train, &data.impostors_train)?;
                if kind == ModelKind::RandomForest {
                    TrainedModel::RandomForest(RandomForest::fit(&x, &y, &config.random_forest)?)
                } else {
                    TrainedModel::GradientBoosting(GradientBoosting::fit(
                        &x,
                        &y,
                        &config.gradient_boosting,
                    )?)
                }
            }
            ModelKind::OneClassSvm => {
                TrainedModel::OneClassSvm(OneClassSvm::fit(&data.x_train, &config.one_class_svm)?)
            }
            ModelKind::IsolationForest => TrainedModel::IsolationForest(IsolationForest::fit(
                &data.x_train,
                &config.isolation_forest,
            )?),
            ModelKind::Mlp => {
                let synthetic = synthetic_impostors(&data.x_train, config)?;
                let (x, y) = labeled(&data.x_train, &synthetic)?;
                TrainedModel::Mlp(MlpClassifier::fit(&x, &y, &config.mlp)?)
            }
        };
        Ok(VariantOutcome::Trained(model))
    }

    /// Train every user in directory order. Per-user failures are collected.
    pub fn train_all(&self) -> Result<TrainAllReport> {
        let mut report = TrainAllReport::default();

        for user_id in self.users.user_ids()? {
            match self.train_user_model(&user_id) {
                Ok(bundle) => report.trained.push(bundle.summary(true)),
                Err(e) => {
                    log::warn!("Training failed for {}: {}", user_id, e);
                    report.failures.push(TrainingFailure {
                        user_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "Trained {} users, {} failures",
            report.trained.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// Index of the highest accuracy; the earliest entry wins ties.
pub(crate) fn select_best(accuracies: &[Option<f64>]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, accuracy) in accuracies.iter().enumerate() {
        if let Some(acc) = *accuracy {
            if best.map_or(true, |(_, current)| acc > current) {
                best = Some((i, acc));
            }
        }
    }
    best.map(|(i, _)| i)
}

/// Stack genuine rows (label 1) over impostor rows (label 0).
fn labeled(
    genuine: &Array2<f64>,
    impostors: &Array2<f64>,
) -> std::result::Result<(Array2<f64>, Vec<f64>), ModelError> {
    let x = concatenate(Axis(0), &[genuine.view(), impostors.view()])
        .map_err(|e| ModelError::Other(format!("cannot stack training rows: {}", e)))?;
    let y = std::iter::repeat(1.0)
        .take(genuine.nrows())
        .chain(std::iter::repeat(0.0).take(impostors.nrows()))
        .collect();
    Ok((x, y))
}
