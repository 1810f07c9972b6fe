use super::pipeline::select_best;
use super::*;
use crate::error::BioAuthError;
use crate::logic::dataset::fixtures::{labeled_captures, live_captures};
use crate::logic::dataset::DataSplit;
use crate::logic::model::{ModelKind, VariantStatus};
use crate::logic::store::{
    CaptureQuery, InMemoryModelStore, MemoryStore, ModelStore, SampleStore,
};

fn store_with(batches: Vec<Vec<crate::logic::dataset::NewCapture>>) -> MemoryStore {
    MemoryStore::from_captures(batches.into_iter().flatten().collect()).unwrap()
}

#[test]
fn test_full_dataset_user_trains_and_selects_one() {
    let store = store_with(vec![
        labeled_captures("alice", 0, 340),
        labeled_captures("bob", 2, 60),
        labeled_captures("carol", 4, 60),
    ]);
    let models = InMemoryModelStore::new();
    let config = TrainingConfig::fast();
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    let bundle = pipeline.train_user_model("alice").unwrap();
    let meta = &bundle.metadata;

    assert_eq!(meta.train_samples, 238);
    assert_eq!(meta.test_samples, 51);
    assert_eq!(meta.total_samples, 289);
    assert!(!meta.simulated_impostors);
    // 2 * 51 requested, capped by what bob and carol hold in their test splits
    let real_test: usize = ["bob", "carol"]
        .iter()
        .map(|u| store.captures(u, &CaptureQuery::split(DataSplit::Test)).unwrap().len())
        .sum();
    assert_eq!(meta.impostor_eval_samples, real_test);

    // every variant appears, in training order, exactly one selected
    let kinds: Vec<ModelKind> = meta.comparisons.iter().map(|c| c.algorithm).collect();
    assert_eq!(kinds, ModelKind::ALL.to_vec());
    assert_eq!(meta.comparisons.iter().filter(|c| c.selected).count(), 1);
    assert!(meta
        .comparisons
        .iter()
        .all(|c| c.status == VariantStatus::Trained));

    let selected = meta.comparisons.iter().find(|c| c.selected).unwrap();
    assert_eq!(selected.algorithm, meta.algorithm);
    assert_eq!(selected.metrics, Some(meta.metrics));
    for c in &meta.comparisons {
        let m = c.metrics.unwrap();
        assert!(m.accuracy <= meta.metrics.accuracy);
        for rate in [m.accuracy, m.far, m.frr, m.eer] {
            assert!((0.0..=1.0).contains(&rate));
        }
        let total = m.confusion.total() as f64;
        assert_eq!(m.accuracy, (m.confusion.tp + m.confusion.tn) as f64 / total);
    }

    assert!(bundle.version.starts_with(meta.algorithm.name()));
    let active = models.active_bundle("alice").unwrap().unwrap();
    assert_eq!(active.id, bundle.id);
}

#[test]
fn test_insufficient_training_data() {
    let store = store_with(vec![live_captures("alice", 0, 5)]);
    let models = InMemoryModelStore::new();
    let config = TrainingConfig::fast();
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    match pipeline.train_user_model("alice") {
        Err(BioAuthError::InsufficientTrainingData {
            required,
            available,
            ..
        }) => {
            assert_eq!(required, 10);
            assert_eq!(available, 5);
        }
        other => panic!("unexpected: {:?}", other.map(|b| b.version)),
    }
    assert!(models.active_bundle("alice").unwrap().is_none());
}

#[test]
fn test_unknown_user() {
    let store = store_with(vec![live_captures("alice", 0, 20)]);
    let models = InMemoryModelStore::new();
    let config = TrainingConfig::fast();
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    assert!(matches!(
        pipeline.train_user_model("mallory"),
        Err(BioAuthError::UnknownUser(_))
    ));
}

#[test]
fn test_unlabeled_user_falls_back_to_random_split() {
    let store = store_with(vec![
        live_captures("dave", 1, 20),
        labeled_captures("bob", 3, 40),
    ]);
    let models = InMemoryModelStore::new();
    let config = TrainingConfig::fast();
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    let (train, test) = pipeline.load_split("dave").unwrap();
    assert_eq!((train.len(), test.len()), (14, 6));

    let bundle = pipeline.train_user_model("dave").unwrap();
    assert_eq!(bundle.metadata.train_samples, 14);
    assert_eq!(bundle.metadata.test_samples, 6);
}

#[test]
fn test_train_split_without_test_split() {
    let captures: Vec<_> = live_captures("erin", 1, 20)
        .into_iter()
        .map(|c| c.with_split(DataSplit::Train))
        .collect();
    let store = store_with(vec![captures]);
    let models = InMemoryModelStore::new();
    let config = TrainingConfig::fast();
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    let (train, test) = pipeline.load_split("erin").unwrap();
    assert_eq!((train.len(), test.len()), (14, 6));
}

#[test]
fn test_lone_user_simulates_impostors_and_skips_supervised() {
    let store = store_with(vec![labeled_captures("solo", 0, 60)]);
    let models = InMemoryModelStore::new();
    let config = TrainingConfig::fast();
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    let bundle = pipeline.train_user_model("solo").unwrap();
    let meta = &bundle.metadata;

    assert!(meta.simulated_impostors);
    assert_eq!(meta.comparisons.len(), 5);
    for kind in [ModelKind::RandomForest, ModelKind::GradientBoosting] {
        let row = meta.comparisons.iter().find(|c| c.algorithm == kind).unwrap();
        assert!(matches!(row.status, VariantStatus::Skipped { .. }));
        assert!(row.metrics.is_none());
        assert!(!row.selected);
    }
    assert!(!meta.algorithm.needs_real_impostors());
}

#[test]
fn test_all_models_failed() {
    let store = store_with(vec![labeled_captures("solo", 0, 40)]);
    let models = InMemoryModelStore::new();
    let mut config = TrainingConfig::fast();
    config.one_class_svm.nu = 0.0;
    config.isolation_forest.contamination = 0.0;
    config.synthetic_jitter = (1.0, 1.0);
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    assert!(matches!(
        pipeline.train_user_model("solo"),
        Err(BioAuthError::AllModelsFailed { .. })
    ));
    assert!(models.active_bundle("solo").unwrap().is_none());
}

#[test]
fn test_retraining_supersedes_previous_bundle() {
    let store = store_with(vec![labeled_captures("solo", 0, 40)]);
    let models = InMemoryModelStore::new();
    let config = TrainingConfig::fast();
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    let first = pipeline.train_user_model("solo").unwrap();
    let second = pipeline.train_user_model("solo").unwrap();
    assert_ne!(first.id, second.id);

    let summaries = models.list_bundles("solo").unwrap();
    assert_eq!(summaries.len(), 2);
    let active: Vec<_> = summaries.iter().filter(|s| s.is_active).collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
}

#[test]
fn test_train_all_collects_failures() {
    let store = store_with(vec![
        labeled_captures("alice", 0, 40),
        live_captures("newbie", 1, 3),
        labeled_captures("bob", 3, 40),
    ]);
    let models = InMemoryModelStore::new();
    let config = TrainingConfig::fast();
    let pipeline = TrainingPipeline::new(&store, &store, &models, &config);

    let report = pipeline.train_all().unwrap();
    let trained: Vec<&str> = report.trained.iter().map(|s| s.user_id.as_str()).collect();
    assert_eq!(trained, vec!["alice", "bob"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].user_id, "newbie");
    assert_eq!(store.count("newbie").unwrap(), 3);
}

#[test]
fn test_select_best_prefers_earliest_on_ties() {
    assert_eq!(select_best(&[None, Some(0.9), Some(0.95), Some(0.95)]), Some(2));
    assert_eq!(select_best(&[Some(0.5), Some(0.5)]), Some(0));
    assert_eq!(select_best(&[None, None]), None);
}
