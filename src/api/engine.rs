//! Engine facade
//!
//! Everything a host calls: feature extraction, training, scoring, the login
//! flow with lockout and live monitoring. Persistence stays behind the store
//! traits, shared via `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::engine_status::{EngineStatus, LoginResult, LoginStatus, UserStatus};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::logic::auth::{AttemptOutcome, CollectionStatus, LockoutState, ScoreOutcome, Scorer};
use crate::logic::dataset::{NewCapture, RawKeystrokeCapture};
use crate::logic::features::{self, FeatureVector, LayoutInfo};
use crate::logic::model::{ModelBundle, ThresholdConfig};
use crate::logic::monitoring::{FeedEntry, MonitoringState};
use crate::logic::store::{
    AccountStore, InMemoryModelStore, MemoryStore, ModelStore, SampleStore, SettingsSource,
    UserDirectory,
};
use crate::logic::training::{TrainAllReport, TrainingPipeline};

// ============================================================================
// COLLABORATORS
// ============================================================================

#[derive(Clone)]
pub struct EngineStores {
    pub samples: Arc<dyn SampleStore>,
    pub users: Arc<dyn UserDirectory>,
    pub models: Arc<dyn ModelStore>,
    pub settings: Arc<dyn SettingsSource>,
    pub accounts: Arc<dyn AccountStore>,
}

impl EngineStores {
    /// Host data in `store`, bundles in `models`.
    pub fn with_models(store: Arc<MemoryStore>, models: Arc<dyn ModelStore>) -> Self {
        Self {
            samples: store.clone(),
            users: store.clone(),
            models,
            settings: store.clone(),
            accounts: store,
        }
    }

    pub fn in_memory(store: Arc<MemoryStore>) -> Self {
        Self::with_models(store, Arc::new(InMemoryModelStore::new()))
    }
}

/// One login attempt as seen by the core
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub user_id: String,
    pub session_id: String,
    /// Outcome of the host's password check
    pub credentials_valid: bool,
    pub capture: Option<RawKeystrokeCapture>,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct BioAuthEngine {
    stores: EngineStores,
    config: EngineConfig,
    monitor: MonitoringState,
    /// One mutex per user; lockout state is read, updated and written under it
    account_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BioAuthEngine {
    pub fn new(stores: EngineStores, config: EngineConfig) -> Self {
        let monitor = MonitoringState::new(config.live_feed_capacity);
        Self {
            stores,
            config,
            monitor,
            account_locks: Mutex::new(HashMap::new()),
        }
    }

    fn account_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.account_locks
            .lock()
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    fn scorer(&self) -> Scorer<'_> {
        Scorer {
            samples: self.stores.samples.as_ref(),
            models: self.stores.models.as_ref(),
            settings: self.stores.settings.as_ref(),
            default_thresholds: self.config.default_thresholds,
        }
    }

    fn pipeline(&self) -> TrainingPipeline<'_> {
        TrainingPipeline::new(
            self.stores.samples.as_ref(),
            self.stores.users.as_ref(),
            self.stores.models.as_ref(),
            &self.config.training,
        )
    }

    // ------------------------------------------------------------------------
    // Features & training
    // ------------------------------------------------------------------------

    pub fn extract_features(&self, capture: &RawKeystrokeCapture) -> FeatureVector {
        features::extract(capture)
    }

    pub fn train_user_model(&self, user_id: &str) -> Result<ModelBundle> {
        self.pipeline().train_user_model(user_id)
    }

    pub fn train_all(&self) -> Result<TrainAllReport> {
        self.pipeline().train_all()
    }

    // ------------------------------------------------------------------------
    // Scoring
    // ------------------------------------------------------------------------

    /// Score without storing the capture or touching the account.
    pub fn score_authentication(
        &self,
        user_id: &str,
        capture: &RawKeystrokeCapture,
    ) -> Result<ScoreOutcome> {
        let outcome = self.scorer().score(user_id, capture, None)?;
        if let ScoreOutcome::Decision(decision) = &outcome {
            self.monitor.record(user_id, decision);
        }
        Ok(outcome)
    }

    pub fn authenticate(&self, request: LoginRequest) -> Result<LoginResult> {
        self.authenticate_at(request, Utc::now())
    }

    /// Login flow: credentials, lock, capture storage, scoring, lockout update.
    /// Attempts for the same user are serialized.
    pub fn authenticate_at(&self, request: LoginRequest, now: DateTime<Utc>) -> Result<LoginResult> {
        let user_id = request.user_id.as_str();
        let account = self.account_lock(user_id);
        let _guard = account.lock();

        if !request.credentials_valid {
            let lockout = self.count_credential_failure(user_id, now)?;
            return Ok(Self::result(LoginStatus::InvalidCredentials, lockout));
        }

        let mut state = self.refreshed_lockout(user_id, now)?;
        if state.is_locked() {
            log::warn!("Login refused for {}: locked until {:?}", user_id, state.locked_until);
            return Ok(Self::result(LoginStatus::Locked, state));
        }

        let Some(capture) = request.capture else {
            state.record_success();
            self.stores.accounts.put_lockout_state(user_id, state)?;
            log::info!("Password-only login for {}", user_id);
            return Ok(Self::result(LoginStatus::PasswordOnly, state));
        };

        let stored = self.stores.samples.insert(NewCapture::live(
            user_id,
            &request.session_id,
            capture.clone(),
        ))?;

        let mut result = match self.scorer().score(user_id, &capture, Some(stored.id))? {
            ScoreOutcome::NoActiveModel(collection) => {
                state.record_success();
                LoginResult {
                    collection: Some(collection),
                    ..Self::result(LoginStatus::ModelMissing, state)
                }
            }
            ScoreOutcome::Decision(decision) => {
                self.monitor.record(user_id, &decision);
                let outcome = AttemptOutcome::from_decision(decision.is_genuine, decision.access_denied);
                state.record(outcome, now, &self.config.lockout);

                let status = if decision.access_denied {
                    LoginStatus::Denied
                } else if decision.anomaly {
                    LoginStatus::Flagged
                } else {
                    LoginStatus::Granted
                };
                LoginResult {
                    decision: Some(decision),
                    ..Self::result(status, state)
                }
            }
        };

        self.stores.accounts.put_lockout_state(user_id, state)?;
        result.capture_id = Some(stored.id);
        Ok(result)
    }

    fn result(status: LoginStatus, lockout: LockoutState) -> LoginResult {
        LoginResult {
            status,
            decision: None,
            collection: None,
            lockout,
            capture_id: None,
        }
    }

    // ------------------------------------------------------------------------
    // Lockout hooks
    // ------------------------------------------------------------------------

    pub fn check_lockout(&self, user_id: &str) -> Result<LockoutState> {
        self.check_lockout_at(user_id, Utc::now())
    }

    /// Current state, with an expired lock lifted and persisted.
    pub fn check_lockout_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<LockoutState> {
        let account = self.account_lock(user_id);
        let _guard = account.lock();
        self.refreshed_lockout(user_id, now)
    }

    fn refreshed_lockout(&self, user_id: &str, now: DateTime<Utc>) -> Result<LockoutState> {
        let mut state = self.stores.accounts.lockout_state(user_id)?;
        if state.refresh(now) {
            log::info!("Lock expired for {}", user_id);
            self.stores.accounts.put_lockout_state(user_id, state)?;
        }
        Ok(state)
    }

    pub fn record_credential_failure(&self, user_id: &str) -> Result<LockoutState> {
        self.record_credential_failure_at(user_id, Utc::now())
    }

    pub fn record_credential_failure_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LockoutState> {
        let account = self.account_lock(user_id);
        let _guard = account.lock();
        self.count_credential_failure(user_id, now)
    }

    fn count_credential_failure(&self, user_id: &str, now: DateTime<Utc>) -> Result<LockoutState> {
        let mut state = self.stores.accounts.lockout_state(user_id)?;
        state.record_failure(now, &self.config.lockout);
        self.stores.accounts.put_lockout_state(user_id, state)?;
        log::warn!(
            "Credential failure for {} ({} consecutive)",
            user_id,
            state.failed_attempts
        );
        Ok(state)
    }

    // ------------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------------

    pub fn keystroke_status(&self, user_id: &str) -> Result<CollectionStatus> {
        let collected = self.stores.samples.count(user_id)?;
        let active = self.stores.models.active_bundle(user_id)?;
        Ok(CollectionStatus::new(collected, active.map(|b| b.version.clone())))
    }

    pub fn user_status(&self, user_id: &str) -> Result<UserStatus> {
        Ok(UserStatus {
            user_id: user_id.to_string(),
            collection: self.keystroke_status(user_id)?,
            lockout: self.check_lockout(user_id)?,
            bundle_count: self.stores.models.list_bundles(user_id)?.len(),
        })
    }

    pub fn status(&self) -> Result<EngineStatus> {
        let layout = LayoutInfo::current();
        Ok(EngineStatus {
            app_version: crate::constants::APP_VERSION.to_string(),
            feature_version: layout.version,
            layout_hash: layout.hash,
            feature_count: layout.feature_count,
            thresholds: ThresholdConfig::from_settings(
                self.stores.settings.as_ref(),
                self.config.default_thresholds,
            )?,
            monitoring: self.monitor.status(),
        })
    }

    // ------------------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------------------

    pub fn start_monitoring(&self) -> bool {
        self.monitor.start()
    }

    pub fn stop_monitoring(&self) -> bool {
        self.monitor.stop()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_active()
    }

    pub fn live_feed(&self, limit: usize) -> Vec<FeedEntry> {
        self.monitor.feed(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::error::BioAuthError;
    use crate::logic::auth::{AccountStatus, LockoutPolicy};
    use crate::logic::dataset::fixtures::typing_profile;
    use crate::logic::evaluation::{ConfusionCounts, EvaluationMetrics};
    use crate::logic::features::FEATURE_COUNT;
    use crate::logic::model::{
        to_matrix, BundleMetadata, ModelKind, Normalizer, RandomForest, RandomForestParams,
        TrainedModel, VariantComparison, VariantStatus,
    };

    fn engine() -> (BioAuthEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig {
            live_feed_capacity: 10,
            ..EngineConfig::default()
        };
        (BioAuthEngine::new(EngineStores::in_memory(store.clone()), config), store)
    }

    /// Forest separating typing profile 0 (genuine) from profile 5.
    fn separated_bundle(user_id: &str) -> ModelBundle {
        let genuine = features::extract_all(typing_profile(0, 40).iter());
        let impostor = features::extract_all(typing_profile(5, 40).iter());
        let all: Vec<FeatureVector> = genuine.iter().chain(impostor.iter()).cloned().collect();

        let normalizer = Normalizer::fit(&to_matrix(&all)).unwrap();
        let x = normalizer.transform(&to_matrix(&all)).unwrap();
        let y: Vec<f64> = (0..all.len()).map(|i| if i < 40 { 1.0 } else { 0.0 }).collect();
        let params = RandomForestParams {
            n_trees: 20,
            max_depth: 8,
            ..RandomForestParams::default()
        };
        let model = TrainedModel::RandomForest(RandomForest::fit(&x, &y, &params).unwrap());

        let metrics = EvaluationMetrics::from_counts(ConfusionCounts {
            tp: 12,
            fn_: 0,
            fp: 0,
            tn: 24,
        });
        let metadata = BundleMetadata {
            algorithm: ModelKind::RandomForest,
            metrics,
            comparisons: vec![VariantComparison {
                algorithm: ModelKind::RandomForest,
                status: VariantStatus::Trained,
                metrics: Some(metrics),
                selected: true,
            }],
            train_samples: 28,
            test_samples: 12,
            total_samples: 40,
            impostor_eval_samples: 24,
            simulated_impostors: false,
            layout: LayoutInfo::current(),
        };
        ModelBundle::new(user_id, model, normalizer, metadata).unwrap()
    }

    fn login(user_id: &str, capture: Option<RawKeystrokeCapture>) -> LoginRequest {
        LoginRequest {
            user_id: user_id.to_string(),
            session_id: "s1".to_string(),
            credentials_valid: true,
            capture,
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_extract_features_width() {
        let (engine, _) = engine();
        let v = engine.extract_features(&RawKeystrokeCapture::default());
        assert_eq!(v.as_slice(), &[0.0; FEATURE_COUNT][..]);
    }

    #[test]
    fn test_cold_start_login_collects() {
        let (engine, store) = engine();
        let capture = typing_profile(0, 1).remove(0);

        let result = engine.authenticate_at(login("newbie", Some(capture)), t0()).unwrap();
        assert_eq!(result.status, LoginStatus::ModelMissing);
        assert!(result.status.is_success());

        let collection = result.collection.unwrap();
        assert_eq!(collection.samples_collected, 1);
        assert_eq!(collection.samples_needed, 340);
        assert!(!collection.model_ready);
        assert!(!collection.model_exists);

        assert_eq!(store.count("newbie").unwrap(), 1);
        let stored = store.capture(result.capture_id.unwrap()).unwrap();
        assert!(stored.is_training_data);
        assert!(stored.data_split.is_none());
        assert!(stored.anomaly_score.is_none());
        assert_eq!(result.lockout.failed_attempts, 0);
    }

    #[test]
    fn test_genuine_login_granted_and_annotated() {
        let (engine, store) = engine();
        engine.stores.models.activate(separated_bundle("alice")).unwrap();
        engine.record_credential_failure_at("alice", t0()).unwrap();

        let capture = typing_profile(0, 3).remove(2);
        let result = engine.authenticate_at(login("alice", Some(capture)), t0()).unwrap();

        let decision = result.decision.unwrap();
        assert!(decision.is_genuine);
        assert!(!decision.access_denied);
        assert_eq!(decision.algorithm, ModelKind::RandomForest);
        assert_eq!(result.lockout.failed_attempts, 0);

        let stored = store.capture(result.capture_id.unwrap()).unwrap();
        assert_eq!(stored.anomaly_score, Some(decision.confidence));
    }

    #[test]
    fn test_three_denials_lock_account() {
        let (engine, _) = engine();
        engine.stores.models.activate(separated_bundle("alice")).unwrap();

        let impostor = typing_profile(5, 3);
        let mut last = None;
        for capture in impostor {
            let result = engine.authenticate_at(login("alice", Some(capture)), t0()).unwrap();
            assert_eq!(result.status, LoginStatus::Denied);
            assert!(result.decision.as_ref().unwrap().access_denied);
            last = Some(result);
        }

        let lockout = last.unwrap().lockout;
        assert_eq!(lockout.status, AccountStatus::Locked);
        assert_eq!(lockout.failed_attempts, 3);
        assert_eq!(lockout.locked_until, Some(t0() + Duration::minutes(30)));

        // even a genuine sample is refused while locked
        let genuine = typing_profile(0, 1).remove(0);
        let result = engine
            .authenticate_at(login("alice", Some(genuine)), t0() + Duration::minutes(5))
            .unwrap();
        assert_eq!(result.status, LoginStatus::Locked);
        assert!(result.decision.is_none());
    }

    #[test]
    fn test_lock_expires() {
        let (engine, store) = engine();
        for _ in 0..3 {
            engine.record_credential_failure_at("bob", t0()).unwrap();
        }
        assert!(engine.check_lockout_at("bob", t0()).unwrap().is_locked());

        let later = t0() + Duration::minutes(31);
        let state = engine.check_lockout_at("bob", later).unwrap();
        assert_eq!(state.status, AccountStatus::Active);
        assert_eq!(state.failed_attempts, 0);
        assert_eq!(store.lockout_state("bob").unwrap(), state);
    }

    #[test]
    fn test_lockout_policy_from_config() {
        let store = Arc::new(MemoryStore::new());
        let config = EngineConfig {
            lockout: LockoutPolicy {
                max_failed_attempts: 2,
                lockout_duration: Duration::minutes(5),
            },
            ..EngineConfig::default()
        };
        let engine = BioAuthEngine::new(EngineStores::in_memory(store), config);

        engine.record_credential_failure_at("erin", t0()).unwrap();
        let state = engine.record_credential_failure_at("erin", t0()).unwrap();
        assert!(state.is_locked());
        assert_eq!(state.locked_until, Some(t0() + Duration::minutes(5)));
    }

    #[test]
    fn test_concurrent_failures_all_counted() {
        let (engine, store) = engine();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let engine = &engine;
                scope.spawn(move || {
                    let mut request = login("dave", None);
                    request.session_id = format!("s{}", i);
                    request.credentials_valid = false;
                    engine.authenticate_at(request, t0()).unwrap();
                });
            }
        });

        let state = store.lockout_state("dave").unwrap();
        assert_eq!(state.failed_attempts, 8);
        assert_eq!(state.status, AccountStatus::Locked);
    }

    #[test]
    fn test_non_finite_capture_not_scored() {
        let (engine, store) = engine();
        engine.stores.models.activate(separated_bundle("alice")).unwrap();

        let mut capture = typing_profile(0, 1).remove(0);
        capture.typing_speed = f64::INFINITY;

        let err = engine.score_authentication("alice", &capture).unwrap_err();
        assert!(matches!(err, BioAuthError::NonFiniteFeatures { .. }));
        assert!(engine.authenticate_at(login("alice", Some(capture)), t0()).is_err());
        assert_eq!(store.lockout_state("alice").unwrap().failed_attempts, 0);
    }

    #[test]
    fn test_invalid_credentials_counted() {
        let (engine, _) = engine();
        let mut request = login("carol", None);
        request.credentials_valid = false;

        let result = engine.authenticate_at(request, t0()).unwrap();
        assert_eq!(result.status, LoginStatus::InvalidCredentials);
        assert_eq!(result.lockout.failed_attempts, 1);
        assert!(!result.status.is_success());
    }

    #[test]
    fn test_password_only_resets_failures() {
        let (engine, _) = engine();
        engine.record_credential_failure_at("carol", t0()).unwrap();

        let result = engine.authenticate_at(login("carol", None), t0()).unwrap();
        assert_eq!(result.status, LoginStatus::PasswordOnly);
        assert_eq!(result.lockout.failed_attempts, 0);
        assert!(result.capture_id.is_none());
    }

    #[test]
    fn test_monitoring_feed_records_decisions() {
        let (engine, _) = engine();
        engine.stores.models.activate(separated_bundle("alice")).unwrap();
        let captures = typing_profile(0, 2);

        engine.score_authentication("alice", &captures[0]).unwrap();
        assert!(engine.live_feed(10).is_empty());

        assert!(engine.start_monitoring());
        engine.score_authentication("alice", &captures[1]).unwrap();
        let feed = engine.live_feed(10);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].user_id, "alice");
        assert!(engine.status().unwrap().monitoring.active);

        assert!(engine.stop_monitoring());
        assert!(!engine.is_monitoring());
    }

    #[test]
    fn test_keystroke_status_reports_active_version() {
        let (engine, _) = engine();
        let bundle = separated_bundle("alice");
        let version = bundle.version.clone();
        engine.stores.models.activate(bundle).unwrap();

        let status = engine.keystroke_status("alice").unwrap();
        assert!(status.model_exists);
        assert_eq!(status.active_model_version, Some(version));
        assert_eq!(engine.user_status("alice").unwrap().bundle_count, 1);
    }
}
