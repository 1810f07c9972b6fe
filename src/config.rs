//! Configuration module

use std::path::PathBuf;

use chrono::Duration;

use crate::constants;
use crate::logic::auth::LockoutPolicy;
use crate::logic::model::storage::get_default_model_dir;
use crate::logic::model::threshold::ThresholdConfig;
use crate::logic::training::TrainingConfig;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory for persisted model bundles
    pub model_dir: PathBuf,

    /// Thresholds used when the settings source has no value
    pub default_thresholds: ThresholdConfig,

    /// Model hyperparameters
    pub training: TrainingConfig,

    /// Decisions kept in the live monitoring feed
    pub live_feed_capacity: usize,

    /// Consecutive failures and lock duration
    pub lockout: LockoutPolicy,
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            model_dir: get_default_model_dir(),
            default_thresholds: ThresholdConfig::new(
                constants::get_anomaly_threshold(),
                constants::get_far_threshold(),
            ),
            training: TrainingConfig::default(),
            live_feed_capacity: std::env::var("BIOAUTH_LIVE_FEED_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            lockout: LockoutPolicy {
                max_failed_attempts: constants::get_max_failed_attempts(),
                lockout_duration: Duration::minutes(constants::get_lockout_minutes()),
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_dir: get_default_model_dir(),
            default_thresholds: ThresholdConfig::default(),
            training: TrainingConfig::default(),
            live_feed_capacity: 500,
            lockout: LockoutPolicy::default(),
        }
    }
}
