//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.

use std::path::PathBuf;

/// Default anomaly threshold (access denied below `1 - anomaly_threshold`)
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.85;

/// Default acceptable false-accept rate
pub const DEFAULT_FAR_THRESHOLD: f64 = 0.05;

/// Cold-start collection target
pub const SAMPLES_NEEDED: usize = 340;

/// Model readiness is signaled once this many samples are stored
pub const MODEL_READY_SAMPLES: usize = 280;

/// Minimum training vectors before a model can be trained
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Consecutive failures before an account is locked
pub const MAX_FAILED_ATTEMPTS: u32 = 3;

/// Lock duration (minutes)
pub const LOCKOUT_MINUTES: i64 = 30;

/// Confidence reported for models without a probability output
pub const HEURISTIC_ACCEPT_CONFIDENCE: f64 = 0.95;
pub const HEURISTIC_REJECT_CONFIDENCE: f64 = 0.15;

/// Impostor search fan-out
pub const EVALUATION_IMPOSTOR_USERS: usize = 20;
pub const TRAINING_IMPOSTOR_USERS: usize = 15;

/// Fewer real impostor vectors than this switches evaluation to simulation
pub const MIN_REAL_IMPOSTORS: usize = 5;

/// Minimum impostor evaluation set size
pub const MIN_IMPOSTOR_EVAL_COUNT: usize = 20;

/// Seed shared by every randomized training step
pub const RANDOM_SEED: u64 = 42;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "keystroke-auth";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Anomaly threshold from environment or default
pub fn get_anomaly_threshold() -> f64 {
    std::env::var("BIOAUTH_ANOMALY_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_ANOMALY_THRESHOLD)
}

/// Target FAR from environment or default
pub fn get_far_threshold() -> f64 {
    std::env::var("BIOAUTH_FAR_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_FAR_THRESHOLD)
}

/// Failures before lockout from environment or default
pub fn get_max_failed_attempts() -> u32 {
    std::env::var("BIOAUTH_MAX_FAILED_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(MAX_FAILED_ATTEMPTS)
}

/// Lock duration in minutes from environment or default
pub fn get_lockout_minutes() -> i64 {
    std::env::var("BIOAUTH_LOCKOUT_MINUTES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LOCKOUT_MINUTES)
}

/// Base data directory (models, captures)
pub fn get_data_dir() -> PathBuf {
    std::env::var("BIOAUTH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
        })
}
