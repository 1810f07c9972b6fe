//! Threshold Configuration
//!
//! Two independently configurable bars:
//! - `anomaly_threshold`: the access-denied bar is `1 - anomaly_threshold`.
//! - `far_threshold`: confidence below `1 - far_threshold` is flagged as an
//!   anomaly (logged / alerted) without necessarily blocking the session.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ANOMALY_THRESHOLD, DEFAULT_FAR_THRESHOLD};

/// Settings key for the anomaly threshold
pub const ANOMALY_THRESHOLD_KEY: &str = "anomaly_threshold";
/// Settings key for the target FAR
pub const FAR_THRESHOLD_KEY: &str = "far_threshold";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub anomaly_threshold: f64,
    pub far_threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
            far_threshold: DEFAULT_FAR_THRESHOLD,
        }
    }
}

impl ThresholdConfig {
    pub fn new(anomaly_threshold: f64, far_threshold: f64) -> Self {
        Self {
            anomaly_threshold: anomaly_threshold.clamp(0.0, 1.0),
            far_threshold: far_threshold.clamp(0.0, 1.0),
        }
    }

    /// Resolve from a settings source, falling back per key.
    pub fn from_settings(
        settings: &dyn crate::logic::store::SettingsSource,
        defaults: ThresholdConfig,
    ) -> crate::error::Result<Self> {
        let anomaly = settings
            .get_f64(ANOMALY_THRESHOLD_KEY)?
            .unwrap_or(defaults.anomaly_threshold);
        let far = settings
            .get_f64(FAR_THRESHOLD_KEY)?
            .unwrap_or(defaults.far_threshold);
        Ok(Self::new(anomaly, far))
    }

    /// Confidence below this blocks the session.
    pub fn access_denied_threshold(&self) -> f64 {
        1.0 - self.anomaly_threshold
    }

    /// Confidence below this is flagged as anomalous.
    pub fn anomaly_confidence_floor(&self) -> f64 {
        1.0 - self.far_threshold
    }

    pub fn is_access_denied(&self, confidence: f64) -> bool {
        confidence < self.access_denied_threshold()
    }

    pub fn is_anomaly(&self, is_genuine: bool, confidence: f64) -> bool {
        !is_genuine || confidence < self.anomaly_confidence_floor()
    }
}
