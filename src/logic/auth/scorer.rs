//! Authentication Scorer
//!
//! Live capture + active bundle -> confidence -> accept / flag / deny.

use serde::{Deserialize, Serialize};

use crate::constants::{
    HEURISTIC_ACCEPT_CONFIDENCE, HEURISTIC_REJECT_CONFIDENCE, MODEL_READY_SAMPLES, SAMPLES_NEEDED,
};
use crate::error::{BioAuthError, Result};
use crate::logic::dataset::RawKeystrokeCapture;
use crate::logic::features;
use crate::logic::model::bundle::ModelOutput;
use crate::logic::model::{ModelKind, ThresholdConfig};
use crate::logic::store::{ModelStore, SampleStore, SettingsSource};

/// Anomalies below this confidence are escalated to `High`.
const HIGH_SEVERITY_CONFIDENCE: f64 = 0.65;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceSource {
    /// Model posterior P(genuine)
    ModelProbability,
    /// Fixed accept/reject value for models without a posterior
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationDecision {
    pub confidence: f64,
    pub is_genuine: bool,
    pub anomaly: bool,
    pub access_denied: bool,
    pub confidence_source: ConfidenceSource,
    /// Suggested alert for the host to raise, if any
    pub severity: Option<AlertSeverity>,
    pub model_version: String,
    pub algorithm: ModelKind,
}

/// Cold-start progress toward a first model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub samples_collected: usize,
    pub samples_needed: usize,
    pub progress_percent: f64,
    pub model_ready: bool,
    pub model_exists: bool,
    pub active_model_version: Option<String>,
}

impl CollectionStatus {
    pub fn new(samples_collected: usize, active_model_version: Option<String>) -> Self {
        Self {
            samples_collected,
            samples_needed: SAMPLES_NEEDED,
            progress_percent: (samples_collected as f64 / SAMPLES_NEEDED as f64 * 100.0).min(100.0),
            model_ready: samples_collected >= MODEL_READY_SAMPLES,
            model_exists: active_model_version.is_some(),
            active_model_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScoreOutcome {
    /// Cold start: no trained model yet. Not a denial.
    NoActiveModel(CollectionStatus),
    Decision(AuthenticationDecision),
}

pub fn severity_for(anomaly: bool, access_denied: bool, confidence: f64) -> Option<AlertSeverity> {
    if access_denied {
        Some(AlertSeverity::Critical)
    } else if anomaly && confidence < HIGH_SEVERITY_CONFIDENCE {
        Some(AlertSeverity::High)
    } else if anomaly {
        Some(AlertSeverity::Medium)
    } else {
        None
    }
}

/// Apply thresholds to a raw model output.
pub fn decide(
    output: ModelOutput,
    thresholds: &ThresholdConfig,
    model_version: &str,
    algorithm: ModelKind,
) -> AuthenticationDecision {
    let (confidence, confidence_source) = match output.probability {
        Some(p) => (p.clamp(0.0, 1.0), ConfidenceSource::ModelProbability),
        None if output.is_genuine => (HEURISTIC_ACCEPT_CONFIDENCE, ConfidenceSource::Heuristic),
        None => (HEURISTIC_REJECT_CONFIDENCE, ConfidenceSource::Heuristic),
    };

    let anomaly = thresholds.is_anomaly(output.is_genuine, confidence);
    let access_denied = thresholds.is_access_denied(confidence);

    AuthenticationDecision {
        confidence,
        is_genuine: output.is_genuine,
        anomaly,
        access_denied,
        confidence_source,
        severity: severity_for(anomaly, access_denied, confidence),
        model_version: model_version.to_string(),
        algorithm,
    }
}

pub struct Scorer<'a> {
    pub samples: &'a dyn SampleStore,
    pub models: &'a dyn ModelStore,
    pub settings: &'a dyn SettingsSource,
    pub default_thresholds: ThresholdConfig,
}

impl<'a> Scorer<'a> {
    /// Score a capture for `user_id`. When `capture_id` names the stored
    /// copy, its anomaly score is annotated with the confidence.
    pub fn score(
        &self,
        user_id: &str,
        capture: &RawKeystrokeCapture,
        capture_id: Option<u64>,
    ) -> Result<ScoreOutcome> {
        let vector = features::extract(capture);
        log::debug!("Features for {}: {}", user_id, vector.to_log_entry());

        let Some(bundle) = self.models.active_bundle(user_id)? else {
            let collected = self.samples.count(user_id)?;
            log::info!(
                "No active model for {}: collecting ({}/{})",
                user_id,
                collected,
                SAMPLES_NEEDED
            );
            return Ok(ScoreOutcome::NoActiveModel(CollectionStatus::new(collected, None)));
        };

        if !vector.is_finite() {
            log::warn!("Refusing to score non-finite features for {}", user_id);
            return Err(BioAuthError::NonFiniteFeatures {
                user_id: user_id.to_string(),
            });
        }

        let output = bundle.decide(&vector)?;
        let thresholds = ThresholdConfig::from_settings(self.settings, self.default_thresholds)?;
        let decision = decide(output, &thresholds, &bundle.version, bundle.algorithm());

        if let Some(id) = capture_id {
            self.samples.annotate_anomaly_score(id, decision.confidence)?;
        }

        log::info!(
            "Scored {} with {}: confidence={:.4} genuine={} anomaly={} denied={}",
            user_id,
            bundle.version,
            decision.confidence,
            decision.is_genuine,
            decision.anomaly,
            decision.access_denied
        );

        Ok(ScoreOutcome::Decision(decision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(is_genuine: bool, probability: Option<f64>) -> ModelOutput {
        ModelOutput {
            is_genuine,
            probability,
        }
    }

    fn run(o: ModelOutput, thresholds: &ThresholdConfig) -> AuthenticationDecision {
        decide(o, thresholds, "RandomForest_20240101_000000", ModelKind::RandomForest)
    }

    #[test]
    fn test_probability_used_as_confidence() {
        let d = run(output(true, Some(0.97)), &ThresholdConfig::default());
        assert_eq!(d.confidence, 0.97);
        assert_eq!(d.confidence_source, ConfidenceSource::ModelProbability);
        assert!(!d.anomaly);
        assert!(!d.access_denied);
        assert_eq!(d.severity, None);
    }

    #[test]
    fn test_heuristic_confidence() {
        let thresholds = ThresholdConfig::default();

        let accept = run(output(true, None), &thresholds);
        assert_eq!(accept.confidence, 0.95);
        assert_eq!(accept.confidence_source, ConfidenceSource::Heuristic);
        // 0.95 is not below 1 - 0.05
        assert!(!accept.anomaly);

        let reject = run(output(false, None), &thresholds);
        assert_eq!(reject.confidence, 0.15);
        assert!(reject.anomaly);
        // 1.0 - 0.85 rounds to just above 0.15, so a heuristic reject is denied
        assert!(reject.access_denied);
        assert_eq!(reject.severity, Some(AlertSeverity::Critical));

        // a looser bar lets the same reject through with a warning
        let loose = run(output(false, None), &ThresholdConfig::new(0.9, 0.05));
        assert!(!loose.access_denied);
        assert_eq!(loose.severity, Some(AlertSeverity::High));
    }

    #[test]
    fn test_denial_and_severity() {
        let thresholds = ThresholdConfig::default();

        let denied = run(output(false, Some(0.05)), &thresholds);
        assert!(denied.access_denied);
        assert!(denied.anomaly);
        assert_eq!(denied.severity, Some(AlertSeverity::Critical));

        let medium = run(output(true, Some(0.8)), &thresholds);
        assert!(medium.anomaly);
        assert!(!medium.access_denied);
        assert_eq!(medium.severity, Some(AlertSeverity::Medium));

        let high = run(output(true, Some(0.5)), &thresholds);
        assert_eq!(high.severity, Some(AlertSeverity::High));
    }

    /// With access_denied_threshold = 1 - anomaly_threshold, raising the
    /// anomaly threshold lowers the denial bar: the denial rate over the
    /// same borderline confidences never increases.
    #[test]
    fn test_denial_rate_monotone_in_anomaly_threshold() {
        let confidences: Vec<f64> = (0..=100).map(|i| i as f64 / 100.0).collect();
        let denial_rate = |anomaly_threshold: f64| {
            let thresholds = ThresholdConfig::new(anomaly_threshold, 0.05);
            confidences
                .iter()
                .filter(|c| run(output(true, Some(**c)), &thresholds).access_denied)
                .count()
        };

        let mut previous = usize::MAX;
        for step in 0..=20 {
            let rate = denial_rate(step as f64 * 0.05);
            assert!(rate <= previous, "denials rose at threshold {}", step as f64 * 0.05);
            previous = rate;
        }
        assert!(denial_rate(0.5) > denial_rate(0.85));
    }

    #[test]
    fn test_collection_status() {
        let status = CollectionStatus::new(1, None);
        assert_eq!(status.samples_needed, 340);
        assert!(!status.model_ready);
        assert!(!status.model_exists);

        let ready = CollectionStatus::new(280, None);
        assert!(ready.model_ready);

        let full = CollectionStatus::new(500, Some("MLPClassifier_20240101_000000".into()));
        assert_eq!(full.progress_percent, 100.0);
        assert!(full.model_exists);
    }
}
