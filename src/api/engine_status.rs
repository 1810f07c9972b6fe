use serde::{Deserialize, Serialize};

use crate::logic::auth::{AuthenticationDecision, CollectionStatus, LockoutState};
use crate::logic::model::ThresholdConfig;
use crate::logic::monitoring::MonitoringStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub app_version: String,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub feature_count: usize,

    pub thresholds: ThresholdConfig,
    pub monitoring: MonitoringStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStatus {
    pub user_id: String,
    pub collection: CollectionStatus,
    pub lockout: LockoutState,
    pub bundle_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginStatus {
    /// Genuine, no anomaly
    Granted,
    /// Access granted but the pattern was flagged
    Flagged,
    Denied,
    /// No model yet; the capture was stored for training
    ModelMissing,
    PasswordOnly,
    InvalidCredentials,
    Locked,
}

impl LoginStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            LoginStatus::Granted
                | LoginStatus::Flagged
                | LoginStatus::ModelMissing
                | LoginStatus::PasswordOnly
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub status: LoginStatus,
    pub decision: Option<AuthenticationDecision>,
    pub collection: Option<CollectionStatus>,
    /// Account state after this attempt
    pub lockout: LockoutState,
    pub capture_id: Option<u64>,
}
