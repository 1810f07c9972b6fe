//! Lockout State Machine
//!
//! `active --(N consecutive failures)--> locked(until = now + D)`
//! `locked --(now >= until, next check)--> active (failures cleared)`
//!
//! Failures are keystroke denials, keystroke rejections and credential
//! failures. A granted genuine attempt clears the counter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{LOCKOUT_MINUTES, MAX_FAILED_ATTEMPTS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub status: AccountStatus,
    /// Always set while `status` is `Locked`
    pub locked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub max_failed_attempts: u32,
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lockout_duration: Duration::minutes(LOCKOUT_MINUTES),
        }
    }
}

/// How one attempt feeds the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl AttemptOutcome {
    /// Granted and genuine resets; denied or rejected counts against the user.
    pub fn from_decision(is_genuine: bool, access_denied: bool) -> Self {
        if is_genuine && !access_denied {
            AttemptOutcome::Success
        } else {
            AttemptOutcome::Failure
        }
    }
}

impl LockoutState {
    pub fn is_locked(&self) -> bool {
        self.status == AccountStatus::Locked
    }

    /// Lift an expired lock. Returns `true` when the state changed.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_locked() {
            return false;
        }
        match self.locked_until {
            Some(until) if now < until => false,
            _ => {
                *self = LockoutState::default();
                true
            }
        }
    }

    pub fn record(&mut self, outcome: AttemptOutcome, now: DateTime<Utc>, policy: &LockoutPolicy) {
        match outcome {
            AttemptOutcome::Success => self.record_success(),
            AttemptOutcome::Failure => self.record_failure(now, policy),
        }
    }

    pub fn record_success(&mut self) {
        self.failed_attempts = 0;
    }

    /// Count a failure; locks once the policy limit is reached. An account
    /// that is already locked keeps its original expiry.
    pub fn record_failure(&mut self, now: DateTime<Utc>, policy: &LockoutPolicy) {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.failed_attempts >= policy.max_failed_attempts && !self.is_locked() {
            self.status = AccountStatus::Locked;
            self.locked_until = Some(now + policy.lockout_duration);
            log::warn!(
                "Account locked after {} consecutive failures (until {})",
                self.failed_attempts,
                now + policy.lockout_duration
            );
        }
    }
}
