//! Auth Module - runtime decisions and account lockout

pub mod scorer;
pub mod lockout;

pub use scorer::{
    AlertSeverity, AuthenticationDecision, CollectionStatus, ConfidenceSource, ScoreOutcome,
    Scorer,
};
pub use lockout::{AccountStatus, AttemptOutcome, LockoutPolicy, LockoutState};
