//! Error handling
//!
//! One error type for every fallible core operation. Model-variant failures
//! inside the training ensemble use [`ModelError`] and never escape the
//! pipeline unless every variant fails.

use thiserror::Error;

use crate::logic::features::layout::LayoutMismatchError;

pub type Result<T> = std::result::Result<T, BioAuthError>;

#[derive(Debug, Error)]
pub enum BioAuthError {
    /// A vector or matrix row did not have the feature layout width.
    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    FeatureDimensionMismatch { expected: usize, actual: usize },

    /// Recoverable: keep collecting and retry later.
    #[error("user {user_id} needs at least {required} training samples (have {available})")]
    InsufficientTrainingData {
        user_id: String,
        required: usize,
        available: usize,
    },

    #[error("all model variants failed to train for user {user_id}")]
    AllModelsFailed { user_id: String },

    /// A capture produced NaN or infinite features; it is never scored.
    #[error("non-finite feature values in capture for user {user_id}")]
    NonFiniteFeatures { user_id: String },

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error(transparent)]
    LayoutMismatch(#[from] LayoutMismatchError),

    #[error("model checksum mismatch for bundle {bundle_id}")]
    ChecksumMismatch { bundle_id: String },

    /// Store unavailable or inconsistent. Never retried by the core.
    #[error("store error: {0}")]
    Store(String),

    #[error("model error: {0}")]
    Model(ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a single model variant inside the training ensemble.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("not enough samples to fit {model}: {available}")]
    NotEnoughSamples { model: &'static str, available: usize },

    #[error("{model} needs impostor training data")]
    MissingImpostors { model: &'static str },

    #[error("{model} produced a non-finite value during training")]
    NonFinite { model: &'static str },

    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

impl From<ModelError> for BioAuthError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Dimension { expected, actual } => {
                BioAuthError::FeatureDimensionMismatch { expected, actual }
            }
            other => BioAuthError::Model(other),
        }
    }
}
