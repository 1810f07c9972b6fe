//! Store Module - Collaborator interfaces
//!
//! The core never owns persistence. Hosts plug in their own implementations
//! of these traits; `memory` and `file` provide in-process ones used by the
//! CLI and the tests.

pub mod memory;
pub mod file;


use std::sync::Arc;

use crate::error::Result;
use crate::logic::auth::lockout::LockoutState;
use crate::logic::dataset::{DataSplit, NewCapture, StoredCapture};
use crate::logic::model::{BundleSummary, ModelBundle};

pub use file::FileModelStore;
pub use memory::{InMemoryModelStore, MemoryStore};

/// Filter for capture queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureQuery {
    pub split: Option<DataSplit>,
    pub training_only: bool,
    pub limit: Option<usize>,
}

impl CaptureQuery {
    pub fn split(split: DataSplit) -> Self {
        Self {
            split: Some(split),
            ..Self::default()
        }
    }

    pub fn training() -> Self {
        Self {
            training_only: true,
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, capture: &StoredCapture) -> bool {
        (self.split.is_none() || capture.data_split == self.split)
            && (!self.training_only || capture.is_training_data)
    }
}

pub trait SampleStore: Send + Sync {
    fn insert(&self, capture: NewCapture) -> Result<StoredCapture>;

    /// Captures of one user in arrival order
    fn captures(&self, user_id: &str, query: &CaptureQuery) -> Result<Vec<StoredCapture>>;

    fn count(&self, user_id: &str) -> Result<usize>;

    /// Write the scorer's confidence; a second write for the same capture is ignored.
    fn annotate_anomaly_score(&self, capture_id: u64, score: f64) -> Result<()>;
}

pub trait ModelStore: Send + Sync {
    /// Persist and make active in one step; the previous active bundle of
    /// the user is retired.
    fn activate(&self, bundle: ModelBundle) -> Result<()>;

    fn active_bundle(&self, user_id: &str) -> Result<Option<Arc<ModelBundle>>>;

    /// Oldest first
    fn list_bundles(&self, user_id: &str) -> Result<Vec<BundleSummary>>;
}

pub trait SettingsSource: Send + Sync {
    fn get_f64(&self, key: &str) -> Result<Option<f64>>;
}

pub trait UserDirectory: Send + Sync {
    /// Stable directory order
    fn user_ids(&self) -> Result<Vec<String>>;
}

pub trait AccountStore: Send + Sync {
    /// Unknown users start active with no failures.
    fn lockout_state(&self, user_id: &str) -> Result<LockoutState>;

    fn put_lockout_state(&self, user_id: &str, state: LockoutState) -> Result<()>;
}
