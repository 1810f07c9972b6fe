//! In-process stores
//!
//! `MemoryStore` plays the host database (captures, users, settings,
//! lockout state). `InMemoryModelStore` keeps bundles per user and swaps
//! the active one under a single write lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use super::{AccountStore, CaptureQuery, ModelStore, SampleStore, SettingsSource, UserDirectory};
use crate::error::Result;
use crate::logic::auth::lockout::LockoutState;
use crate::logic::dataset::{NewCapture, StoredCapture};
use crate::logic::model::{BundleSummary, ModelBundle};

// ============================================================================
// HOST DATA
// ============================================================================

#[derive(Default)]
struct HostData {
    captures: Vec<StoredCapture>,
    next_id: u64,
    /// Directory order = first registration
    users: Vec<String>,
    settings: HashMap<String, f64>,
    accounts: HashMap<String, LockoutState>,
}

impl HostData {
    fn register(&mut self, user_id: &str) {
        if !self.users.iter().any(|u| u == user_id) {
            self.users.push(user_id.to_string());
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HostData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a batch of captures, in order.
    pub fn from_captures(captures: Vec<NewCapture>) -> Result<Self> {
        let store = Self::new();
        for capture in captures {
            store.insert(capture)?;
        }
        Ok(store)
    }

    #[cfg(test)]
    pub fn set_setting(&self, key: &str, value: f64) {
        self.inner.write().settings.insert(key.to_string(), value);
    }

    #[cfg(test)]
    pub fn capture(&self, id: u64) -> Option<StoredCapture> {
        self.inner.read().captures.iter().find(|c| c.id == id).cloned()
    }
}

impl SampleStore for MemoryStore {
    fn insert(&self, capture: NewCapture) -> Result<StoredCapture> {
        let mut data = self.inner.write();
        data.next_id += 1;
        data.register(&capture.user_id);

        let stored = StoredCapture {
            id: data.next_id,
            user_id: capture.user_id,
            session_id: capture.session_id,
            capture: capture.capture,
            data_split: capture.data_split,
            is_training_data: capture.is_training_data,
            captured_at: Utc::now(),
            anomaly_score: None,
        };
        data.captures.push(stored.clone());
        Ok(stored)
    }

    fn captures(&self, user_id: &str, query: &CaptureQuery) -> Result<Vec<StoredCapture>> {
        let data = self.inner.read();
        let matching = data
            .captures
            .iter()
            .filter(|c| c.user_id == user_id && query.matches(c))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    fn count(&self, user_id: &str) -> Result<usize> {
        Ok(self
            .inner
            .read()
            .captures
            .iter()
            .filter(|c| c.user_id == user_id)
            .count())
    }

    fn annotate_anomaly_score(&self, capture_id: u64, score: f64) -> Result<()> {
        let mut data = self.inner.write();
        match data.captures.iter_mut().find(|c| c.id == capture_id) {
            Some(capture) if capture.anomaly_score.is_none() => {
                capture.anomaly_score = Some(score);
            }
            Some(_) => log::debug!("Capture {} already annotated", capture_id),
            None => log::warn!("Cannot annotate unknown capture {}", capture_id),
        }
        Ok(())
    }
}

impl UserDirectory for MemoryStore {
    fn user_ids(&self) -> Result<Vec<String>> {
        Ok(self.inner.read().users.clone())
    }
}

impl SettingsSource for MemoryStore {
    fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.inner.read().settings.get(key).copied())
    }
}

impl AccountStore for MemoryStore {
    fn lockout_state(&self, user_id: &str) -> Result<LockoutState> {
        Ok(self
            .inner
            .read()
            .accounts
            .get(user_id)
            .copied()
            .unwrap_or_default())
    }

    fn put_lockout_state(&self, user_id: &str, state: LockoutState) -> Result<()> {
        self.inner.write().accounts.insert(user_id.to_string(), state);
        Ok(())
    }
}

// ============================================================================
// MODEL BUNDLES
// ============================================================================

#[derive(Default)]
struct UserBundles {
    bundles: Vec<Arc<ModelBundle>>,
    active: Option<usize>,
}

#[derive(Default)]
pub struct InMemoryModelStore {
    users: RwLock<HashMap<String, UserBundles>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for InMemoryModelStore {
    fn activate(&self, bundle: ModelBundle) -> Result<()> {
        let mut users = self.users.write();
        let entry = users.entry(bundle.user_id.clone()).or_default();

        if let Some(previous) = entry.active.and_then(|i| entry.bundles.get(i)) {
            log::info!("Retiring bundle {} for {}", previous.version, bundle.user_id);
        }
        log::info!("Activating bundle {} for {}", bundle.version, bundle.user_id);

        entry.bundles.push(Arc::new(bundle));
        entry.active = Some(entry.bundles.len() - 1);
        Ok(())
    }

    fn active_bundle(&self, user_id: &str) -> Result<Option<Arc<ModelBundle>>> {
        let users = self.users.read();
        Ok(users
            .get(user_id)
            .and_then(|u| u.active.and_then(|i| u.bundles.get(i)))
            .cloned())
    }

    fn list_bundles(&self, user_id: &str) -> Result<Vec<BundleSummary>> {
        let users = self.users.read();
        Ok(users
            .get(user_id)
            .map(|u| {
                u.bundles
                    .iter()
                    .enumerate()
                    .map(|(i, b)| b.summary(u.active == Some(i)))
                    .collect()
            })
            .unwrap_or_default())
    }
}
