//! Monitoring - live decision feed
//!
//! Owned by the engine. While active, every scored decision is appended to a
//! bounded feed; the oldest entries drop once the capacity is reached.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::logic::auth::AuthenticationDecision;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub user_id: String,
    pub at: DateTime<Utc>,
    pub decision: AuthenticationDecision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringStatus {
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub feed_len: usize,
    pub feed_capacity: usize,
    pub total_seen: u64,
}

#[derive(Debug, Default)]
struct Inner {
    active: bool,
    started_at: Option<DateTime<Utc>>,
    feed: VecDeque<FeedEntry>,
    total_seen: u64,
}

pub struct MonitoringState {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl MonitoringState {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    /// Returns `false` if monitoring was already running.
    pub fn start(&self) -> bool {
        let mut inner = self.inner.write();
        if inner.active {
            return false;
        }
        inner.active = true;
        inner.started_at = Some(Utc::now());
        log::info!("Live monitoring started (feed capacity {})", self.capacity);
        true
    }

    /// Stop and clear the feed. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let mut inner = self.inner.write();
        if !inner.active {
            return false;
        }
        log::info!(
            "Live monitoring stopped after {} decisions",
            inner.total_seen
        );
        *inner = Inner::default();
        true
    }

    pub fn is_active(&self) -> bool {
        self.inner.read().active
    }

    /// Append a decision. Ignored while stopped.
    pub fn record(&self, user_id: &str, decision: &AuthenticationDecision) {
        let mut inner = self.inner.write();
        if !inner.active {
            return;
        }
        inner.feed.push_back(FeedEntry {
            user_id: user_id.to_string(),
            at: Utc::now(),
            decision: decision.clone(),
        });
        inner.total_seen += 1;
        while inner.feed.len() > self.capacity {
            inner.feed.pop_front();
        }
    }

    /// Most recent `limit` entries, oldest first.
    pub fn feed(&self, limit: usize) -> Vec<FeedEntry> {
        let inner = self.inner.read();
        let start = inner.feed.len().saturating_sub(limit);
        inner.feed.iter().skip(start).cloned().collect()
    }

    pub fn status(&self) -> MonitoringStatus {
        let inner = self.inner.read();
        MonitoringStatus {
            active: inner.active,
            started_at: inner.started_at,
            feed_len: inner.feed.len(),
            feed_capacity: self.capacity,
            total_seen: inner.total_seen,
        }
    }
}
