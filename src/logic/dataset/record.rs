use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw per-keystroke timing capture, as produced by a client-side or
/// import-time collector. Absent arrays deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawKeystrokeCapture {
    /// Per-key hold duration (ms)
    #[serde(default)]
    pub dwell_times: Vec<f64>,
    /// Gap between releasing one key and pressing the next (ms)
    #[serde(default)]
    pub flight_times: Vec<f64>,
    /// Flight intervals flagged as hesitations (ms)
    #[serde(default)]
    pub pause_patterns: Vec<f64>,
    /// Keys per second
    #[serde(default)]
    pub typing_speed: f64,
}

impl RawKeystrokeCapture {
    pub fn is_empty(&self) -> bool {
        self.dwell_times.is_empty()
            && self.flight_times.is_empty()
            && self.pause_patterns.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSplit {
    Train,
    Validation,
    Test,
}

impl DataSplit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSplit::Train => "train",
            DataSplit::Validation => "validation",
            DataSplit::Test => "test",
        }
    }
}

impl std::fmt::Display for DataSplit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A capture as held by the sample store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCapture {
    pub id: u64,
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    pub capture: RawKeystrokeCapture,
    /// `None` for live captures that were never partitioned
    #[serde(default)]
    pub data_split: Option<DataSplit>,
    #[serde(default = "default_true")]
    pub is_training_data: bool,
    pub captured_at: DateTime<Utc>,
    /// Written once by the scorer
    #[serde(default)]
    pub anomaly_score: Option<f64>,
}

fn default_true() -> bool {
    true
}

/// Insert request for the sample store; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCapture {
    pub user_id: String,
    #[serde(default)]
    pub session_id: String,
    pub capture: RawKeystrokeCapture,
    #[serde(default)]
    pub data_split: Option<DataSplit>,
    #[serde(default = "default_true")]
    pub is_training_data: bool,
}

impl NewCapture {
    /// A live login capture: training data, not yet partitioned.
    pub fn live(user_id: &str, session_id: &str, capture: RawKeystrokeCapture) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            capture,
            data_split: None,
            is_training_data: true,
        }
    }

    pub fn with_split(mut self, split: DataSplit) -> Self {
        self.data_split = Some(split);
        self
    }
}
