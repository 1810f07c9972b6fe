//! Keystroke Collector
//!
//! Turns a stream of keydown/keyup events into a [`RawKeystrokeCapture`].
//! Timestamps are milliseconds from any monotonic origin.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::stats;
use crate::logic::dataset::RawKeystrokeCapture;

/// Flights longer than this multiple of the mean flight count as pauses
const PAUSE_FACTOR: f64 = 2.0;

/// Minimum keydowns for a usable capture
pub const MIN_KEY_PRESSES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Down,
    Up,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub action: KeyAction,
    pub key: String,
    /// Milliseconds since the first event
    pub time_ms: f64,
}

#[derive(Debug, Default, Clone)]
pub struct KeystrokeCollector {
    events: Vec<KeyEvent>,
    start_ms: Option<f64>,
    end_ms: Option<f64>,
}

impl KeystrokeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_down(&mut self, key: &str, timestamp_ms: f64) {
        let start = *self.start_ms.get_or_insert(timestamp_ms);
        self.events.push(KeyEvent {
            action: KeyAction::Down,
            key: key.to_string(),
            time_ms: timestamp_ms - start,
        });
    }

    pub fn key_up(&mut self, key: &str, timestamp_ms: f64) {
        let start = *self.start_ms.get_or_insert(timestamp_ms);
        self.events.push(KeyEvent {
            action: KeyAction::Up,
            key: key.to_string(),
            time_ms: timestamp_ms - start,
        });
        self.end_ms = Some(timestamp_ms);
    }

    pub fn key_count(&self) -> usize {
        self.events.iter().filter(|e| e.action == KeyAction::Down).count()
    }

    pub fn is_valid(&self) -> bool {
        self.key_count() >= MIN_KEY_PRESSES
    }

    pub fn reset(&mut self) {
        self.events.clear();
        self.start_ms = None;
        self.end_ms = None;
    }

    /// Hold durations: keyup minus the matching pending keydown.
    pub fn dwell_times(&self) -> Vec<f64> {
        let mut pending: HashMap<&str, f64> = HashMap::new();
        let mut dwell = Vec::new();

        for event in &self.events {
            match event.action {
                KeyAction::Down => {
                    pending.insert(event.key.as_str(), event.time_ms);
                }
                KeyAction::Up => {
                    if let Some(down) = pending.remove(event.key.as_str()) {
                        let held = event.time_ms - down;
                        if held > 0.0 {
                            dwell.push(held);
                        }
                    }
                }
            }
        }

        dwell
    }

    /// Gaps between the latest keyup and the next keydown.
    pub fn flight_times(&self) -> Vec<f64> {
        let mut last_up: Option<f64> = None;
        let mut flights = Vec::new();

        for event in &self.events {
            match event.action {
                KeyAction::Up => last_up = Some(event.time_ms),
                KeyAction::Down => {
                    if let Some(up) = last_up {
                        let gap = event.time_ms - up;
                        if gap > 0.0 {
                            flights.push(gap);
                        }
                    }
                }
            }
        }

        flights
    }

    pub fn pause_patterns(&self) -> Vec<f64> {
        let flights = self.flight_times();
        let cutoff = stats::mean(&flights) * PAUSE_FACTOR;
        flights.into_iter().filter(|f| *f > cutoff).collect()
    }

    /// Keydowns per second over the whole capture.
    pub fn typing_speed(&self) -> f64 {
        let (Some(start), Some(end)) = (self.start_ms, self.end_ms) else {
            return 0.0;
        };

        let seconds = (end - start) / 1000.0;
        if seconds <= 0.0 {
            return 0.0;
        }
        self.key_count() as f64 / seconds
    }

    pub fn capture(&self) -> RawKeystrokeCapture {
        RawKeystrokeCapture {
            dwell_times: self.dwell_times(),
            flight_times: self.flight_times(),
            pause_patterns: self.pause_patterns(),
            typing_speed: self.typing_speed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_word(collector: &mut KeystrokeCollector, word: &str, start: f64, hold: f64, gap: f64) -> f64 {
        let mut t = start;
        for ch in word.chars() {
            let key = ch.to_string();
            collector.key_down(&key, t);
            collector.key_up(&key, t + hold);
            t += hold + gap;
        }
        t
    }

    #[test]
    fn test_dwell_and_flight() {
        let mut collector = KeystrokeCollector::new();
        type_word(&mut collector, "hello", 1000.0, 80.0, 120.0);

        let dwell = collector.dwell_times();
        assert_eq!(dwell.len(), 5);
        assert!(dwell.iter().all(|d| (*d - 80.0).abs() < 1e-9));

        let flight = collector.flight_times();
        assert_eq!(flight.len(), 4);
        assert!(flight.iter().all(|f| (*f - 120.0).abs() < 1e-9));
    }

    #[test]
    fn test_pause_detection() {
        let mut collector = KeystrokeCollector::new();
        let t = type_word(&mut collector, "abc", 0.0, 50.0, 100.0);
        // long hesitation before the next word
        type_word(&mut collector, "de", t + 900.0, 50.0, 100.0);

        let pauses = collector.pause_patterns();
        assert_eq!(pauses.len(), 1);
        assert!(pauses[0] > 900.0);
    }

    #[test]
    fn test_typing_speed_and_validity() {
        let mut collector = KeystrokeCollector::new();
        assert_eq!(collector.typing_speed(), 0.0);
        assert!(!collector.is_valid());

        // 5 keys, 200ms per key, last keyup at 0.9s
        type_word(&mut collector, "abcde", 0.0, 100.0, 100.0);
        assert!(collector.is_valid());
        assert!((collector.typing_speed() - 5.0 / 0.9).abs() < 1e-9);

        collector.reset();
        assert_eq!(collector.key_count(), 0);
        assert!(collector.capture().is_empty());
    }
}
