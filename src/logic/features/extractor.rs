//! Keystroke Feature Extractor
//!
//! Pure statistical reduction of a raw timing capture into the 21-slot
//! feature vector described in `layout.rs`:
//!
//! | Slots  | Group        | Statistics                                   |
//! |--------|--------------|----------------------------------------------|
//! | 0-7    | dwell        | mean, std, median, min, max, p25, p75, count |
//! | 8-15   | flight       | same as dwell                                |
//! | 16-18  | pauses       | mean, std, count                             |
//! | 19     | typing speed | keys per second, as captured                 |
//! | 20     | variability  | (std dwell + std flight) / (mean dwell + mean flight) |

use super::layout::{DWELL_OFFSET, FLIGHT_OFFSET, PAUSE_OFFSET, SPEED_INDEX, VARIABILITY_INDEX};
use super::stats;
use super::vector::FeatureVector;
use crate::logic::dataset::RawKeystrokeCapture;

/// Floor for the variability ratio denominator
pub const VARIABILITY_EPSILON: f64 = 1e-5;

/// Extract the feature vector from a raw capture. Never fails.
pub fn extract(raw: &RawKeystrokeCapture) -> FeatureVector {
    let mut vector = FeatureVector::new();

    write_timing_stats(&mut vector, DWELL_OFFSET, &raw.dwell_times);
    write_timing_stats(&mut vector, FLIGHT_OFFSET, &raw.flight_times);

    let pauses = &raw.pause_patterns;
    vector.set(PAUSE_OFFSET, stats::mean(pauses));
    vector.set(PAUSE_OFFSET + 1, stats::std_dev(pauses));
    vector.set(PAUSE_OFFSET + 2, pauses.len() as f64);

    vector.set(SPEED_INDEX, raw.typing_speed);
    vector.set(VARIABILITY_INDEX, variability(&raw.dwell_times, &raw.flight_times));

    vector
}

/// Extract a batch, preserving order.
pub fn extract_all<'a, I>(captures: I) -> Vec<FeatureVector>
where
    I: IntoIterator<Item = &'a RawKeystrokeCapture>,
{
    captures.into_iter().map(extract).collect()
}

fn write_timing_stats(vector: &mut FeatureVector, offset: usize, values: &[f64]) {
    vector.set(offset, stats::mean(values));
    vector.set(offset + 1, stats::std_dev(values));
    vector.set(offset + 2, stats::median(values));
    vector.set(offset + 3, stats::min(values));
    vector.set(offset + 4, stats::max(values));
    vector.set(offset + 5, stats::percentile(values, 25.0));
    vector.set(offset + 6, stats::percentile(values, 75.0));
    vector.set(offset + 7, values.len() as f64);
}

/// Session variability. Zero unless both dwell and flight are present.
fn variability(dwell: &[f64], flight: &[f64]) -> f64 {
    if dwell.is_empty() || flight.is_empty() {
        return 0.0;
    }

    let spread = stats::std_dev(dwell) + stats::std_dev(flight);
    let level = stats::mean(dwell) + stats::mean(flight);
    spread / level.max(VARIABILITY_EPSILON)
}
