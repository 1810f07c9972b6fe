//! Synthetic typing profiles for tests

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use super::{partition_user, NewCapture, RawKeystrokeCapture};

/// `n` captures from a typist whose rhythm is set by `profile`.
pub fn typing_profile(profile: u64, n: usize) -> Vec<RawKeystrokeCapture> {
    let mut rng = StdRng::seed_from_u64(1000 + profile);
    let p = profile as f64;
    let dwell = Normal::new(80.0 + 15.0 * p, 8.0).unwrap();
    let flight = Normal::new(120.0 + 25.0 * p, 15.0).unwrap();
    let speed = Normal::new(5.0 + 0.7 * p, 0.3).unwrap();

    (0..n)
        .map(|_| {
            let dwell_times: Vec<f64> = (0..11).map(|_| dwell.sample(&mut rng).max(1.0)).collect();
            let flight_times: Vec<f64> =
                (0..10).map(|_| flight.sample(&mut rng).max(1.0)).collect();
            let mean_flight = flight_times.iter().sum::<f64>() / flight_times.len() as f64;
            let pause_patterns = flight_times
                .iter()
                .copied()
                .filter(|f| *f > 1.2 * mean_flight)
                .collect();
            RawKeystrokeCapture {
                dwell_times,
                flight_times,
                pause_patterns,
                typing_speed: speed.sample(&mut rng).max(0.5),
            }
        })
        .collect()
}

/// Unlabeled live captures
pub fn live_captures(user_id: &str, profile: u64, n: usize) -> Vec<NewCapture> {
    typing_profile(profile, n)
        .into_iter()
        .map(|c| NewCapture::live(user_id, "fixture", c))
        .collect()
}

/// Captures labeled 70/15/15 in arrival order
pub fn labeled_captures(user_id: &str, profile: u64, n: usize) -> Vec<NewCapture> {
    partition_user(live_captures(user_id, profile, n))
}
