//! Synthetic load-test metrics.
//!
//! Approximates a ramp-up profile: virtual users climb linearly to the target
//! over the first quarter of the run, then hold. Latency grows with load,
//! throughput with concurrency, and errors appear only occasionally.

use rand::Rng;

use crate::config::RAMP_UP_FRACTION;
use crate::session::Sample;

pub const BASE_LATENCY_MS: f64 = 150.0;
/// Extra latency at full target concurrency.
pub const LOAD_LATENCY_MS: f64 = 100.0;
pub const LATENCY_JITTER_MS: f64 = 50.0;
pub const MIN_LATENCY_MS: f64 = 50.0;
pub const MIN_REQUESTS_PER_VU: f64 = 5.0;
pub const REQUESTS_PER_VU_JITTER: f64 = 2.0;
/// Chance of an error spike at full load.
pub const ERROR_PROBABILITY_AT_FULL_LOAD: f64 = 0.05;
pub const MAX_ERROR_RATE: f64 = 0.05;

/// Virtual users active at `elapsed` seconds into a `total`-second run.
pub fn ramp_concurrency(elapsed: u64, total: u64, target: u32) -> u32 {
    if total == 0 || target == 0 {
        return 0;
    }
    let ramp_secs = total as f64 * RAMP_UP_FRACTION;
    let ramped = (target as f64 * elapsed as f64 / ramp_secs).ceil();
    ramped.min(target as f64).max(0.0) as u32
}

/// Produce one sample. Only `rng` carries state between calls.
pub fn sample<R: Rng + ?Sized>(elapsed: u64, total: u64, target: u32, rng: &mut R) -> Sample {
    let vus = ramp_concurrency(elapsed, total, target);
    let load = if target == 0 {
        0.0
    } else {
        vus as f64 / target as f64
    };

    let jitter = (rng.gen::<f64>() - 0.5) * LATENCY_JITTER_MS;
    let latency = (BASE_LATENCY_MS + LOAD_LATENCY_MS * load + jitter).max(MIN_LATENCY_MS);

    let requests_per_sec = vus as f64 * (MIN_REQUESTS_PER_VU + rng.gen::<f64>() * REQUESTS_PER_VU_JITTER);

    let error_rate = if rng.gen::<f64>() < load * ERROR_PROBABILITY_AT_FULL_LOAD {
        rng.gen::<f64>() * MAX_ERROR_RATE
    } else {
        0.0
    };

    Sample {
        time: elapsed,
        vus,
        response_time_p95_ms: round2(latency),
        requests_per_sec: round2(requests_per_sec),
        error_rate: error_rate.clamp(0.0, 1.0),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
