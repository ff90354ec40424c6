//! Short-term analytics over a cached sample window
//!
//! All functions take samples ordered by ascending start time and never fail:
//! too little data yields an empty or absent result.

pub mod change;
pub mod counteraction;
pub mod momentum;

use chrono::{DateTime, Duration, TimeZone, Utc};

pub use change::recent_change;
pub use counteraction::{counteraction_effects, MIN_VELOCITY_INTERVAL_SECS};
pub use momentum::{momentum_delta, momentum_effect, MOMENTUM_DELTA_SECS};

/// Floor `t` to a multiple of `step` since the epoch
pub(crate) fn floor_to(t: DateTime<Utc>, step: Duration) -> Option<DateTime<Utc>> {
    let step = step.num_seconds();
    if step <= 0 {
        return None;
    }
    let secs = t.timestamp();
    Utc.timestamp_opt(secs - secs.rem_euclid(step), 0).single()
}

/// Ceil `t` to a multiple of `step` since the epoch
pub(crate) fn ceil_to(t: DateTime<Utc>, step: Duration) -> Option<DateTime<Utc>> {
    let floored = floor_to(t, step)?;
    if floored == t {
        Some(t)
    } else {
        Some(floored + step)
    }
}

pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
