//! Momentum effect: linear projection of the recent trend

use chrono::Duration;

use super::{ceil_to, floor_to, seconds_between};
use crate::model::{EffectPoint, SampleRecord};

/// Step between projected points, in seconds
pub const MOMENTUM_DELTA_SECS: i64 = 5 * 60;

pub fn momentum_delta() -> Duration {
    Duration::seconds(MOMENTUM_DELTA_SECS)
}

/// Project the trend of the last `window` of samples forward for `window`.
///
/// Points start at the last sample's time floored to `delta` and run to
/// `last + window` ceiled to `delta`. Values are the change relative to the
/// last sample, in mg/dL. Display-only samples are ignored.
pub fn momentum_effect(samples: &[SampleRecord], window: Duration, delta: Duration) -> Vec<EffectPoint> {
    let Some(newest) = samples.last() else {
        return Vec::new();
    };
    let window_start = newest.start - window;
    let points: Vec<&SampleRecord> = samples
        .iter()
        .filter(|s| s.start >= window_start && !s.is_display_only)
        .collect();

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    if points.len() < 2 || last.start <= first.start {
        return Vec::new();
    }

    let Some(slope) = regression_slope(&points) else {
        return Vec::new();
    };

    let (Some(start), Some(end)) = (floor_to(last.start, delta), ceil_to(last.start + window, delta))
    else {
        return Vec::new();
    };

    let mut effects = Vec::new();
    let mut date = start;
    loop {
        let elapsed = seconds_between(last.start, date).max(0.0);
        effects.push(EffectPoint::new(date, elapsed * slope));
        date += delta;
        if date > end {
            break;
        }
    }
    effects
}

/// Least-squares slope of mg/dL over seconds
fn regression_slope(points: &[&SampleRecord]) -> Option<f64> {
    let origin = points.first()?.start;
    let n = points.len() as f64;
    let xs: Vec<f64> = points.iter().map(|p| seconds_between(origin, p.start)).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.mg_per_dl()).collect();

    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        covariance += (x - mean_x) * (y - mean_y);
        variance += (x - mean_x).powi(2);
    }

    let slope = covariance / variance;
    if variance > 0.0 && slope.is_finite() {
        Some(slope)
    } else {
        None
    }
}
