//! Counteraction velocity: observed glucose rate minus predicted effect rate

use chrono::Duration;

use super::seconds_between;
use crate::model::{EffectPoint, SampleRecord, VelocityPoint};

/// Pairs closer together than this are skipped, in seconds
pub const MIN_VELOCITY_INTERVAL_SECS: i64 = 4 * 60;

/// Velocity (mg/dL per minute) left unexplained by `effects` between
/// consecutive qualifying samples.
///
/// A pair qualifies when it spans more than the minimum interval, shares a
/// provenance and contains no display-only sample. Samples outside the time
/// range covered by `effects` are dropped first.
pub fn counteraction_effects(samples: &[SampleRecord], effects: &[EffectPoint]) -> Vec<VelocityPoint> {
    let (Some(effects_start), Some(effects_end)) = (effects.first(), effects.last()) else {
        return Vec::new();
    };
    let samples: Vec<&SampleRecord> = samples
        .iter()
        .filter(|s| s.start >= effects_start.start && s.start <= effects_end.start)
        .collect();

    let min_interval = Duration::seconds(MIN_VELOCITY_INTERVAL_SECS);
    let mut velocities = Vec::new();
    let mut effect_index = 0;
    let Some(mut start_sample) = samples.first().copied() else {
        return velocities;
    };

    for &end_sample in samples.iter().skip(1) {
        let interval = end_sample.start - start_sample.start;
        if interval <= min_interval {
            continue;
        }

        let pair = (start_sample, end_sample);
        start_sample = end_sample;

        let (from, to) = pair;
        if from.provenance != to.provenance || from.is_display_only || to.is_display_only {
            continue;
        }

        if effect_index >= effects.len() {
            break;
        }

        let mut start_effect = None;
        let mut end_effect = None;
        for effect in &effects[effect_index..] {
            if start_effect.is_none() && effect.start >= from.start {
                start_effect = Some(effect);
            } else if end_effect.is_none() && effect.start >= to.start {
                end_effect = Some(effect);
                break;
            }
            effect_index += 1;
        }

        let (Some(start_effect), Some(end_effect)) = (start_effect, end_effect) else {
            break;
        };

        let glucose_change = to.mg_per_dl() - from.mg_per_dl();
        let effect_change = end_effect.value - start_effect.value;
        let minutes = seconds_between(from.start, to.start) / 60.0;

        velocities.push(VelocityPoint {
            start: from.start,
            end: to.start,
            value: (glucose_change - effect_change) / minutes,
        });
    }

    velocities
}
