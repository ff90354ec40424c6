//! Point-to-point glucose change

use crate::model::SampleRecord;

/// Earliest and latest samples sharing the provenance of the final sample.
///
/// Display-only (calibration) samples never qualify. Returns `None` unless at
/// least two samples qualify and the first strictly precedes the last.
pub fn recent_change(samples: &[SampleRecord]) -> Option<(SampleRecord, SampleRecord)> {
    let provenance = &samples.last()?.provenance;
    let mut qualifying = samples
        .iter()
        .filter(|s| &s.provenance == provenance && !s.is_display_only);

    let first = qualifying.next()?;
    let last = qualifying.last()?;

    (first.start < last.start).then(|| (first.clone(), last.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Quantity;
    use chrono::{Duration, TimeZone, Utc};

    fn at(minutes: i64, value: f64, provenance: &str) -> SampleRecord {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        SampleRecord::new(Quantity::mg_per_dl(value), base + Duration::minutes(minutes), provenance)
    }

    #[test]
    fn test_single_provenance_change() {
        let samples = [at(0, 100.0, "A"), at(5, 104.0, "A"), at(10, 111.0, "A")];
        let (first, last) = recent_change(&samples).unwrap();
        assert_eq!(first.quantity.value, 100.0);
        assert_eq!(last.quantity.value, 111.0);
    }

    #[test]
    fn test_follows_last_provenance() {
        let samples = [at(0, 100.0, "A"), at(5, 104.0, "A"), at(10, 111.0, "B")];
        assert!(recent_change(&samples).is_none());

        let samples = [at(0, 90.0, "B"), at(5, 104.0, "A"), at(10, 111.0, "B")];
        let (first, last) = recent_change(&samples).unwrap();
        assert_eq!(first.quantity.value, 90.0);
        assert_eq!(last.quantity.value, 111.0);
    }

    #[test]
    fn test_calibrations_excluded() {
        let samples = [at(0, 100.0, "A").display_only(), at(5, 104.0, "A")];
        assert!(recent_change(&samples).is_none());
    }

    #[test]
    fn test_requires_increasing_time() {
        let samples = [at(5, 100.0, "A"), at(5, 104.0, "A")];
        assert!(recent_change(&samples).is_none());
        assert!(recent_change(&[]).is_none());
    }
}
