//! Head anomaly flagging.
//!
//! Marks three independent conditions on a groundwater head record:
//!
//! - **outlier**: the head value lies strictly outside the Tukey fences
//!   `Q1 - k*IQR` / `Q3 + k*IQR` of the head values in the trimmed domain;
//! - **jump**: the first difference (`head_t1`) is strictly above the jump
//!   threshold;
//! - **drop**: the first difference is strictly below the drop threshold.
//!
//! Outliers only consider the domain between the first and last present head
//! values. Jumps and drops consider every present difference unless
//! `clip_differences_to_head_domain` is set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::analysis::quantile;
use crate::config::DetectorConfig;
use crate::logging;
use crate::model::{
    DifferenceSeries, EmptySeriesError, FlagRow, FlagSet, HeadSeries, OutlierBounds,
};

/// Stateless detector carrying its thresholds. Cheap to clone and safe to
/// share between threads.
#[derive(Debug, Clone, Default)]
pub struct HeadAnomalyDetector {
    config: DetectorConfig,
}

impl HeadAnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Computes outlier bounds over the trimmed head values.
    pub fn bounds(&self, head: &HeadSeries) -> Result<OutlierBounds, EmptySeriesError> {
        let values: Vec<f64> = head.trimmed()?.iter().filter_map(|p| p.present()).collect();
        let (q1, q3) = quantile::quartiles(&values).ok_or(EmptySeriesError)?;
        Ok(OutlierBounds::from_quartiles(q1, q3, self.config.outlier_multiplier))
    }

    /// Flags every timestamp present in the trimmed head values or the
    /// present differences.
    ///
    /// Fails only when the head series has no present value at all.
    pub fn detect(
        &self,
        head: &HeadSeries,
        differences: &DifferenceSeries,
    ) -> Result<FlagSet, EmptySeriesError> {
        let trimmed = head.trimmed()?;
        let domain = match (trimmed.first(), trimmed.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => return Err(EmptySeriesError),
        };
        let bounds = self.bounds(head)?;

        let mut rows: BTreeMap<DateTime<Utc>, FlagRow> = BTreeMap::new();

        for obs in trimmed {
            if let Some(value) = obs.present() {
                let mut row = FlagRow::unflagged(obs.timestamp);
                row.head = Some(value);
                row.is_outlier = bounds.is_outside(value);
                rows.insert(obs.timestamp, row);
            }
        }

        let in_domain = |ts: DateTime<Utc>| ts >= domain.0 && ts <= domain.1;
        for obs in differences.points() {
            let Some(delta) = obs.present() else {
                continue;
            };
            if self.config.clip_differences_to_head_domain && !in_domain(obs.timestamp) {
                continue;
            }
            let row = rows
                .entry(obs.timestamp)
                .or_insert_with(|| FlagRow::unflagged(obs.timestamp));
            row.is_jump = delta > self.config.jump_threshold;
            row.is_drop = delta < self.config.drop_threshold;
        }

        let flags = FlagSet {
            domain,
            bounds,
            rows: rows.into_values().collect(),
        };
        logging::log_flag_summary(None, flags.len(), &flags.counts());
        Ok(flags)
    }
}

/// Runs the detector once with the given configuration.
pub fn flag_head_series(
    head: &HeadSeries,
    differences: &DifferenceSeries,
    config: &DetectorConfig,
) -> Result<FlagSet, EmptySeriesError> {
    HeadAnomalyDetector::new(config.clone()).detect(head, differences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Observation;
    use chrono::{Duration, TimeZone};

    fn t(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 1, 0, 0, 0).unwrap() + Duration::days(i)
    }

    fn points(values: &[Option<f64>]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation::new(t(i as i64), *v))
            .collect()
    }

    fn head(values: &[Option<f64>]) -> HeadSeries {
        HeadSeries::new(points(values)).unwrap()
    }

    fn diffs(values: &[Option<f64>]) -> DifferenceSeries {
        DifferenceSeries::new(points(values)).unwrap()
    }

    fn detect(h: &HeadSeries, d: &DifferenceSeries) -> FlagSet {
        HeadAnomalyDetector::default()
            .detect(h, d)
            .expect("series has present values")
    }

    // --- Outliers -----------------------------------------------------------

    #[test]
    fn test_iqr_outlier_on_small_sample() {
        let h = head(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(100.0)]);
        let flags = detect(&h, &DifferenceSeries::default());

        assert_eq!(flags.bounds.q1, 2.0);
        assert_eq!(flags.bounds.q3, 4.0);
        assert_eq!(flags.bounds.iqr, 2.0);
        assert_eq!(flags.bounds.upper, 7.0);

        let outliers: Vec<bool> = flags.rows.iter().map(|r| r.is_outlier).collect();
        assert_eq!(outliers, vec![false, false, false, false, true]);
    }

    #[test]
    fn test_value_on_bound_is_not_outlier() {
        // Q1 = 2, Q3 = 4, upper = 7 with k = 1.5. 7.0 sits exactly on the bound.
        let h = head(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(7.0)]);
        let flags = detect(&h, &DifferenceSeries::default());
        assert_eq!(flags.bounds.q3, 4.0);
        assert_eq!(flags.bounds.upper, 7.0);
        assert_eq!(flags.counts().outliers, 0, "value equal to upper bound must not be flagged");
    }

    #[test]
    fn test_widening_multiplier_never_adds_outliers() {
        let h = head(&[
            Some(10.0), Some(10.2), Some(9.9), Some(12.5), Some(10.1),
            Some(7.0), Some(10.0), Some(10.3), Some(15.0), Some(9.8),
        ]);
        let d = DifferenceSeries::default();
        let mut previous: Option<Vec<bool>> = None;
        for k in [0.0, 0.5, 1.0, 1.5, 3.0, 10.0] {
            let config = DetectorConfig::default().with_multiplier(k);
            let flags = HeadAnomalyDetector::new(config).detect(&h, &d).unwrap();
            let current: Vec<bool> = flags.rows.iter().map(|r| r.is_outlier).collect();
            if let Some(prev) = &previous {
                for (i, (was, now)) in prev.iter().zip(&current).enumerate() {
                    assert!(*was || !*now, "row {} became an outlier when k grew to {}", i, k);
                }
            }
            previous = Some(current);
        }
    }

    #[test]
    fn test_outliers_exclude_timestamps_outside_trimmed_domain() {
        let h = head(&[None, Some(1.0), Some(2.0), Some(3.0), None]);
        let flags = detect(&h, &DifferenceSeries::default());
        assert_eq!(flags.domain, (t(1), t(3)));
        assert_eq!(flags.len(), 3);
        assert!(flags.get(t(0)).is_none());
        assert!(flags.get(t(4)).is_none());
    }

    #[test]
    fn test_absent_head_inside_domain_has_no_row_without_delta() {
        let h = head(&[Some(1.0), None, Some(2.0)]);
        let flags = detect(&h, &DifferenceSeries::default());
        assert_eq!(flags.len(), 2);
        assert!(flags.get(t(1)).is_none());
    }

    // --- Jumps and drops ----------------------------------------------------

    #[test]
    fn test_jump_and_drop_thresholds() {
        let h = head(&[Some(5.0), Some(5.4), Some(5.34), Some(5.36)]);
        let d = diffs(&[Some(0.1), Some(0.4), Some(-0.06), Some(0.02)]);
        let flags = detect(&h, &d);

        let jumps: Vec<bool> = flags.rows.iter().map(|r| r.is_jump).collect();
        let drops: Vec<bool> = flags.rows.iter().map(|r| r.is_drop).collect();
        assert_eq!(jumps, vec![false, true, false, false]);
        assert_eq!(drops, vec![false, false, true, false]);
    }

    #[test]
    fn test_delta_on_threshold_is_not_flagged() {
        let h = head(&[Some(1.0), Some(1.0)]);
        let d = diffs(&[Some(0.3), Some(-0.05)]);
        let flags = detect(&h, &d);
        assert_eq!(flags.counts().jumps, 0, "delta equal to jump threshold must not be flagged");
        assert_eq!(flags.counts().drops, 0, "delta equal to drop threshold must not be flagged");
    }

    #[test]
    fn test_absent_delta_is_never_flagged() {
        let h = head(&[Some(1.0), Some(2.0), Some(3.0)]);
        let d = diffs(&[None, Some(f64::NAN), Some(1.0)]);
        let flags = detect(&h, &d);
        assert!(!flags.get(t(0)).unwrap().is_jump);
        assert!(!flags.get(t(1)).unwrap().is_jump);
        assert!(flags.get(t(2)).unwrap().is_jump);
    }

    #[test]
    fn test_custom_thresholds() {
        let h = head(&[Some(1.0), Some(1.0), Some(1.0)]);
        let d = diffs(&[Some(0.2), Some(-0.2), Some(0.0)]);
        let config = DetectorConfig::default().with_thresholds(0.1, -0.1);
        let flags = flag_head_series(&h, &d, &config).unwrap();
        assert_eq!(flags.counts().jumps, 1);
        assert_eq!(flags.counts().drops, 1);
    }

    // --- Domain asymmetry ---------------------------------------------------

    #[test]
    fn test_differences_outside_head_domain_still_flagged() {
        // Head is only present on days 1..=2; differences extend beyond.
        // Outliers are clipped to the head domain but jumps and drops are not.
        let h = head(&[None, Some(1.0), Some(1.1), None]);
        let d = diffs(&[Some(0.5), Some(0.0), Some(0.1), Some(-0.5)]);
        let flags = detect(&h, &d);

        assert_eq!(flags.len(), 4);
        let first = flags.get(t(0)).unwrap();
        assert!(first.is_jump);
        assert_eq!(first.head, None);
        assert!(!first.is_outlier);
        assert!(flags.get(t(3)).unwrap().is_drop);
    }

    #[test]
    fn test_clip_switch_restricts_differences_to_head_domain() {
        let h = head(&[None, Some(1.0), Some(1.1), None]);
        let d = diffs(&[Some(0.5), Some(0.0), Some(0.1), Some(-0.5)]);
        let config = DetectorConfig {
            clip_differences_to_head_domain: true,
            ..DetectorConfig::default()
        };
        let flags = flag_head_series(&h, &d, &config).unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags.counts().jumps, 0);
        assert_eq!(flags.counts().drops, 0);
    }

    #[test]
    fn test_jump_row_carries_head_value_for_marker_placement() {
        let h = head(&[Some(1.0), Some(1.5)]);
        let d = diffs(&[None, Some(0.5)]);
        let flags = detect(&h, &d);
        let jump = flags.jumps().next().expect("one jump");
        assert_eq!(jump.timestamp, t(1));
        assert_eq!(jump.head, Some(1.5));
    }

    // --- Errors and purity --------------------------------------------------

    #[test]
    fn test_all_absent_head_is_error() {
        let h = head(&[None, None]);
        let d = diffs(&[Some(1.0), Some(1.0)]);
        let result = HeadAnomalyDetector::default().detect(&h, &d);
        assert_eq!(result, Err(EmptySeriesError));
    }

    #[test]
    fn test_empty_head_is_error() {
        let result = HeadAnomalyDetector::default().detect(&HeadSeries::default(), &DifferenceSeries::default());
        assert_eq!(result, Err(EmptySeriesError));
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let h = head(&[Some(3.0), None, Some(3.2), Some(9.0), Some(3.1)]);
        let d = diffs(&[None, None, Some(0.2), Some(5.8), Some(-5.9)]);
        let detector = HeadAnomalyDetector::default();
        let first = detector.detect(&h, &d).unwrap();
        let second = detector.detect(&h, &d).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_present_value() {
        let h = head(&[None, Some(4.2), None]);
        let flags = detect(&h, &DifferenceSeries::default());
        assert_eq!(flags.domain, (t(1), t(1)));
        assert_eq!(flags.bounds.iqr, 0.0);
        assert_eq!(flags.counts().outliers, 0);
    }
}
