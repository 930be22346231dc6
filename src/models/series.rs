use chrono::{DateTime, TimeDelta, Utc};

use crate::error::FitError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Ordered, non-empty sequence of timestamps every series in a fit is aligned to.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline(Vec<DateTime<Utc>>);

impl Timeline {
    /// Builds a timeline from strictly increasing timestamps.
    pub fn from_vec(timestamps: Vec<DateTime<Utc>>) -> Result<Self, FitError> {
        if timestamps.is_empty() {
            return Err(FitError::EmptyTimeline);
        }
        if let Some(index) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(FitError::UnorderedTimeline { index: index + 1 });
        }
        Ok(Self(timestamps))
    }

    /// Fixed-frequency timeline of `len` samples starting at `start`.
    pub fn regular(start: DateTime<Utc>, step: TimeDelta, len: usize) -> Result<Self, FitError> {
        Self::from_vec((0..len as i32).map(|i| start + step * i).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[DateTime<Utc>] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.0.iter()
    }

    pub fn first(&self) -> DateTime<Utc> {
        self.0[0]
    }

    pub fn last(&self) -> DateTime<Utc> {
        self.0[self.0.len() - 1]
    }

    /// Fails with `LengthMismatch` unless `values` has one sample per timestamp.
    pub fn check_aligned(&self, values: &[f64]) -> Result<(), FitError> {
        if values.len() != self.0.len() {
            return Err(FitError::LengthMismatch { expected: self.0.len(), actual: values.len() });
        }
        Ok(())
    }
}

/// Maximum ignoring NaN samples; NaN when nothing is finite.
pub fn series_max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or(f64::NAN)
}

/// Mean ignoring NaN samples; NaN when nothing is finite.
pub fn series_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}

/// Rolling 24h maximum broadcast back to every sample.
///
/// Bins are 24 hours wide and anchored at the first timestamp of the
/// timeline, so a timeline starting at midnight yields calendar days.
pub fn daily_max(timeline: &Timeline, values: &[f64]) -> Vec<f64> {
    let origin = timeline.first();
    group_max(timeline, values, |t| (*t - origin).num_seconds().div_euclid(SECONDS_PER_DAY))
}

/// Maximum per calendar date (UTC) broadcast back to every sample.
pub fn calendar_daily_max(timeline: &Timeline, values: &[f64]) -> Vec<f64> {
    group_max(timeline, values, |t| t.date_naive())
}

fn group_max<K, F>(timeline: &Timeline, values: &[f64], key: F) -> Vec<f64>
where
    K: PartialEq + Copy,
    F: Fn(&DateTime<Utc>) -> K,
{
    // Timeline is sorted, so every group is a contiguous run.
    let mut out = Vec::with_capacity(values.len());
    let mut start = 0;
    let ts = timeline.as_slice();
    while start < ts.len() {
        let k = key(&ts[start]);
        let end = ts[start..].iter().position(|t| key(t) != k).map_or(ts.len(), |p| start + p);
        let m = series_max(&values[start..end]);
        out.extend(std::iter::repeat_n(m, end - start));
        start = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hourly(len: usize) -> Timeline {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        Timeline::regular(start, TimeDelta::hours(1), len).unwrap()
    }

    #[test]
    fn test_timeline_rejects_empty_and_unordered() {
        assert_eq!(Timeline::from_vec(vec![]), Err(FitError::EmptyTimeline));
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let err = Timeline::from_vec(vec![t, t + TimeDelta::hours(1), t]).unwrap_err();
        assert_eq!(err, FitError::UnorderedTimeline { index: 2 });
    }

    #[test]
    fn test_daily_max_anchored_at_first_timestamp() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let timeline = Timeline::regular(start, TimeDelta::hours(12), 4).unwrap();
        let values = [1.0, 5.0, 2.0, 3.0];
        // Bins: [12:00 day1, 00:00 day2] and [12:00 day2, 00:00 day3]
        assert_eq!(daily_max(&timeline, &values), vec![5.0, 5.0, 3.0, 3.0]);
        // Calendar bins: day1 = {1}, day2 = {5, 2}, day3 = {3}
        assert_eq!(calendar_daily_max(&timeline, &values), vec![1.0, 5.0, 5.0, 3.0]);
    }

    #[test]
    fn test_daily_max_broadcasts_per_day() {
        let timeline = hourly(48);
        let values: Vec<f64> = (0..48).map(|i| i as f64).collect();
        let m = daily_max(&timeline, &values);
        assert!(m[..24].iter().all(|&v| v == 23.0));
        assert!(m[24..].iter().all(|&v| v == 47.0));
    }

    #[test]
    fn test_max_and_mean_skip_nan() {
        assert_eq!(series_max(&[1.0, f64::NAN, 3.0]), 3.0);
        assert_eq!(series_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(series_max(&[f64::NAN]).is_nan());
        assert!(series_mean(&[]).is_nan());
    }
}
