use chrono::{DateTime, TimeDelta, Utc};

use crate::error::FitError;
use crate::models::series::Timeline;

const WATTS_PER_KILOWATT: f64 = 1000.0;

/// Metered smart-meter profile of one site. Read-only for the whole fit.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredProfile {
    pub timeline: Timeline,
    /// Power exported to the grid; the quantity the PV model is fit against.
    pub feedin: Vec<f64>,
    pub production: Option<Vec<f64>>,
    pub load: Option<Vec<f64>>,
}

impl MeasuredProfile {
    pub fn new(timeline: Timeline, feedin: Vec<f64>) -> Result<Self, FitError> {
        timeline.check_aligned(&feedin)?;
        Ok(Self { timeline, feedin, production: None, load: None })
    }

    pub fn with_production(mut self, production: Vec<f64>) -> Result<Self, FitError> {
        self.timeline.check_aligned(&production)?;
        self.production = Some(production);
        Ok(self)
    }

    pub fn with_load(mut self, load: Vec<f64>) -> Result<Self, FitError> {
        self.timeline.check_aligned(&load)?;
        self.load = Some(load);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    /// Converts every column from kW to W.
    pub fn to_watts(&self) -> Self {
        let scale = |v: &Vec<f64>| v.iter().map(|x| x * WATTS_PER_KILOWATT).collect::<Vec<_>>();
        Self {
            timeline: self.timeline.clone(),
            feedin: scale(&self.feedin),
            production: self.production.as_ref().map(scale),
            load: self.load.as_ref().map(scale),
        }
    }

    /// Mean-aggregates the profile into fixed buckets of `minutes`.
    ///
    /// Buckets are aligned to the Unix epoch, so any divisor of a day lines
    /// up with midnight. Empty buckets between the first and last sample are
    /// kept as NaN to preserve a fixed frequency.
    pub fn resample(&self, minutes: u32) -> Result<Self, FitError> {
        if minutes == 0 {
            return Err(FitError::InvalidInterval(minutes));
        }
        let step = i64::from(minutes) * 60;
        let bucket_of = |t: &DateTime<Utc>| t.timestamp().div_euclid(step) * step;

        let first = bucket_of(&self.timeline.first());
        let last = bucket_of(&self.timeline.last());
        let n_buckets = ((last - first) / step + 1) as usize;

        let mut index = Vec::with_capacity(self.len());
        for t in self.timeline.iter() {
            index.push(((bucket_of(t) - first) / step) as usize);
        }

        let aggregate = |values: &[f64]| -> Vec<f64> {
            let mut sums = vec![0.0; n_buckets];
            let mut counts = vec![0usize; n_buckets];
            for (&b, &v) in index.iter().zip(values) {
                if !v.is_nan() {
                    sums[b] += v;
                    counts[b] += 1;
                }
            }
            sums.iter()
                .zip(&counts)
                .map(|(s, &c)| if c == 0 { f64::NAN } else { s / c as f64 })
                .collect()
        };

        let origin = DateTime::<Utc>::from_timestamp(first, 0).ok_or(FitError::EmptyTimeline)?;
        let timeline = Timeline::regular(origin, TimeDelta::seconds(step), n_buckets)?;
        Ok(Self {
            timeline,
            feedin: aggregate(&self.feedin),
            production: self.production.as_deref().map(aggregate),
            load: self.load.as_deref().map(aggregate),
        })
    }

    /// Column the model comparison scores against: production when metered,
    /// feed-in otherwise.
    pub fn production_or_feedin(&self) -> &[f64] {
        self.production.as_deref().unwrap_or(&self.feedin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quarter_hourly(values: Vec<f64>) -> MeasuredProfile {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let timeline = Timeline::regular(start, TimeDelta::minutes(15), values.len()).unwrap();
        MeasuredProfile::new(timeline, values).unwrap()
    }

    #[test]
    fn test_to_watts_scales_all_columns() {
        let p = quarter_hourly(vec![0.5, 1.25]).with_production(vec![1.0, 2.0]).unwrap();
        let w = p.to_watts();
        assert_eq!(w.feedin, vec![500.0, 1250.0]);
        assert_eq!(w.production, Some(vec![1000.0, 2000.0]));
        assert_eq!(w.load, None);
    }

    #[test]
    fn test_resample_to_hourly_mean() {
        let p = quarter_hourly(vec![1.0, 2.0, 3.0, 4.0, 10.0, f64::NAN, 20.0, 30.0]);
        let r = p.resample(60).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.feedin, vec![2.5, 20.0]);
        assert_eq!(r.timeline.first(), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_resample_rejects_zero_interval() {
        let p = quarter_hourly(vec![1.0]);
        assert_eq!(p.resample(0), Err(FitError::InvalidInterval(0)));
    }

    #[test]
    fn test_new_checks_alignment() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let timeline = Timeline::regular(start, TimeDelta::hours(1), 3).unwrap();
        let err = MeasuredProfile::new(timeline, vec![1.0]).unwrap_err();
        assert_eq!(err, FitError::LengthMismatch { expected: 3, actual: 1 });
    }
}
