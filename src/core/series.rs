//! Year-long quarter-hour series.

pub mod conform;
mod stats;

use chrono::NaiveDateTime;
use serde::Serialize;

pub use self::{
    conform::{Conform, Sampling, YearAlignment},
    stats::{Percentiles, Quantiles},
};
use crate::{
    core::calendar::{n_intervals, year_grid},
    error::{Error, Result},
    quantity::energy::MegawattHours,
};

/// Values on the quarter-hour grid of one calendar year.
///
/// The length always matches the year: 35 040 intervals, or 35 136 in a leap year.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[must_use]
pub struct TimeSeries {
    year: i32,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn try_new(label: &str, year: i32, values: Vec<f64>) -> Result<Self> {
        let expected = n_intervals(year);
        if values.len() == expected {
            Ok(Self { year, values })
        } else {
            Err(Error::GridMisaligned {
                label: label.to_string(),
                year,
                expected,
                actual: values.len(),
            })
        }
    }

    pub fn zeros(year: i32) -> Self {
        Self { year, values: vec![0.0; n_intervals(year)] }
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Timestamped values, starting at midnight of January 1st.
    pub fn points(&self) -> impl Iterator<Item = (NaiveDateTime, f64)> + '_ {
        year_grid(self.year).zip(self.iter())
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Sum of a series holding megawatt-hours per interval.
    pub fn total(&self) -> MegawattHours {
        MegawattHours::from(self.sum())
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self { year: self.year, values: self.values.iter().copied().map(f).collect() }
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map(|value| value * factor)
    }

    /// Ensure the other series sits on the same grid.
    pub fn check_aligned(&self, label: &str, other: &Self) -> Result {
        if self.year == other.year && self.len() == other.len() {
            Ok(())
        } else {
            Err(Error::GridMisaligned {
                label: label.to_string(),
                year: self.year,
                expected: self.len(),
                actual: other.len(),
            })
        }
    }

    /// Element-wise sum of series sharing one grid.
    pub fn try_sum<'a>(
        year: i32,
        series: impl IntoIterator<Item = (&'a str, &'a Self)>,
    ) -> Result<Self> {
        let mut total = Self::zeros(year);
        for (label, series) in series {
            total.check_aligned(label, series)?;
            for (sum, value) in total.values.iter_mut().zip(&series.values) {
                *sum += value;
            }
        }
        Ok(total)
    }

    /// Element-wise `self - other`.
    pub fn try_sub(&self, label: &str, other: &Self) -> Result<Self> {
        self.check_aligned(label, other)?;
        Ok(Self {
            year: self.year,
            values: self.values.iter().zip(&other.values).map(|(lhs, rhs)| lhs - rhs).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_try_new_length() {
        assert!(TimeSeries::try_new("ok", 2030, vec![0.0; 35_040]).is_ok());
        let error = TimeSeries::try_new("short", 2030, vec![0.0; 35_039]).unwrap_err();
        assert!(matches!(error, Error::GridMisaligned { expected: 35_040, actual: 35_039, .. }));
        assert!(TimeSeries::try_new("leap", 2028, vec![0.0; 35_040]).is_err());
    }

    #[test]
    fn test_try_sum() {
        let a = TimeSeries::zeros(2030).map(|_| 1.0);
        let b = TimeSeries::zeros(2030).map(|_| 2.0);
        let sum = TimeSeries::try_sum(2030, [("a", &a), ("b", &b)]).unwrap();
        assert_abs_diff_eq!(sum.sum(), 3.0 * 35_040.0);
    }

    #[test]
    fn test_try_sum_misaligned() {
        let a = TimeSeries::zeros(2030);
        let b = TimeSeries::zeros(2028);
        assert!(TimeSeries::try_sum(2030, [("a", &a), ("b", &b)]).is_err());
    }

    #[test]
    fn test_points() {
        let series = TimeSeries::zeros(2030);
        let (first, _) = series.points().next().unwrap();
        assert_eq!(first.to_string(), "2030-01-01 00:00:00");
        assert_eq!(series.points().count(), series.len());
    }
}
