//! Fit raw samples onto the quarter-hour grid of a simulation year.

use std::cmp::Ordering;

use bon::Builder;
use chrono::{Datelike, NaiveDateTime, TimeDelta};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        calendar::{INTERVAL_MINUTES, INTERVALS_PER_DAY, n_intervals, year_grid},
        series::TimeSeries,
    },
    error::{Error, Result},
    prelude::{debug, info, instrument},
};

/// Longest gap that is treated as a daylight-saving artifact: one hour.
const MAX_INTERPOLATED_GAP: usize = 4;

/// How a coarser sample is spread over quarter-hours.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sampling {
    /// Temperatures and powers: interpolate linearly.
    #[default]
    Instantaneous,

    /// Energy per interval: split evenly.
    Energy,
}

/// What to do with a series recorded in a year of a different length.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum YearAlignment {
    /// Lengths must match.
    #[default]
    Strict,

    /// Drop the surplus tail, or repeat the last day to fill the missing one.
    TruncateOrRepeat,
}

#[derive(Builder)]
pub struct Conform<'a> {
    label: &'a str,

    /// Target simulation year.
    year: i32,

    #[builder(default)]
    sampling: Sampling,

    #[builder(default)]
    alignment: YearAlignment,
}

impl Conform<'_> {
    #[instrument(skip_all, fields(label = self.label, year = self.year))]
    pub fn apply(&self, points: Vec<(NaiveDateTime, f64)>) -> Result<TimeSeries> {
        let Some(&(first, _)) = points.first() else {
            return Err(self.misaligned(0));
        };
        let (points, n_duplicates) = drop_duplicates(points);
        let points = match detect_step_minutes(&points) {
            Some(INTERVAL_MINUTES) | None => points,
            Some(60) => self.upsample_hourly(&points),
            Some(step) => {
                return Err(Error::InvalidParameter(format!(
                    "`{}` has an unsupported resolution of {step} minutes",
                    self.label,
                )));
            }
        };

        let source_year = first.year();
        let (values, n_interpolated) = self.fill_grid(source_year, points)?;
        if n_duplicates != 0 || n_interpolated != 0 {
            info!(
                label = self.label,
                n_duplicates, n_interpolated, "resolved daylight-saving discontinuities"
            );
        }
        let values = self.align_year(source_year, values)?;
        TimeSeries::try_new(self.label, self.year, values)
    }

    fn upsample_hourly(&self, points: &[(NaiveDateTime, f64)]) -> Vec<(NaiveDateTime, f64)> {
        let mut upsampled = Vec::with_capacity(points.len() * 4);
        for (index, &(timestamp, value)) in points.iter().enumerate() {
            let next = points
                .get(index + 1)
                .filter(|(next, _)| *next - timestamp == TimeDelta::hours(1))
                .map(|(_, next)| *next);
            for quarter in 0..4_i32 {
                let value = match (self.sampling, next) {
                    (Sampling::Energy, _) => value / 4.0,
                    (Sampling::Instantaneous, Some(next)) => {
                        value + (next - value) * f64::from(quarter) / 4.0
                    }
                    (Sampling::Instantaneous, None) => value,
                };
                let offset = TimeDelta::minutes(i64::from(quarter) * INTERVAL_MINUTES);
                upsampled.push((timestamp + offset, value));
            }
        }
        upsampled
    }

    /// Place the samples onto the grid of their own year and interpolate short gaps.
    #[expect(clippy::cast_precision_loss)]
    fn fill_grid(
        &self,
        source_year: i32,
        points: Vec<(NaiveDateTime, f64)>,
    ) -> Result<(Vec<f64>, usize)> {
        let grid = year_grid(source_year).collect_vec();
        let mut slots: Vec<Option<f64>> = Vec::with_capacity(grid.len());
        let mut points = points.into_iter().peekable();
        for timestamp in &grid {
            if let Some((next, _)) = points.peek()
                && next < timestamp
            {
                return Err(Error::InvalidParameter(format!(
                    "`{}` has a sample off the quarter-hour grid at {next}",
                    self.label,
                )));
            }
            match points.peek() {
                Some((next, value)) if next == timestamp => {
                    slots.push(Some(*value));
                    points.next();
                }
                _ => slots.push(None),
            }
        }
        let n_outside = points.count();
        if n_outside != 0 {
            debug!(label = self.label, n_outside, "dropped samples past the end of the year");
        }

        let mut n_interpolated = 0;
        let mut index = 0;
        while index < slots.len() {
            if slots[index].is_some() {
                index += 1;
                continue;
            }
            let start = index;
            while index < slots.len() && slots[index].is_none() {
                index += 1;
            }
            let missing = index - start;
            let (Some(Some(before)), Some(Some(after))) =
                (start.checked_sub(1).map(|i| slots[i]), slots.get(index).copied())
            else {
                return Err(self.gap(&grid, start, missing));
            };
            if missing > MAX_INTERPOLATED_GAP {
                return Err(self.gap(&grid, start, missing));
            }
            for (offset, slot) in slots[start..index].iter_mut().enumerate() {
                let fraction = (offset + 1) as f64 / (missing + 1) as f64;
                *slot = Some(before + (after - before) * fraction);
            }
            n_interpolated += missing;
        }

        Ok((slots.into_iter().flatten().collect(), n_interpolated))
    }

    fn align_year(&self, source_year: i32, mut values: Vec<f64>) -> Result<Vec<f64>> {
        let expected = n_intervals(self.year);
        let actual = values.len();
        match (actual.cmp(&expected), self.alignment) {
            (Ordering::Equal, _) => {}
            (_, YearAlignment::Strict) => return Err(self.misaligned(actual)),
            (Ordering::Greater, YearAlignment::TruncateOrRepeat) => {
                values.truncate(expected);
                info!(label = self.label, source_year, n_dropped = actual - expected, "truncated");
            }
            (Ordering::Less, YearAlignment::TruncateOrRepeat) => {
                while values.len() < expected {
                    let last_day = values.len().saturating_sub(INTERVALS_PER_DAY)..values.len();
                    let n_missing = expected - values.len();
                    let repeated = last_day.start..(last_day.start + n_missing).min(last_day.end);
                    values.extend_from_within(repeated);
                }
                info!(label = self.label, source_year, n_repeated = expected - actual, "extended");
            }
        }
        Ok(values)
    }

    fn misaligned(&self, actual: usize) -> Error {
        Error::GridMisaligned {
            label: self.label.to_string(),
            year: self.year,
            expected: n_intervals(self.year),
            actual,
        }
    }

    fn gap(&self, grid: &[NaiveDateTime], start: usize, missing: usize) -> Error {
        Error::UnresolvedGap {
            label: self.label.to_string(),
            after: grid[start.saturating_sub(1)],
            missing,
        }
    }
}

/// Keep only strictly increasing timestamps, which drops the repeated autumn hour.
fn drop_duplicates(points: Vec<(NaiveDateTime, f64)>) -> (Vec<(NaiveDateTime, f64)>, usize) {
    let n_points = points.len();
    let mut kept: Vec<(NaiveDateTime, f64)> = Vec::with_capacity(n_points);
    for point in points {
        if kept.last().is_none_or(|(last, _)| point.0 > *last) {
            kept.push(point);
        }
    }
    let n_dropped = n_points - kept.len();
    (kept, n_dropped)
}

/// Most frequent step between consecutive samples, in minutes.
fn detect_step_minutes(points: &[(NaiveDateTime, f64)]) -> Option<i64> {
    points
        .iter()
        .tuple_windows()
        .map(|((lhs, _), (rhs, _))| (*rhs - *lhs).num_minutes())
        .counts()
        .into_iter()
        .max_by_key(|(step, count)| (*count, -step))
        .map(|(step, _)| step)
}
