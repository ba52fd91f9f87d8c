//! Quarter-hour calendar of a simulation year.
//!
//! The grid is laid out in naive local time: every day has exactly 96 slots, so the daylight-saving
//! duplicate and gap never appear here. Raw inputs are conformed to this grid by [`crate::core::series::conform`].

mod holidays;
mod season;

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use serde::{Deserialize, Serialize};

pub use self::{
    holidays::{HolidayCalendar, easter_sunday},
    season::{Season, WinterDay},
};
use crate::{error::Result, prelude::instrument};

pub const INTERVALS_PER_DAY: usize = 96;

pub const INTERVAL_MINUTES: i64 = 15;

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum DayType {
    #[display("workday")]
    Workday,

    #[display("Saturday")]
    Saturday,

    /// Sundays and public holidays.
    #[display("holiday")]
    Holiday,
}

impl DayType {
    pub const ALL: [Self; 3] = [Self::Workday, Self::Saturday, Self::Holiday];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Per-day multiplier applied on top of a load profile shape.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DayWeighting {
    #[default]
    Uniform,

    /// BDEW household dynamization polynomial over the day of year.
    Dynamization,
}

impl DayWeighting {
    #[must_use]
    pub fn weight(self, date: NaiveDate) -> f64 {
        match self {
            Self::Uniform => 1.0,
            Self::Dynamization => {
                let t = f64::from(date.ordinal());
                let factor = (-3.92e-10 * t.powi(4)) + (3.20e-7 * t.powi(3))
                    - (7.02e-5 * t.powi(2))
                    + (2.10e-3 * t)
                    + 1.24;
                (factor * 10_000.0).round() / 10_000.0
            }
        }
    }
}

/// Calendar coordinates of one quarter-hour.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Label {
    pub timestamp: NaiveDateTime,
    pub month: u32,
    pub day_type: DayType,

    /// Intraday slot in `0..96`.
    pub slot: usize,

    pub weight: f64,
}

/// Number of days per month and day type.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DayCounts([[u32; 3]; 12]);

impl DayCounts {
    #[must_use]
    pub const fn get(&self, month: u32, day_type: DayType) -> u32 {
        self.0[month as usize - 1][day_type.index()]
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.0.iter().flatten().sum()
    }
}

#[derive(Clone, Debug)]
#[must_use]
pub struct Calendar {
    year: i32,
    holidays: BTreeSet<NaiveDate>,
    christmas_as_saturday: bool,
}

impl Calendar {
    pub fn new(year: i32, holidays: &HolidayCalendar) -> Result<Self> {
        holidays::date(year, 1, 1)?;
        Ok(Self { year, holidays: holidays.dates(year)?, christmas_as_saturday: false })
    }

    /// Treat December 24th and 31st as Saturdays, as BDEW does.
    pub const fn with_christmas_as_saturday(mut self, enabled: bool) -> Self {
        self.christmas_as_saturday = enabled;
        self
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn is_leap(&self) -> bool {
        is_leap_year(self.year)
    }

    #[must_use]
    pub const fn n_days(&self) -> usize {
        if self.is_leap() { 366 } else { 365 }
    }

    #[must_use]
    pub const fn n_intervals(&self) -> usize {
        self.n_days() * INTERVALS_PER_DAY
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let first = NaiveDate::from_yo_opt(self.year, 1);
        first.into_iter().flat_map(|date| date.iter_days()).take(self.n_days())
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + use<> {
        year_grid(self.year)
    }

    #[must_use]
    pub fn day_type(&self, date: NaiveDate) -> DayType {
        let weekday = date.weekday();
        if weekday == Weekday::Sun || self.holidays.contains(&date) {
            DayType::Holiday
        } else if weekday == Weekday::Sat
            || (self.christmas_as_saturday && is_christmas_eve_or_new_years_eve(date))
        {
            DayType::Saturday
        } else {
            DayType::Workday
        }
    }

    #[must_use]
    pub fn day_counts(&self) -> DayCounts {
        let mut counts = DayCounts::default();
        for date in self.days() {
            counts.0[date.month0() as usize][self.day_type(date).index()] += 1;
        }
        counts
    }

    /// Label every quarter-hour of the year.
    #[instrument(skip_all, fields(year = self.year))]
    #[must_use]
    pub fn labels(&self, weighting: DayWeighting) -> Vec<Label> {
        let mut labels = Vec::with_capacity(self.n_intervals());
        for date in self.days() {
            let day_type = self.day_type(date);
            let weight = weighting.weight(date);
            labels.extend(day_timestamps(date).enumerate().map(|(slot, timestamp)| Label {
                timestamp,
                month: date.month(),
                day_type,
                slot,
                weight,
            }));
        }
        labels
    }
}

#[must_use]
pub const fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Quarter-hour timestamps of the year in naive local time.
pub fn year_grid(year: i32) -> impl Iterator<Item = NaiveDateTime> {
    NaiveDate::from_yo_opt(year, 1)
        .into_iter()
        .flat_map(|date| date.iter_days())
        .take_while(move |date| date.year() == year)
        .flat_map(day_timestamps)
}

#[must_use]
pub const fn n_intervals(year: i32) -> usize {
    if is_leap_year(year) { 366 * INTERVALS_PER_DAY } else { 365 * INTERVALS_PER_DAY }
}

#[expect(clippy::cast_possible_wrap)]
fn day_timestamps(date: NaiveDate) -> impl Iterator<Item = NaiveDateTime> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..INTERVALS_PER_DAY)
        .map(move |slot| midnight + TimeDelta::minutes(slot as i64 * INTERVAL_MINUTES))
}

fn is_christmas_eve_or_new_years_eve(date: NaiveDate) -> bool {
    date.month() == 12 && (date.day() == 24 || date.day() == 31)
}
