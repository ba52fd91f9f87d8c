use std::collections::BTreeMap;

use chrono::Datelike;

use crate::{
    core::{
        calendar::{Calendar, DayType, DayWeighting, INTERVALS_PER_DAY},
        demand::Sector,
    },
    error::{Error, Result},
};

/// Normalized intraday shape of a sector per month and day type.
#[derive(Clone, Debug)]
#[must_use]
pub struct LoadProfileShape {
    sector: Sector,
    weighting: DayWeighting,
    days: BTreeMap<(u32, DayType), [f64; INTERVALS_PER_DAY]>,
}

impl LoadProfileShape {
    pub const fn new(sector: Sector, weighting: DayWeighting) -> Self {
        Self { sector, weighting, days: BTreeMap::new() }
    }

    /// Build from `(month, day type, slot, weight)` rows.
    ///
    /// Every `(month, day type)` that appears must have all 96 slots.
    pub fn from_rows(
        sector: Sector,
        weighting: DayWeighting,
        rows: impl IntoIterator<Item = (u32, DayType, usize, f64)>,
    ) -> Result<Self> {
        let mut partial: BTreeMap<(u32, DayType), [Option<f64>; INTERVALS_PER_DAY]> =
            BTreeMap::new();
        for (month, day_type, slot, weight) in rows {
            check_month(month)?;
            if slot >= INTERVALS_PER_DAY {
                return Err(Error::InvalidParameter(format!(
                    "{sector} profile slot {slot} is out of range"
                )));
            }
            partial.entry((month, day_type)).or_insert([None; INTERVALS_PER_DAY])[slot] =
                Some(weight);
        }
        let mut shape = Self::new(sector, weighting);
        for ((month, day_type), slots) in partial {
            let weights = slots
                .into_iter()
                .collect::<Option<Vec<f64>>>()
                .ok_or(Error::MissingProfileCoverage { sector, month, day_type })?;
            shape.insert(month, day_type, &weights)?;
        }
        Ok(shape)
    }

    pub fn insert(&mut self, month: u32, day_type: DayType, weights: &[f64]) -> Result {
        check_month(month)?;
        let weights: [f64; INTERVALS_PER_DAY] = weights.try_into().map_err(|_| {
            Error::InvalidParameter(format!(
                "{} profile for month {month}, {day_type} has {} slots instead of {INTERVALS_PER_DAY}",
                self.sector,
                weights.len(),
            ))
        })?;
        if let Some(weight) = weights.iter().find(|weight| !weight.is_finite() || **weight < 0.0) {
            return Err(Error::InvalidParameter(format!(
                "{} profile for month {month}, {day_type} has a weight of {weight}",
                self.sector,
            )));
        }
        self.days.insert((month, day_type), weights);
        Ok(())
    }

    #[must_use]
    pub const fn sector(&self) -> Sector {
        self.sector
    }

    #[must_use]
    pub const fn weighting(&self) -> DayWeighting {
        self.weighting
    }

    pub fn weights(&self, month: u32, day_type: DayType) -> Result<&[f64; INTERVALS_PER_DAY]> {
        self.days.get(&(month, day_type)).ok_or(Error::MissingProfileCoverage {
            sector: self.sector,
            month,
            day_type,
        })
    }

    /// Profile sum over the year: every day type's daily sum times its actual number of days.
    ///
    /// With a non-uniform day weighting, each day contributes its own weight instead.
    pub fn weighted_annual_sum(&self, calendar: &Calendar) -> Result<f64> {
        match self.weighting {
            DayWeighting::Uniform => {
                let counts = calendar.day_counts();
                let mut sum = 0.0;
                for month in 1..=12 {
                    for day_type in DayType::ALL {
                        let n_days = counts.get(month, day_type);
                        if n_days != 0 {
                            sum += f64::from(n_days) * self.daily_sum(month, day_type)?;
                        }
                    }
                }
                Ok(sum)
            }
            DayWeighting::Dynamization => calendar
                .days()
                .map(|date| {
                    let daily_sum = self.daily_sum(date.month(), calendar.day_type(date))?;
                    Ok(self.weighting.weight(date) * daily_sum)
                })
                .sum(),
        }
    }

    fn daily_sum(&self, month: u32, day_type: DayType) -> Result<f64> {
        Ok(self.weights(month, day_type)?.iter().sum())
    }
}

fn check_month(month: u32) -> Result {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!("month {month} is out of range")))
    }
}
