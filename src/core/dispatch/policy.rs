use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        calendar::{Season, WinterDay},
        dispatch::storage::StorageState,
    },
    error::{Error, Result},
    prelude::debug,
    quantity::{energy::MegawattHours, power::Megawatts, time::Hours},
};

/// Seasonal strategy of the hydrogen storage.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrogenPolicy {
    /// State of charge to reach by November 1st, relative to the capacity.
    pub summer_target_fraction: f64,

    /// Band below the target usable for summer deficits once the target is met.
    pub summer_reserve_fraction: f64,

    /// Share of the winter budget spent during the first [`HydrogenPolicy::winter_front_days`].
    pub winter_front_share: f64,

    pub winter_front_days: u32,

    pub boost_factor: f64,

    /// Deficit power above which the winter baseload is boosted.
    #[serde(rename = "boost_threshold_mw")]
    pub boost_threshold: Megawatts,
}

impl Default for HydrogenPolicy {
    fn default() -> Self {
        Self {
            summer_target_fraction: 0.8,
            summer_reserve_fraction: 0.2,
            winter_front_share: 0.6,
            winter_front_days: 90,
            boost_factor: 1.3,
            boost_threshold: Megawatts::from(10_000.0),
        }
    }
}

/// What the hydrogen storage may do during one interval.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HydrogenDirective {
    /// Grid-side energy to charge before anything else.
    pub must_run: MegawattHours,

    /// Upper bound on the state of charge for opportunistic charging.
    pub charge_ceiling: MegawattHours,

    pub discharge_floor: MegawattHours,

    /// Grid-side energy to discharge before routing, on any deficit.
    pub baseload: MegawattHours,

    /// Grid-side discharge cap, `None` when only the storage limits apply.
    pub discharge_cap: Option<MegawattHours>,
}

/// Discharge budget of the current winter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WinterBudget {
    /// November 1st of the winter the budget belongs to.
    pub start: NaiveDate,

    /// Grid-side energy to spread over the rest of the winter.
    pub energy: MegawattHours,

    /// Sum of the day weights from the recording day till the end of the winter.
    ///
    /// Below one when recorded mid-winter, so the remaining days get the entire budget.
    weight_sum: f64,
}

/// Policy memory carried between intervals.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SeasonalState {
    pub winter_budget: Option<WinterBudget>,

    /// Whether the hydrogen target has been reached during the current summer.
    pub summer_target_reached: bool,
}

impl HydrogenPolicy {
    pub fn validate(&self) -> Result {
        let invalid = |message: &str| Err(Error::InvalidParameter(format!("hydrogen policy: {message}")));
        if !(0.0..=1.0).contains(&self.summer_target_fraction) {
            return invalid("summer target must be within [0, 1]");
        }
        if !(0.0..=self.summer_target_fraction).contains(&self.summer_reserve_fraction) {
            return invalid("summer reserve must be within [0, target]");
        }
        if !(0.0..=1.0).contains(&self.winter_front_share) {
            return invalid("winter front share must be within [0, 1]");
        }
        if self.winter_front_days == 0 || self.winter_front_days >= 181 {
            return invalid("winter front must be shorter than a winter");
        }
        if self.boost_factor.is_nan() || self.boost_factor < 1.0 {
            return invalid("boost factor must be at least 1");
        }
        if self.boost_threshold.0.is_nan() || self.boost_threshold.0 < 0.0 {
            return invalid("boost threshold must be non-negative");
        }
        Ok(())
    }

    /// Evaluate the policy for the interval starting at `timestamp`.
    ///
    /// `balance` is the raw residual balance of the interval.
    pub fn directive(
        &self,
        seasonal: &mut SeasonalState,
        hydrogen: &StorageState,
        timestamp: NaiveDateTime,
        balance: MegawattHours,
    ) -> HydrogenDirective {
        match Season::of(timestamp.date()) {
            Season::Summer => {
                seasonal.winter_budget = None;
                self.summer(seasonal, hydrogen, timestamp, balance)
            }
            Season::Winter => {
                seasonal.summer_target_reached = false;
                self.winter(seasonal, hydrogen, timestamp, balance)
            }
        }
    }

    fn summer(
        &self,
        seasonal: &mut SeasonalState,
        hydrogen: &StorageState,
        timestamp: NaiveDateTime,
        balance: MegawattHours,
    ) -> HydrogenDirective {
        let spec = &hydrogen.spec;
        let target = (spec.capacity * self.summer_target_fraction).clamp(spec.soc_min(), spec.soc_max());
        if hydrogen.soc >= target - spec.capacity * 1e-9 {
            seasonal.summer_target_reached = true;
        }

        // Once the target has been met, a deficit may dip into the reserve band instead of topping up.
        if seasonal.summer_target_reached && balance < MegawattHours::ZERO {
            return HydrogenDirective {
                must_run: MegawattHours::ZERO,
                charge_ceiling: target,
                discharge_floor: target - spec.capacity * self.summer_reserve_fraction,
                baseload: MegawattHours::ZERO,
                discharge_cap: None,
            };
        }

        let gap = (target - hydrogen.soc).max(MegawattHours::ZERO);
        let must_run = Season::summer_end(timestamp).map_or(MegawattHours::ZERO, |end| {
            #[expect(clippy::cast_precision_loss)]
            let remaining = Hours::from((end - timestamp).num_minutes() as f64 / 60.0).max(Hours::QUARTER);
            let power = gap / spec.charge_efficiency / remaining;
            (power * Hours::QUARTER).min(hydrogen.charge_limit(target, MegawattHours::ZERO))
        });
        HydrogenDirective {
            must_run,
            charge_ceiling: target,
            discharge_floor: target - spec.capacity * self.summer_reserve_fraction,
            baseload: MegawattHours::ZERO,
            discharge_cap: (!seasonal.summer_target_reached).then_some(MegawattHours::ZERO),
        }
    }

    fn winter(
        &self,
        seasonal: &mut SeasonalState,
        hydrogen: &StorageState,
        timestamp: NaiveDateTime,
        balance: MegawattHours,
    ) -> HydrogenDirective {
        let spec = &hydrogen.spec;
        let unrestricted = HydrogenDirective {
            must_run: MegawattHours::ZERO,
            charge_ceiling: spec.soc_max(),
            discharge_floor: spec.soc_min(),
            baseload: MegawattHours::ZERO,
            discharge_cap: None,
        };
        let Some(day) = WinterDay::of(timestamp.date()) else {
            return unrestricted;
        };
        let start = timestamp.date() - Days::new(u64::from(day.index));
        let budget = match seasonal.winter_budget {
            Some(budget) if budget.start == start => budget,
            _ => {
                let budget = WinterBudget {
                    start,
                    energy: (hydrogen.soc - spec.soc_min()).max(MegawattHours::ZERO)
                        * spec.discharge_efficiency,
                    weight_sum: (day.index..day.length).map(|index| self.day_weight(index, day.length)).sum(),
                };
                debug!(%start, energy = %budget.energy, "recorded hydrogen winter budget");
                seasonal.winter_budget = Some(budget);
                budget
            }
        };
        if budget.weight_sum <= 0.0 {
            return HydrogenDirective { discharge_cap: Some(MegawattHours::ZERO), ..unrestricted };
        }

        let daily = budget.energy * (self.day_weight(day.index, day.length) / budget.weight_sum);
        let mut baseload = daily / Hours::DAY * Hours::QUARTER;
        if balance < MegawattHours::ZERO && balance.abs() / Hours::QUARTER > self.boost_threshold {
            baseload = baseload * self.boost_factor;
        }

        // The baseload is both the first claim on a deficit and the most hydrogen may deliver:
        HydrogenDirective { baseload, discharge_cap: Some(baseload), ..unrestricted }
    }

    /// Share of the winter budget assigned to the day.
    fn day_weight(&self, index: u32, length: u32) -> f64 {
        if index < self.winter_front_days {
            self.winter_front_share / f64::from(self.winter_front_days)
        } else {
            (1.0 - self.winter_front_share) / f64::from(length.saturating_sub(self.winter_front_days).max(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::NaiveTime;

    use super::*;
    use crate::core::dispatch::storage::{StorageKind, StorageSpec};

    fn hydrogen(soc_fraction: f64) -> StorageState {
        let spec = StorageSpec {
            initial_soc_fraction: Some(soc_fraction),
            ..StorageSpec::typical(
                StorageKind::Hydrogen,
                MegawattHours::from(1_000_000.0),
                Megawatts::from(100_000.0),
                Megawatts::from(100_000.0),
            )
        };
        StorageState::new(StorageKind::Hydrogen, spec).unwrap()
    }

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day).unwrap().and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_day_weights_sum_to_one() {
        let policy = HydrogenPolicy::default();
        for length in [181, 182] {
            let sum: f64 = (0..length).map(|index| policy.day_weight(index, length)).sum();
            assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_summer_must_run() {
        let policy = HydrogenPolicy::default();
        let mut seasonal = SeasonalState::default();
        let state = hydrogen(0.5);
        // 300 000 MWh to go, October 31st has 24 hours left:
        let directive = policy.directive(&mut seasonal, &state, at(2030, 10, 31), MegawattHours::from(5.0));
        assert_abs_diff_eq!(directive.must_run.0, 300_000.0 / 0.67 / 24.0 * 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(directive.charge_ceiling.0, 800_000.0);
        assert_eq!(directive.discharge_cap, Some(MegawattHours::ZERO));
        assert_eq!(directive.baseload, MegawattHours::ZERO);
        assert!(!seasonal.summer_target_reached);
    }

    #[test]
    fn test_summer_reserve() {
        let policy = HydrogenPolicy::default();
        let mut seasonal = SeasonalState::default();
        let state = hydrogen(0.8);
        let directive = policy.directive(&mut seasonal, &state, at(2030, 8, 1), MegawattHours::from(-100.0));
        assert!(seasonal.summer_target_reached);
        assert_eq!(directive.must_run, MegawattHours::ZERO);
        assert_eq!(directive.discharge_cap, None);
        assert_abs_diff_eq!(directive.discharge_floor.0, 600_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_latch_survives_dip() {
        let policy = HydrogenPolicy::default();
        let mut seasonal = SeasonalState { summer_target_reached: true, ..SeasonalState::default() };
        let directive = policy.directive(&mut seasonal, &hydrogen(0.7), at(2030, 8, 1), MegawattHours::from(-100.0));
        assert_eq!(directive.discharge_cap, None);

        // Entering winter resets it:
        policy.directive(&mut seasonal, &hydrogen(0.7), at(2030, 11, 1), MegawattHours::ZERO);
        assert!(!seasonal.summer_target_reached);
    }

    #[test]
    fn test_winter_baseload() {
        let policy = HydrogenPolicy::default();
        let mut seasonal = SeasonalState::default();
        let state = hydrogen(0.8);
        let directive = policy.directive(&mut seasonal, &state, at(2030, 11, 1), MegawattHours::from(-100.0));
        let budget = seasonal.winter_budget.unwrap();
        assert_eq!(budget.start, NaiveDate::from_ymd_opt(2030, 11, 1).unwrap());
        assert_abs_diff_eq!(budget.energy.0, 800_000.0 * 0.58, epsilon = 1e-6);
        let daily = 800_000.0 * 0.58 * 0.6 / 90.0;
        assert_abs_diff_eq!(directive.baseload.0, daily / 96.0, epsilon = 1e-6);
        assert_eq!(directive.discharge_cap, Some(directive.baseload));
        assert_eq!(directive.must_run, MegawattHours::ZERO);
    }

    #[test]
    fn test_winter_boost() {
        let policy = HydrogenPolicy::default();
        let mut seasonal = SeasonalState::default();
        let state = hydrogen(0.8);
        let calm = policy.directive(&mut seasonal, &state, at(2030, 12, 1), MegawattHours::from(-100.0));
        let severe = policy.directive(&mut seasonal, &state, at(2030, 12, 1), MegawattHours::from(-3000.0));
        assert_abs_diff_eq!(severe.baseload.0, calm.baseload.0 * 1.3, epsilon = 1e-9);
    }

    /// Starting mid-winter spreads the budget over the remaining days only.
    #[test]
    fn test_winter_budget_mid_winter() {
        let policy = HydrogenPolicy::default();
        let mut seasonal = SeasonalState::default();
        policy.directive(&mut seasonal, &hydrogen(0.5), at(2030, 1, 1), MegawattHours::ZERO);
        let budget = seasonal.winter_budget.unwrap();
        assert_eq!(budget.start, NaiveDate::from_ymd_opt(2029, 11, 1).unwrap());
        let expected = 0.6 / 90.0 * 29.0 + 0.4;
        assert_abs_diff_eq!(budget.weight_sum, expected, epsilon = 1e-12);

        // The budget is not re-recorded later in the same winter:
        policy.directive(&mut seasonal, &hydrogen(0.1), at(2030, 2, 1), MegawattHours::ZERO);
        assert_eq!(seasonal.winter_budget.unwrap().energy, budget.energy);
    }

    #[test]
    fn test_validate() {
        assert!(HydrogenPolicy::default().validate().is_ok());
        let policy = HydrogenPolicy { summer_reserve_fraction: 0.9, ..HydrogenPolicy::default() };
        assert!(policy.validate().is_err());
    }
}
