use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        calendar::Season,
        dispatch::{
            event::EventKind,
            storage::{PerStorage, StorageKind},
        },
    },
    error::{Error, Result},
    quantity::energy::MegawattHours,
};

/// Shares of an imbalance offered to each storage technology.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Split {
    #[serde(default)]
    pub battery: f64,

    #[serde(default)]
    pub pumped_hydro: f64,

    #[serde(default)]
    pub hydrogen: f64,
}

impl Split {
    pub const fn new(battery: f64, pumped_hydro: f64, hydrogen: f64) -> Self {
        Self { battery, pumped_hydro, hydrogen }
    }

    const fn shares(&self) -> PerStorage<f64> {
        PerStorage { battery: self.battery, pumped_hydro: self.pumped_hydro, hydrogen: self.hydrogen }
    }

    fn validate(&self, name: &str) -> Result {
        let shares = [self.battery, self.pumped_hydro, self.hydrogen];
        if shares.iter().any(|share| share.is_nan() || *share < 0.0) {
            return Err(Error::InvalidParameter(format!("split `{name}` has a negative share")));
        }
        let total: f64 = shares.iter().sum();
        if total > 1.0 + 1e-9 {
            return Err(Error::InvalidParameter(format!("split `{name}` sums up to {total}, above one")));
        }
        Ok(())
    }
}

/// Splits per event class and direction.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Splits {
    pub short_peak: Split,
    pub medium_surplus: Split,
    pub medium_deficit_summer: Split,
    pub medium_deficit_winter: Split,
    pub long_surplus: Split,
    pub long_deficit: Split,
}

impl Default for Splits {
    fn default() -> Self {
        Self {
            short_peak: Split::new(0.9, 0.1, 0.0),
            medium_surplus: Split::new(0.2, 0.7, 0.1),
            medium_deficit_summer: Split::new(0.3, 0.7, 0.0),
            medium_deficit_winter: Split::new(0.2, 0.5, 0.3),
            long_surplus: Split::new(0.05, 0.15, 0.8),
            long_deficit: Split::new(0.1, 0.2, 0.7),
        }
    }
}

impl Splits {
    pub fn validate(&self) -> Result {
        self.short_peak.validate("short_peak")?;
        self.medium_surplus.validate("medium_surplus")?;
        self.medium_deficit_summer.validate("medium_deficit_summer")?;
        self.medium_deficit_winter.validate("medium_deficit_winter")?;
        self.long_surplus.validate("long_surplus")?;
        self.long_deficit.validate("long_deficit")
    }

    /// Select the split by the event duration class and the direction of the imbalance.
    ///
    /// The direction may differ from the event sign when the hydrogen must-run turned a surplus into a deficit.
    #[must_use]
    pub const fn select(&self, kind: EventKind, is_surplus: bool, season: Season) -> Option<&Split> {
        match (kind, is_surplus, season) {
            (EventKind::Ignore, _, _) => None,
            (EventKind::ShortPeak, _, _) => Some(&self.short_peak),
            (EventKind::MediumSwing, true, _) => Some(&self.medium_surplus),
            (EventKind::MediumSwing, false, Season::Summer) => Some(&self.medium_deficit_summer),
            (EventKind::MediumSwing, false, Season::Winter) => Some(&self.medium_deficit_winter),
            (EventKind::LongSurplus | EventKind::LongDeficit, true, _) => Some(&self.long_surplus),
            (EventKind::LongSurplus | EventKind::LongDeficit, false, _) => Some(&self.long_deficit),
        }
    }
}

/// Distribute the energy according to the split, respecting the per-storage limits.
///
/// With `overflow`, whatever a technology cannot take is offered to the others from the split,
/// in order of descending share. The allocation never exceeds the energy.
pub fn allocate(
    energy: MegawattHours,
    split: &Split,
    limits: &PerStorage<MegawattHours>,
    overflow: bool,
) -> PerStorage<MegawattHours> {
    let shares = split.shares();
    let mut allocation =
        PerStorage::from_fn(|kind| (energy * shares[kind]).min(limits[kind]).max(MegawattHours::ZERO));
    if !overflow {
        return allocation;
    }

    let mut remainder = energy - allocation.iter().map(|(_, allocated)| *allocated).sum::<MegawattHours>();
    let order = StorageKind::all()
        .filter(|kind| shares[*kind] > 0.0)
        .sorted_by_key(|kind| std::cmp::Reverse(OrderedFloat(shares[*kind])));
    for kind in order {
        if !remainder.is_positive() {
            break;
        }
        let extra = (limits[kind] - allocation[kind]).max(MegawattHours::ZERO).min(remainder);
        allocation[kind] += extra;
        remainder -= extra;
    }
    allocation
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn limits(battery: f64, pumped_hydro: f64, hydrogen: f64) -> PerStorage<MegawattHours> {
        PerStorage {
            battery: MegawattHours::from(battery),
            pumped_hydro: MegawattHours::from(pumped_hydro),
            hydrogen: MegawattHours::from(hydrogen),
        }
    }

    #[test]
    fn test_default_splits_are_valid() {
        assert!(Splits::default().validate().is_ok());
    }

    #[test]
    fn test_validate_sum() {
        let splits = Splits { short_peak: Split::new(0.9, 0.2, 0.0), ..Splits::default() };
        assert!(splits.validate().is_err());
    }

    #[test]
    fn test_select() {
        let splits = Splits::default();
        assert_eq!(splits.select(EventKind::Ignore, true, Season::Summer), None);
        assert_eq!(
            splits.select(EventKind::MediumSwing, false, Season::Winter),
            Some(&splits.medium_deficit_winter),
        );
        assert_eq!(
            splits.select(EventKind::LongSurplus, false, Season::Summer),
            Some(&splits.long_deficit),
        );
    }

    #[test]
    fn test_within_limits() {
        let allocation =
            allocate(MegawattHours::from(600.0), &Split::new(0.9, 0.1, 0.0), &limits(1000.0, 1000.0, 1000.0), true);
        assert_abs_diff_eq!(allocation.battery.0, 540.0);
        assert_abs_diff_eq!(allocation.pumped_hydro.0, 60.0);
        assert_abs_diff_eq!(allocation.hydrogen.0, 0.0);
    }

    #[test]
    fn test_overflow() {
        let allocation =
            allocate(MegawattHours::from(600.0), &Split::new(0.9, 0.1, 0.0), &limits(100.0, 1000.0, 1000.0), true);
        assert_abs_diff_eq!(allocation.battery.0, 100.0);
        assert_abs_diff_eq!(allocation.pumped_hydro.0, 500.0);

        // Hydrogen has no share, so it never takes the overflow:
        assert_abs_diff_eq!(allocation.hydrogen.0, 0.0);
    }

    #[test]
    fn test_remainder_stays() {
        let allocation =
            allocate(MegawattHours::from(600.0), &Split::new(0.9, 0.1, 0.0), &limits(100.0, 50.0, 1000.0), true);
        assert_abs_diff_eq!(allocation.battery.0, 100.0);
        assert_abs_diff_eq!(allocation.pumped_hydro.0, 50.0);
    }

    #[test]
    fn test_no_overflow() {
        let allocation =
            allocate(MegawattHours::from(600.0), &Split::new(0.9, 0.1, 0.0), &limits(100.0, 1000.0, 1000.0), false);
        assert_abs_diff_eq!(allocation.battery.0, 100.0);
        assert_abs_diff_eq!(allocation.pumped_hydro.0, 60.0);
    }
}
