use std::ops::{Index, IndexMut};

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    prelude::warn,
    quantity::{Quantity, energy::MegawattHours, power::Megawatts, time::Hours},
};

/// Relative slack below which a bound overshoot is floating-point noise.
const SOC_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Hash, Ord, PartialOrd, Serialize, Deserialize, EnumSetType, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    #[display("battery")]
    Battery,

    #[display("pumped hydro")]
    PumpedHydro,

    #[display("hydrogen")]
    Hydrogen,
}

impl StorageKind {
    pub fn all() -> impl Iterator<Item = Self> {
        EnumSet::<Self>::all().iter()
    }

    /// Installed discharge power in Germany at the end of 2025.
    pub const fn baseline_2025_power(self) -> Megawatts {
        Quantity(match self {
            Self::PumpedHydro => 9_384.0,
            Self::Battery | Self::Hydrogen => 0.0,
        })
    }
}

/// One value per storage technology.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerStorage<T> {
    pub battery: T,
    pub pumped_hydro: T,
    pub hydrogen: T,
}

impl<T> PerStorage<T> {
    pub fn from_fn(mut f: impl FnMut(StorageKind) -> T) -> Self {
        Self {
            battery: f(StorageKind::Battery),
            pumped_hydro: f(StorageKind::PumpedHydro),
            hydrogen: f(StorageKind::Hydrogen),
        }
    }

    pub fn try_from_fn<E>(mut f: impl FnMut(StorageKind) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            battery: f(StorageKind::Battery)?,
            pumped_hydro: f(StorageKind::PumpedHydro)?,
            hydrogen: f(StorageKind::Hydrogen)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (StorageKind, &T)> {
        StorageKind::all().map(move |kind| (kind, &self[kind]))
    }
}

impl<T> Index<StorageKind> for PerStorage<T> {
    type Output = T;

    fn index(&self, kind: StorageKind) -> &Self::Output {
        match kind {
            StorageKind::Battery => &self.battery,
            StorageKind::PumpedHydro => &self.pumped_hydro,
            StorageKind::Hydrogen => &self.hydrogen,
        }
    }
}

impl<T> IndexMut<StorageKind> for PerStorage<T> {
    fn index_mut(&mut self, kind: StorageKind) -> &mut Self::Output {
        match kind {
            StorageKind::Battery => &mut self.battery,
            StorageKind::PumpedHydro => &mut self.pumped_hydro,
            StorageKind::Hydrogen => &mut self.hydrogen,
        }
    }
}

/// Technical parameters of a storage technology.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageSpec {
    #[serde(rename = "capacity_mwh")]
    pub capacity: MegawattHours,

    #[serde(rename = "max_charge_power_mw")]
    pub max_charge_power: Megawatts,

    #[serde(rename = "max_discharge_power_mw")]
    pub max_discharge_power: Megawatts,

    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,
    pub soc_min_fraction: f64,
    pub soc_max_fraction: f64,

    /// Defaults to the lower bound.
    #[serde(default)]
    pub initial_soc_fraction: Option<f64>,
}

impl StorageSpec {
    /// Typical parameters of the technology, with the given size.
    pub const fn typical(
        kind: StorageKind,
        capacity: MegawattHours,
        max_charge_power: Megawatts,
        max_discharge_power: Megawatts,
    ) -> Self {
        let (charge_efficiency, discharge_efficiency, soc_min_fraction, soc_max_fraction) =
            match kind {
                StorageKind::Battery => (0.95, 0.95, 0.05, 0.95),
                StorageKind::PumpedHydro => (0.88, 0.88, 0.0, 1.0),
                StorageKind::Hydrogen => (0.67, 0.58, 0.0, 1.0),
            };
        Self {
            capacity,
            max_charge_power,
            max_discharge_power,
            charge_efficiency,
            discharge_efficiency,
            soc_min_fraction,
            soc_max_fraction,
            initial_soc_fraction: None,
        }
    }

    pub fn validate(&self, kind: StorageKind) -> Result {
        let invalid = |reason: String| Err(Error::InvalidStorage { storage: kind.to_string(), reason });
        if self.capacity.0.is_nan() || self.capacity.0 < 0.0 {
            return invalid(format!("capacity must be non-negative, got {}", self.capacity));
        }
        if !(self.max_charge_power.0 >= 0.0 && self.max_discharge_power.0 >= 0.0) {
            return invalid("power limits must be non-negative".to_string());
        }
        for efficiency in [self.charge_efficiency, self.discharge_efficiency] {
            if !(efficiency > 0.0 && efficiency <= 1.0) {
                return invalid(format!("efficiency must be in (0, 1], got {efficiency}"));
            }
        }
        if !(0.0 <= self.soc_min_fraction
            && self.soc_min_fraction <= self.soc_max_fraction
            && self.soc_max_fraction <= 1.0)
        {
            return invalid(format!(
                "SoC bounds [{}, {}] are not ordered within [0, 1]",
                self.soc_min_fraction, self.soc_max_fraction,
            ));
        }
        if let Some(initial) = self.initial_soc_fraction
            && !(self.soc_min_fraction <= initial && initial <= self.soc_max_fraction)
        {
            return invalid(format!("initial SoC {initial} is outside the bounds"));
        }
        Ok(())
    }

    #[must_use]
    pub fn round_trip_efficiency(&self) -> f64 {
        self.charge_efficiency * self.discharge_efficiency
    }

    pub fn soc_min(&self) -> MegawattHours {
        self.capacity * self.soc_min_fraction
    }

    pub fn soc_max(&self) -> MegawattHours {
        self.capacity * self.soc_max_fraction
    }
}

/// State of charge of one storage technology, with its parameters.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct StorageState {
    pub kind: StorageKind,
    pub spec: StorageSpec,

    /// Stored energy, on the storage side of the efficiency losses.
    pub soc: MegawattHours,
}

impl StorageState {
    pub fn new(kind: StorageKind, spec: StorageSpec) -> Result<Self> {
        spec.validate(kind)?;
        let initial = spec.initial_soc_fraction.unwrap_or(spec.soc_min_fraction);
        Ok(Self { kind, spec, soc: spec.capacity * initial })
    }

    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.spec.capacity.is_positive() { self.soc / self.spec.capacity } else { 0.0 }
    }

    /// Grid-side energy the storage may still absorb in this interval.
    ///
    /// `ceiling` may lower the upper SoC bound, `already` is what was charged earlier in the interval.
    pub fn charge_limit(&self, ceiling: MegawattHours, already: MegawattHours) -> MegawattHours {
        let headroom = (ceiling.min(self.spec.soc_max()) - self.soc).max(MegawattHours::ZERO);
        let power_room = self.spec.max_charge_power * Hours::QUARTER - already;
        (headroom / self.spec.charge_efficiency).min(power_room).max(MegawattHours::ZERO)
    }

    /// Grid-side energy the storage may still deliver in this interval.
    pub fn discharge_limit(&self, floor: MegawattHours, already: MegawattHours) -> MegawattHours {
        let available = (self.soc - floor.max(self.spec.soc_min())).max(MegawattHours::ZERO);
        let power_room = self.spec.max_discharge_power * Hours::QUARTER - already;
        (available * self.spec.discharge_efficiency).min(power_room).max(MegawattHours::ZERO)
    }

    /// Absorb the grid-side energy, returns whether the bounds had to be enforced.
    pub fn charge(&mut self, energy: MegawattHours) -> bool {
        self.soc += energy * self.spec.charge_efficiency;
        self.enforce_bounds()
    }

    /// Deliver the grid-side energy, returns whether the bounds had to be enforced.
    pub fn discharge(&mut self, energy: MegawattHours) -> bool {
        self.soc -= energy / self.spec.discharge_efficiency;
        self.enforce_bounds()
    }

    fn enforce_bounds(&mut self) -> bool {
        let (min, max) = (self.spec.soc_min(), self.spec.soc_max());
        let slack = self.spec.capacity * SOC_TOLERANCE;
        let violated = self.soc < min - slack || self.soc > max + slack;
        if violated {
            warn!(
                storage = %self.kind,
                soc = ?self.soc,
                ?min,
                ?max,
                "state of charge out of bounds, clamping",
            );
        }
        self.soc = self.soc.clamp(min, max);
        violated
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn battery(soc_fraction: f64) -> StorageState {
        let spec = StorageSpec {
            initial_soc_fraction: Some(soc_fraction),
            soc_min_fraction: 0.2,
            soc_max_fraction: 0.8,
            ..StorageSpec::typical(
                StorageKind::Battery,
                MegawattHours::from(2000.0),
                Megawatts::from(4000.0),
                Megawatts::from(4000.0),
            )
        };
        StorageState::new(StorageKind::Battery, spec).unwrap()
    }

    /// Verify normal charging with the efficiency applied once.
    #[test]
    fn test_normal_operation() {
        let mut state = battery(0.5);
        assert!(!state.charge(MegawattHours::from(100.0)));
        assert_abs_diff_eq!(state.soc.0, 1095.0);
        assert!(!state.discharge(MegawattHours::from(95.0)));
        assert_abs_diff_eq!(state.soc.0, 995.0);
    }

    /// Verify capping at the maximum.
    #[test]
    fn test_overflow() {
        let state = battery(0.5);
        let limit = state.charge_limit(MegawattHours::from(f64::INFINITY), MegawattHours::ZERO);
        assert_abs_diff_eq!(limit.0, 600.0 / 0.95);
        let mut state = state;
        assert!(!state.charge(limit));
        assert_abs_diff_eq!(state.soc.0, 1600.0, epsilon = 1e-9);
    }

    /// Verify capping at the minimum.
    #[test]
    fn test_underflow() {
        let state = battery(0.25);
        let limit = state.discharge_limit(MegawattHours::ZERO, MegawattHours::ZERO);
        assert_abs_diff_eq!(limit.0, 100.0 * 0.95);
        let mut state = state;
        assert!(!state.discharge(limit));
        assert_abs_diff_eq!(state.soc.0, 400.0, epsilon = 1e-9);
    }

    /// Verify the power cap including what was already charged this interval.
    #[test]
    fn test_power_limit() {
        let spec = StorageSpec::typical(
            StorageKind::PumpedHydro,
            MegawattHours::from(10_000.0),
            Megawatts::from(400.0),
            Megawatts::from(400.0),
        );
        let state = StorageState::new(StorageKind::PumpedHydro, spec).unwrap();
        let limit = state.charge_limit(spec.soc_max(), MegawattHours::from(40.0));
        assert_abs_diff_eq!(limit.0, 60.0);
    }

    /// Verify that a real overshoot is reported.
    #[test]
    fn test_clamp_is_reported() {
        let mut state = battery(0.79);
        assert!(state.charge(MegawattHours::from(500.0)));
        assert_abs_diff_eq!(state.soc.0, 1600.0);
    }

    #[test]
    fn test_invalid_bounds() {
        let spec = StorageSpec {
            soc_min_fraction: 0.9,
            soc_max_fraction: 0.1,
            ..StorageSpec::typical(
                StorageKind::Battery,
                MegawattHours::from(1.0),
                Megawatts::ZERO,
                Megawatts::ZERO,
            )
        };
        assert!(StorageState::new(StorageKind::Battery, spec).is_err());
    }

    #[test]
    fn test_round_trip() {
        let spec = StorageSpec::typical(
            StorageKind::Hydrogen,
            MegawattHours::ZERO,
            Megawatts::ZERO,
            Megawatts::ZERO,
        );
        assert_abs_diff_eq!(spec.round_trip_efficiency(), 0.67 * 0.58);
    }

    #[test]
    fn test_per_storage_index() {
        let mut values = PerStorage::from_fn(|kind| kind as usize);
        values[StorageKind::Hydrogen] += 10;
        assert_eq!(values.hydrogen, 12);
        assert_eq!(values.iter().map(|(_, value)| *value).sum::<usize>(), 13);
    }
}
