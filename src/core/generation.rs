//! Capacity scaling of reference-year generation.

use enumset::{EnumSet, EnumSetType, enum_set};
use serde::{Deserialize, Serialize};

use crate::{
    core::series::TimeSeries,
    error::{Error, Result},
    prelude::{info, instrument},
    quantity::{Quantity, power::Megawatts, time::Hours},
};

#[derive(Debug, Hash, Ord, PartialOrd, Serialize, Deserialize, EnumSetType, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Technology {
    #[display("wind onshore")]
    WindOnshore,

    #[display("wind offshore")]
    WindOffshore,

    #[display("solar")]
    Solar,

    #[display("biomass")]
    Biomass,

    #[display("hydro")]
    Hydro,

    #[display("other renewables")]
    OtherRenewable,

    #[display("natural gas")]
    NaturalGas,

    #[display("hard coal")]
    HardCoal,

    #[display("lignite")]
    Lignite,

    #[display("nuclear")]
    Nuclear,

    #[display("other conventional")]
    OtherConventional,
}

impl Technology {
    /// Technologies burning fuel, and therefore paying for fuel and emissions.
    pub const THERMAL: EnumSet<Self> = enum_set!(
        Technology::Biomass
            | Technology::NaturalGas
            | Technology::HardCoal
            | Technology::Lignite
            | Technology::Nuclear
            | Technology::OtherConventional
    );

    pub const RENEWABLE: EnumSet<Self> = enum_set!(
        Technology::WindOnshore
            | Technology::WindOffshore
            | Technology::Solar
            | Technology::Biomass
            | Technology::Hydro
            | Technology::OtherRenewable
    );

    #[must_use]
    pub fn is_thermal(self) -> bool {
        Self::THERMAL.contains(self)
    }

    #[must_use]
    pub fn is_renewable(self) -> bool {
        Self::RENEWABLE.contains(self)
    }

    /// Installed capacity in Germany at the end of 2025.
    pub const fn baseline_2025_capacity(self) -> Megawatts {
        Quantity(match self {
            Self::Solar => 86_408.0,
            Self::WindOnshore => 63_192.0,
            Self::WindOffshore => 9_215.0,
            Self::Biomass => 8_766.0,
            Self::Hydro => 5_350.0,
            Self::OtherRenewable => 446.0,
            Self::NaturalGas => 36_614.0,
            Self::HardCoal => 15_951.0,
            Self::Lignite => 15_176.0,
            Self::Nuclear => 0.0,
            Self::OtherConventional => 12_971.0,
        })
    }
}

/// Historical generation of one technology with the capacity that produced it.
#[derive(Clone, Debug)]
pub struct ReferenceSeries {
    pub technology: Technology,

    /// Megawatt-hours per interval, already on the simulation grid.
    pub series: TimeSeries,

    pub capacity: Megawatts,
}

impl ReferenceSeries {
    /// Mean output relative to the installed capacity.
    #[expect(clippy::cast_precision_loss)]
    pub fn capacity_factor(&self) -> Result<f64> {
        self.check_capacity()?;
        let hours = Hours::QUARTER * self.series.len() as f64;
        Ok(self.series.total() / hours / self.capacity)
    }

    fn check_capacity(&self) -> Result {
        if self.capacity.is_positive() && self.capacity.0.is_finite() {
            Ok(())
        } else {
            Err(Error::ZeroReferenceCapacity {
                technology: self.technology.to_string(),
                capacity: self.capacity.0,
            })
        }
    }
}

/// Generation of one technology in the target year.
#[derive(Clone, Debug)]
#[must_use]
pub struct GenerationSeries {
    pub technology: Technology,
    pub capacity: Megawatts,
    pub series: TimeSeries,
}

/// Scale the reference output linearly to the target capacity.
#[instrument(skip_all, fields(technology = %reference.technology, target = %target))]
pub fn scale(reference: &ReferenceSeries, target: Megawatts) -> Result<GenerationSeries> {
    reference.check_capacity()?;
    if target.0 < 0.0 || !target.0.is_finite() {
        return Err(Error::InvalidParameter(format!(
            "target capacity of {} must be non-negative, got {target}",
            reference.technology,
        )));
    }
    let factor = target / reference.capacity;
    let series = reference.series.scale(factor);
    info!(technology = %reference.technology, factor, total = %series.total(), "scaled");
    Ok(GenerationSeries { technology: reference.technology, capacity: target, series })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn wind_reference() -> ReferenceSeries {
        // 54 TWh over the year, alternating between calm and windy quarter-hours:
        let mean = 54_000_000.0 / 35_040.0;
        let values =
            (0..35_040).map(|index| if index % 2 == 0 { mean * 0.5 } else { mean * 1.5 }).collect();
        ReferenceSeries {
            technology: Technology::WindOnshore,
            series: TimeSeries::try_new("wind", 2030, values).unwrap(),
            capacity: Megawatts::from(54_000.0),
        }
    }

    #[test]
    fn test_scale_wind() {
        let generation = scale(&wind_reference(), Megawatts::from(215_000.0)).unwrap();
        assert_relative_eq!(generation.series.total().as_terawatt_hours(), 215.0, max_relative = 1e-9);
    }

    #[test]
    fn test_shape_preserved() {
        let reference = wind_reference();
        let generation = scale(&reference, Megawatts::from(108_000.0)).unwrap();
        assert_relative_eq!(generation.series.values()[1], 2.0 * reference.series.values()[1]);
    }

    #[test]
    fn test_zero_reference_capacity() {
        let reference = ReferenceSeries { capacity: Megawatts::ZERO, ..wind_reference() };
        let error = scale(&reference, Megawatts::from(1.0)).unwrap_err();
        assert!(matches!(error, Error::ZeroReferenceCapacity { .. }));
    }

    #[test]
    fn test_capacity_factor() {
        // 54 TWh from 54 GW over 8760 hours:
        let capacity_factor = wind_reference().capacity_factor().unwrap();
        assert_relative_eq!(capacity_factor, 1000.0 / 8760.0, max_relative = 1e-9);
    }

    #[test]
    fn test_thermal_flags() {
        assert!(Technology::NaturalGas.is_thermal());
        assert!(Technology::Biomass.is_thermal());
        assert!(!Technology::Solar.is_thermal());
        assert!(!Technology::Hydro.is_thermal());
    }
}
