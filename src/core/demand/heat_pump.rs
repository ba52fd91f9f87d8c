use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{
    core::{calendar::INTERVALS_PER_DAY, demand::Sector, series::TimeSeries},
    error::{Error, Result},
    quantity::{energy::MegawattHours, time::Hours},
};

pub const N_TEMPERATURE_BINS: usize = 34;

const LOWEST_DEGREES: i32 = -14;

const HIGHEST_DEGREES: i32 = 17;

/// Column of the heat pump profile matrix.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TemperatureBin {
    /// Below −14 °C.
    Low,

    /// Whole degrees from −14 to 17 °C.
    Degrees(i32),

    /// 18 °C and above.
    High,
}

impl TemperatureBin {
    /// Bin of a temperature rounded to whole degrees.
    #[expect(clippy::cast_possible_truncation)]
    pub fn of(celsius: f64) -> Result<Self> {
        if !celsius.is_finite() {
            return Err(Error::InvalidParameter(format!("temperature must be finite, got {celsius}")));
        }
        let rounded = celsius.round();
        Ok(if rounded < f64::from(LOWEST_DEGREES) {
            Self::Low
        } else if rounded > f64::from(HIGHEST_DEGREES) {
            Self::High
        } else {
            Self::Degrees(rounded as i32)
        })
    }

    #[must_use]
    #[expect(clippy::cast_sign_loss)]
    pub const fn column(self) -> usize {
        match self {
            Self::Low => 0,
            Self::Degrees(degrees) => (degrees - LOWEST_DEGREES) as usize + 1,
            Self::High => N_TEMPERATURE_BINS - 1,
        }
    }
}

impl Display for TemperatureBin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Degrees(degrees) => write!(f, "{degrees}"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for TemperatureBin {
    type Err = Error;

    fn from_str(header: &str) -> Result<Self> {
        match header.trim() {
            "LOW" => Ok(Self::Low),
            "HIGH" => Ok(Self::High),
            other => other
                .parse::<i32>()
                .ok()
                .filter(|degrees| (LOWEST_DEGREES..=HIGHEST_DEGREES).contains(degrees))
                .map(Self::Degrees)
                .ok_or_else(|| Error::InvalidParameter(format!("`{other}` is not a temperature bin"))),
        }
    }
}

/// Installed heat pumps of a target year.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct HeatPumpFleet {
    pub units: u32,

    #[serde(rename = "annual_heat_demand_kwh_per_unit")]
    pub annual_heat_demand_per_unit: f64,

    pub average_cop: f64,
}

impl HeatPumpFleet {
    pub fn validate(&self) -> Result {
        if self.average_cop.is_nan() || self.average_cop <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "heat pump COP must be positive, got {}",
                self.average_cop,
            )));
        }
        if self.annual_heat_demand_per_unit.is_nan() || self.annual_heat_demand_per_unit < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "heat demand per unit must be non-negative, got {} kWh",
                self.annual_heat_demand_per_unit,
            )));
        }
        Ok(())
    }

    pub fn annual_thermal_demand(&self) -> MegawattHours {
        MegawattHours::from(f64::from(self.units) * self.annual_heat_demand_per_unit / 1000.0)
    }

    pub fn annual_electrical_demand(&self) -> MegawattHours {
        self.annual_thermal_demand() / self.average_cop
    }
}

/// Relative thermal load per quarter-hour slot and temperature bin.
#[derive(Clone, Debug)]
#[must_use]
pub struct HeatPumpProfile {
    rows: Vec<[Option<f64>; N_TEMPERATURE_BINS]>,
}

impl Default for HeatPumpProfile {
    fn default() -> Self {
        Self { rows: vec![[None; N_TEMPERATURE_BINS]; INTERVALS_PER_DAY] }
    }
}

impl HeatPumpProfile {
    pub fn set(&mut self, slot: usize, bin: TemperatureBin, value: f64) -> Result {
        let row = self.rows.get_mut(slot).ok_or_else(|| {
            Error::InvalidParameter(format!("heat pump profile slot {slot} is out of range"))
        })?;
        if !value.is_finite() || value < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "heat pump profile value {value} at slot {slot}, bin {bin} must be non-negative"
            )));
        }
        row[bin.column()] = Some(value);
        Ok(())
    }

    pub fn value(&self, slot: usize, bin: TemperatureBin) -> Result<f64> {
        self.rows
            .get(slot)
            .and_then(|row| row[bin.column()])
            .ok_or_else(|| Error::MissingHeatPumpColumn { slot, bin: bin.to_string() })
    }

    /// Electrical energy per interval for the whole fleet.
    ///
    /// The thermal profile is normalized so that one unit consumes exactly its annual heat demand,
    /// then divided by the average COP and multiplied by the number of units.
    pub fn electrical_demand(&self, temperature: &TimeSeries, fleet: &HeatPumpFleet) -> Result<TimeSeries> {
        fleet.validate()?;
        let thermal_profile = temperature
            .iter()
            .enumerate()
            .map(|(index, celsius)| self.value(index % INTERVALS_PER_DAY, TemperatureBin::of(celsius)?))
            .collect::<Result<Vec<f64>>>()?;

        let dt = Hours::QUARTER.0;
        let normalization_sum: f64 = thermal_profile.iter().map(|value| value * dt).sum();
        if normalization_sum <= 0.0 {
            return Err(Error::NonPositiveNormalization { sector: Sector::HeatPump, sum: normalization_sum });
        }
        let normalization_factor = fleet.annual_heat_demand_per_unit / normalization_sum;
        let per_interval = normalization_factor * dt / fleet.average_cop * f64::from(fleet.units) / 1000.0;
        TimeSeries::try_new(
            "heat pumps",
            temperature.year(),
            thermal_profile.into_iter().map(|value| value * per_interval).collect(),
        )
    }
}
