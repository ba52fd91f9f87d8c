//! Sector demand synthesis from standard load profiles.

mod heat_pump;
mod profile;
mod validation;

use serde::{Deserialize, Serialize};

pub use self::{
    heat_pump::{HeatPumpFleet, HeatPumpProfile, N_TEMPERATURE_BINS, TemperatureBin},
    profile::LoadProfileShape,
    validation::{SectorValidation, ValidationSummary},
};
use crate::{
    core::{calendar::Calendar, series::TimeSeries},
    error::{Error, Result},
    prelude::{info, instrument},
    quantity::energy::MegawattHours,
};

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
pub enum Sector {
    #[display("household")]
    Household,

    #[display("commerce")]
    Commerce,

    #[display("agriculture")]
    Agriculture,

    #[display("heat pumps")]
    HeatPump,
}

/// Demand of one sector in megawatt-hours per interval.
#[derive(Clone, Debug)]
#[must_use]
pub struct SectorDemand {
    pub sector: Sector,

    /// Annual energy the series was synthesized for.
    pub target: MegawattHours,

    pub series: TimeSeries,
}

impl SectorDemand {
    pub fn achieved(&self) -> MegawattHours {
        self.series.total()
    }
}

/// Scales normalized profiles onto the calendar of one year.
#[derive(Copy, Clone)]
pub struct DemandSynthesizer<'a> {
    calendar: &'a Calendar,
}

impl<'a> DemandSynthesizer<'a> {
    pub const fn new(calendar: &'a Calendar) -> Self {
        Self { calendar }
    }

    /// Distribute the annual target over the year following the sector's shape.
    ///
    /// The sum of the result equals the target up to floating-point error.
    #[instrument(skip_all, fields(sector = %shape.sector(), year = self.calendar.year()))]
    pub fn synthesize(&self, shape: &LoadProfileShape, target: MegawattHours) -> Result<SectorDemand> {
        if target.0 < 0.0 || !target.0.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "{} demand target must be non-negative, got {target}",
                shape.sector(),
            )));
        }
        let annual_sum = shape.weighted_annual_sum(self.calendar)?;
        if annual_sum <= 0.0 {
            return Err(Error::NonPositiveNormalization { sector: shape.sector(), sum: annual_sum });
        }
        let factor = target.0 / annual_sum;
        let values = self
            .calendar
            .labels(shape.weighting())
            .into_iter()
            .map(|label| Ok(shape.weights(label.month, label.day_type)?[label.slot] * label.weight * factor))
            .collect::<Result<Vec<f64>>>()?;
        let series = TimeSeries::try_new(&shape.sector().to_string(), self.calendar.year(), values)?;
        info!(sector = %shape.sector(), %target, factor, "synthesized");
        Ok(SectorDemand { sector: shape.sector(), target, series })
    }

    /// Electrical demand of the heat pump fleet, driven by outdoor temperature.
    #[instrument(skip_all, fields(year = self.calendar.year(), units = fleet.units))]
    pub fn heat_pumps(
        &self,
        profile: &HeatPumpProfile,
        temperature: &TimeSeries,
        fleet: &HeatPumpFleet,
    ) -> Result<SectorDemand> {
        let reference = TimeSeries::zeros(self.calendar.year());
        reference.check_aligned("temperature", temperature)?;
        let series = profile.electrical_demand(temperature, fleet)?;
        let target = fleet.annual_electrical_demand();
        info!(%target, achieved = %series.total(), "synthesized");
        Ok(SectorDemand { sector: Sector::HeatPump, target, series })
    }

    /// Superpose sectors into the total demand.
    pub fn superpose(&self, demands: &[SectorDemand]) -> Result<TimeSeries> {
        let labels: Vec<String> = demands.iter().map(|demand| demand.sector.to_string()).collect();
        TimeSeries::try_sum(
            self.calendar.year(),
            labels.iter().map(String::as_str).zip(demands.iter().map(|demand| &demand.series)),
        )
    }
}
