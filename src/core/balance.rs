//! Residual balance of generation against demand.

use serde::Serialize;

use crate::{
    core::{
        demand::SectorDemand,
        generation::GenerationSeries,
        series::{Percentiles, Quantiles, TimeSeries},
    },
    error::{Error, Result},
    prelude::{info, instrument},
    quantity::{energy::MegawattHours, power::Megawatts, time::Hours},
};

/// Aggregated generation and demand with their signed difference.
///
/// The residual is positive on surplus and negative on deficit.
#[derive(Clone, Debug)]
#[must_use]
pub struct Balance {
    pub generation: TimeSeries,
    pub demand: TimeSeries,
    pub residual: TimeSeries,
}

impl Balance {
    #[instrument(skip_all, fields(n_demands = demands.len(), n_generators = generation.len()))]
    pub fn compute(demands: &[SectorDemand], generation: &[GenerationSeries]) -> Result<Self> {
        let year = demands
            .first()
            .map(|demand| demand.series.year())
            .ok_or_else(|| Error::InvalidParameter("no demand sectors to balance".to_string()))?;
        let demand_labels: Vec<String> =
            demands.iter().map(|demand| demand.sector.to_string()).collect();
        let generation_labels: Vec<String> =
            generation.iter().map(|generation| generation.technology.to_string()).collect();

        let demand = TimeSeries::try_sum(
            year,
            demand_labels
                .iter()
                .map(String::as_str)
                .zip(demands.iter().map(|demand| &demand.series)),
        )?;
        let generation = TimeSeries::try_sum(
            year,
            generation_labels
                .iter()
                .map(String::as_str)
                .zip(generation.iter().map(|generation| &generation.series)),
        )?;
        let residual = generation.try_sub("demand", &demand)?;

        info!(
            year,
            generation = %generation.total(),
            demand = %demand.total(),
            residual = %residual.total(),
            "balanced",
        );
        Ok(Self { generation, demand, residual })
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.residual.year()
    }

    pub fn metrics(&self) -> BalanceMetrics {
        BalanceMetrics::new(&self.generation, &self.demand, &self.residual)
    }
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct BalanceMetrics {
    pub total_generation: MegawattHours,
    pub total_demand: MegawattHours,
    pub total_surplus: MegawattHours,

    /// Sum of the deficit magnitudes.
    pub total_deficit: MegawattHours,

    pub surplus_hours: Hours,
    pub deficit_hours: Hours,
    pub max_surplus: Megawatts,
    pub max_deficit: Megawatts,

    /// Share of demand covered without imports: `1 − deficit / demand`.
    pub autarky: f64,

    /// Percentiles of the residual load, that is demand minus generation, in megawatts.
    pub residual_load: Option<Percentiles>,
}

impl BalanceMetrics {
    #[expect(clippy::cast_precision_loss)]
    pub fn new(generation: &TimeSeries, demand: &TimeSeries, residual: &TimeSeries) -> Self {
        let to_power = |energy: f64| MegawattHours::from(energy) / Hours::QUARTER;
        let surplus = residual.values().iter().copied().filter(|value| *value > 0.0);
        let deficit = residual.values().iter().copied().filter(|value| *value < 0.0);

        let total_demand = demand.total();
        let total_deficit = MegawattHours::from(-deficit.clone().sum::<f64>());
        let autarky =
            if total_demand.is_positive() { 1.0 - total_deficit / total_demand } else { 1.0 };

        Self {
            total_generation: generation.total(),
            total_demand,
            total_surplus: MegawattHours::from(surplus.clone().sum::<f64>()),
            total_deficit,
            surplus_hours: Hours::QUARTER * surplus.clone().count() as f64,
            deficit_hours: Hours::QUARTER * deficit.clone().count() as f64,
            max_surplus: to_power(surplus.fold(0.0, f64::max)),
            max_deficit: to_power(-deficit.fold(0.0, f64::min)),
            autarky,
            residual_load: residual.iter().map(|value| -to_power(value).0).percentiles(),
        }
    }
}
