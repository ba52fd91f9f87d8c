//! One simulated target year, from load profiles to the levelized cost.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    core::{
        balance::{Balance, BalanceMetrics},
        calendar::Calendar,
        demand::{DemandSynthesizer, HeatPumpProfile, LoadProfileShape, Sector, SectorDemand, ValidationSummary},
        dispatch::{DispatchResult, DispatchState, Dispatcher, EventKind, StorageKind},
        economics::{AssetUsage, CostBreakdown, EconomicCalculator},
        generation::{self, GenerationSeries, ReferenceSeries, Technology},
        mobility::{Fleet, FleetResult},
        scoring::{Scorecard, ScoringInputs},
        series::TimeSeries,
    },
    error::{Error, Result},
    prelude::{info, instrument},
    quantity::energy::MegawattHours,
    scenario::{Settings, YearScenario},
};

/// Inputs already conformed to the grid of the target year.
#[derive(Clone, Debug, Default)]
pub struct YearInputs {
    pub profiles: Vec<LoadProfileShape>,
    pub heat_pump_profile: Option<HeatPumpProfile>,
    pub temperature: Option<TimeSeries>,
    pub references: Vec<ReferenceSeries>,
}

impl YearInputs {
    fn profile(&self, sector: Sector) -> Result<&LoadProfileShape> {
        self.profiles
            .iter()
            .find(|profile| profile.sector() == sector)
            .ok_or_else(|| Error::InvalidParameter(format!("no load profile for {sector}")))
    }

    fn reference(&self, technology: Technology) -> Option<&ReferenceSeries> {
        self.references.iter().find(|reference| reference.technology == technology)
    }
}

#[derive(Clone, Debug)]
pub struct YearOutcome {
    pub year: i32,
    pub demands: Vec<SectorDemand>,
    pub generation: Vec<GenerationSeries>,

    /// Of the reference series, by technology.
    pub capacity_factors: BTreeMap<Technology, f64>,

    pub balance: Balance,
    pub metrics: BalanceMetrics,

    /// Metrics of the residual left after the storage dispatch.
    pub metrics_after_dispatch: BalanceMetrics,

    /// Electric vehicles, dispatched ahead of the storages.
    pub fleet: Option<FleetResult>,

    pub dispatch: DispatchResult,
    pub costs: CostBreakdown,
    pub scorecard: Scorecard,
    pub validation: ValidationSummary,
}

/// Machine-readable summary of a simulated year.
#[derive(Clone, Debug, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub metrics: BalanceMetrics,
    pub metrics_after_dispatch: BalanceMetrics,
    pub capacity_factors: BTreeMap<Technology, f64>,
    pub storage: Vec<StorageSummary>,
    pub fleet: Option<FleetSummary>,
    pub event_counts: BTreeMap<EventKind, usize>,
    pub n_clamped: usize,
    pub costs: CostBreakdown,
    pub scorecard: Scorecard,
    pub validation: ValidationSummary,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct FleetSummary {
    pub capacity: MegawattHours,
    pub charged: MegawattHours,
    pub discharged: MegawattHours,
    pub driven: MegawattHours,
    pub unmet_drive: MegawattHours,
    pub mean_soc_fraction: f64,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct StorageSummary {
    pub kind: StorageKind,
    pub charged: MegawattHours,
    pub discharged: MegawattHours,
    pub final_soc: MegawattHours,
    pub final_soc_fraction: f64,
}

impl YearOutcome {
    pub fn summary(&self) -> YearSummary {
        let storage = StorageKind::all()
            .map(|kind| {
                let trace = &self.dispatch.traces[kind];
                let state = &self.dispatch.final_state.storages[kind];
                StorageSummary {
                    kind,
                    charged: trace.total_charged(),
                    discharged: trace.total_discharged(),
                    final_soc: state.soc,
                    final_soc_fraction: state.fraction(),
                }
            })
            .collect();
        YearSummary {
            year: self.year,
            metrics: self.metrics,
            metrics_after_dispatch: self.metrics_after_dispatch,
            capacity_factors: self.capacity_factors.clone(),
            storage,
            fleet: self.fleet.as_ref().map(|fleet| FleetSummary {
                capacity: fleet.capacity,
                charged: fleet.charged.total(),
                discharged: fleet.discharged.total(),
                driven: fleet.driven.total(),
                unmet_drive: fleet.unmet_drive,
                mean_soc_fraction: fleet.mean_soc(),
            }),
            event_counts: self.dispatch.event_counts.clone(),
            n_clamped: self.dispatch.n_clamped,
            costs: self.costs.clone(),
            scorecard: self.scorecard.clone(),
            validation: self.validation.clone(),
        }
    }
}

/// Simulate one target year.
#[instrument(skip_all, fields(year = scenario.year))]
pub fn run_year(inputs: &YearInputs, scenario: &YearScenario, settings: &Settings) -> Result<YearOutcome> {
    let calendar = Calendar::new(scenario.year, &settings.holidays)?
        .with_christmas_as_saturday(settings.christmas_as_saturday);

    // Demand:
    let synthesizer = DemandSynthesizer::new(&calendar);
    let mut demands = scenario
        .demand
        .keys()
        .map(|sector| synthesizer.synthesize(inputs.profile(*sector)?, scenario.demand_target(*sector)))
        .collect::<Result<Vec<_>>>()?;
    if let Some(fleet) = &scenario.heat_pumps {
        let (Some(profile), Some(temperature)) = (&inputs.heat_pump_profile, &inputs.temperature) else {
            return Err(Error::InvalidParameter(
                "heat pumps need a temperature series and a heat pump profile".to_string(),
            ));
        };
        demands.push(synthesizer.heat_pumps(profile, temperature, fleet)?);
    }
    let validation = ValidationSummary::new(&demands);

    // Generation:
    let mut generation = Vec::with_capacity(scenario.capacities.len());
    let mut capacity_factors = BTreeMap::new();
    for (technology, target) in &scenario.capacities {
        let Some(reference) = inputs.reference(*technology) else {
            if target.is_positive() {
                return Err(Error::InvalidParameter(format!("no reference series for {technology}")));
            }
            continue;
        };
        capacity_factors.insert(*technology, reference.capacity_factor()?);
        generation.push(generation::scale(reference, *target)?);
    }

    // Balance, e-mobility and storage dispatch:
    let balance = Balance::compute(&demands, &generation)?;
    let metrics = balance.metrics();
    let fleet = match scenario.mobility {
        Some(parameters) => Some(Fleet::new(parameters)?.run(&calendar, &balance.residual)?),
        None => None,
    };
    let before_storage = fleet.as_ref().map_or(&balance.residual, |fleet| &fleet.residual);
    let specs = scenario.storage_specs()?;
    let dispatch = Dispatcher::new(settings.dispatch)?.run(before_storage, DispatchState::new(&specs)?)?;
    let metrics_after_dispatch = BalanceMetrics::new(&balance.generation, &balance.demand, &dispatch.residual);

    // Economics:
    let usages: Vec<AssetUsage> = generation
        .iter()
        .map(|series| {
            AssetUsage::generation(
                series.technology,
                scenario.base_capacity(series.technology),
                series.capacity,
                series.series.total(),
            )
        })
        .chain(StorageKind::all().map(|kind| {
            let spec = &specs[kind];
            AssetUsage::storage(
                kind,
                scenario.storage_base_capacity(kind, spec),
                spec.capacity,
                spec.max_discharge_power,
                dispatch.traces[kind].total_discharged(),
            )
        }))
        .collect();
    let costs = EconomicCalculator::new(settings.economics, &settings.costs).calculate(&usages, metrics.total_demand)?;

    let scorecard = Scorecard::new(&ScoringInputs {
        generation: &generation,
        demand: &balance.demand,
        residual_before_storage: before_storage,
        residual_after: &dispatch.residual,
        storage_charged: dispatch.traces.iter().map(|(_, trace)| trace.total_charged()).sum(),
        storage_discharged: dispatch.traces.iter().map(|(_, trace)| trace.total_discharged()).sum(),
        hydrogen_soc: &dispatch.traces.hydrogen.soc,
        hydrogen_capacity: specs.hydrogen.capacity,
        lcoe_cents_per_kilowatt_hour: costs.lcoe_cents_per_kilowatt_hour(),
    })?;

    info!(
        year = scenario.year,
        autarky = metrics.autarky,
        autarky_after_dispatch = metrics_after_dispatch.autarky,
        lcoe = %costs.system_lcoe,
        score = scorecard.overall,
        "simulated",
    );
    Ok(YearOutcome {
        year: scenario.year,
        demands,
        generation,
        capacity_factors,
        balance,
        metrics,
        metrics_after_dispatch,
        fleet,
        dispatch,
        costs,
        scorecard,
        validation,
    })
}

/// Simulate the years concurrently, each with its own freshly prepared inputs.
///
/// Outcomes come back in the order of the years.
pub fn run_years<F>(years: &[YearScenario], settings: &Settings, prepare: F) -> Result<Vec<YearOutcome>>
where
    F: Fn(i32) -> Result<YearInputs> + Sync,
{
    years.par_iter().map(|scenario| run_year(&prepare(scenario.year)?, scenario, settings)).collect()
}
