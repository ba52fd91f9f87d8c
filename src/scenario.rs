//! Scenario files: what-if parameters for a series of target years.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::{
    core::{
        calendar::{DayWeighting, HolidayCalendar},
        demand::{HeatPumpFleet, Sector},
        dispatch::{DispatchSettings, PerStorage, StorageKind, StorageSpec},
        economics::{Asset, CostParameters, EconomicParameters},
        generation::Technology,
        mobility::FleetParameters,
        series::YearAlignment,
    },
    prelude::*,
    quantity::{energy::MegawattHours, power::Megawatts},
};

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,

    #[serde(default)]
    pub calendar: CalendarSettings,

    /// Per-sector options, keyed by sector.
    #[serde(default)]
    pub sectors: BTreeMap<Sector, SectorSettings>,

    #[serde(default)]
    pub economics: EconomicParameters,

    #[serde(default)]
    pub dispatch: DispatchSettings,

    #[serde(default)]
    pub costs: CostTables,

    pub inputs: InputPaths,

    pub years: Vec<YearScenario>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarSettings {
    #[serde(default)]
    pub holidays: HolidayCalendar,

    /// Treat December 24th and 31st as Saturdays.
    #[serde(default)]
    pub christmas_as_saturday: bool,
}

#[derive(Copy, Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectorSettings {
    #[serde(default)]
    pub weighting: DayWeighting,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CostTables {
    #[serde(default)]
    pub generation: BTreeMap<Technology, CostParameters>,

    #[serde(default)]
    pub storage: BTreeMap<StorageKind, CostParameters>,
}

/// Input files, relative to the scenario file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPaths {
    /// Load profile per sector.
    pub profiles: BTreeMap<Sector, PathBuf>,

    #[serde(default)]
    pub temperature: Option<PathBuf>,

    #[serde(default)]
    pub heat_pump_profile: Option<PathBuf>,

    /// Reference-year generation per technology.
    #[serde(default)]
    pub generation: BTreeMap<Technology, ReferenceInput>,

    /// How to fit reference years of a different length onto the target year.
    #[serde(default)]
    pub alignment: YearAlignment,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceInput {
    pub path: PathBuf,

    /// Installed capacity in the reference year.
    #[serde(rename = "capacity_mw")]
    pub capacity: Megawatts,
}

/// Parameters of one target year.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct YearScenario {
    pub year: i32,

    /// Annual demand per sector in terawatt-hours, heat pumps excluded.
    #[serde(rename = "demand_twh")]
    pub demand: BTreeMap<Sector, f64>,

    #[serde(default)]
    pub heat_pumps: Option<HeatPumpFleet>,

    #[serde(rename = "capacities_mw")]
    pub capacities: BTreeMap<Technology, Megawatts>,

    /// Installed capacities before the build-out, defaults to the 2025 baseline.
    #[serde(default, rename = "base_capacities_mw")]
    pub base_capacities: BTreeMap<Technology, Megawatts>,

    #[serde(default)]
    pub storage: BTreeMap<StorageKind, StorageInput>,

    /// Battery-electric cars charging and feeding back ahead of the storage dispatch.
    #[serde(default)]
    pub mobility: Option<FleetParameters>,
}

/// Storage as written in the scenario: omitted parameters take the technology's typical values.
#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageInput {
    #[serde(rename = "capacity_mwh")]
    pub capacity: MegawattHours,

    #[serde(rename = "max_charge_power_mw")]
    pub max_charge_power: Megawatts,

    #[serde(rename = "max_discharge_power_mw")]
    pub max_discharge_power: Megawatts,

    pub charge_efficiency: Option<f64>,
    pub discharge_efficiency: Option<f64>,
    pub soc_min_fraction: Option<f64>,
    pub soc_max_fraction: Option<f64>,
    pub initial_soc_fraction: Option<f64>,

    /// Energy capacity before the build-out.
    #[serde(rename = "base_capacity_mwh")]
    pub base_capacity: Option<MegawattHours>,
}

impl StorageInput {
    pub fn resolve(&self, kind: StorageKind) -> StorageSpec {
        let typical =
            StorageSpec::typical(kind, self.capacity, self.max_charge_power, self.max_discharge_power);
        StorageSpec {
            charge_efficiency: self.charge_efficiency.unwrap_or(typical.charge_efficiency),
            discharge_efficiency: self.discharge_efficiency.unwrap_or(typical.discharge_efficiency),
            soc_min_fraction: self.soc_min_fraction.unwrap_or(typical.soc_min_fraction),
            soc_max_fraction: self.soc_max_fraction.unwrap_or(typical.soc_max_fraction),
            initial_soc_fraction: self.initial_soc_fraction,
            ..typical
        }
    }
}

/// Run-wide settings resolved from the scenario.
#[derive(Clone, Debug)]
pub struct Settings {
    pub holidays: HolidayCalendar,
    pub christmas_as_saturday: bool,
    pub dispatch: DispatchSettings,
    pub economics: EconomicParameters,
    pub costs: BTreeMap<Asset, CostParameters>,
}

impl Scenario {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read the scenario `{}`", path.display()))?;
        let mut scenario: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse the scenario `{}`", path.display()))?;
        if let Some(base) = path.parent() {
            scenario.inputs.rebase(base);
        }
        scenario.validate()?;
        info!(name = %scenario.name, n_years = scenario.years.len(), "loaded the scenario");
        Ok(scenario)
    }

    pub fn validate(&self) -> Result {
        ensure!(!self.years.is_empty(), "scenario `{}` has no target years", self.name);
        self.dispatch.splits.validate()?;
        self.dispatch.hydrogen.validate()?;
        for (technology, parameters) in &self.costs.generation {
            parameters.validate(&technology.to_string())?;
        }
        for (kind, parameters) in &self.costs.storage {
            parameters.validate(&kind.to_string())?;
        }
        for year in &self.years {
            year.validate().with_context(|| format!("invalid target year {}", year.year))?;
            for sector in year.demand.keys() {
                ensure!(
                    self.inputs.profiles.contains_key(sector),
                    "{sector} demand in {} has no load profile",
                    year.year,
                );
            }
            if year.heat_pumps.is_some() {
                ensure!(
                    self.inputs.temperature.is_some() && self.inputs.heat_pump_profile.is_some(),
                    "heat pumps in {} need a temperature series and a heat pump profile",
                    year.year,
                );
            }
            for (technology, capacity) in &year.capacities {
                ensure!(
                    !capacity.is_positive() || self.inputs.generation.contains_key(technology),
                    "{technology} capacity in {} has no reference series",
                    year.year,
                );
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        let costs = self
            .costs
            .generation
            .iter()
            .map(|(technology, parameters)| (Asset::Generation(*technology), *parameters))
            .chain(self.costs.storage.iter().map(|(kind, parameters)| (Asset::Storage(*kind), *parameters)))
            .collect();
        Settings {
            holidays: self.calendar.holidays.clone(),
            christmas_as_saturday: self.calendar.christmas_as_saturday,
            dispatch: self.dispatch,
            economics: self.economics,
            costs,
        }
    }

    #[must_use]
    pub fn weighting(&self, sector: Sector) -> DayWeighting {
        self.sectors.get(&sector).map(|settings| settings.weighting).unwrap_or_default()
    }

    /// Keep only the given year, if any.
    pub fn select_year(&mut self, year: Option<i32>) -> Result {
        if let Some(year) = year {
            self.years.retain(|scenario| scenario.year == year);
            ensure!(!self.years.is_empty(), "year {year} is not in the scenario");
        }
        Ok(())
    }
}

impl InputPaths {
    fn rebase(&mut self, base: &Path) {
        for path in self.profiles.values_mut() {
            *path = base.join(&*path);
        }
        for path in [&mut self.temperature, &mut self.heat_pump_profile].into_iter().flatten() {
            *path = base.join(&*path);
        }
        for reference in self.generation.values_mut() {
            reference.path = base.join(&reference.path);
        }
    }
}

impl YearScenario {
    fn validate(&self) -> Result {
        for (sector, target) in &self.demand {
            ensure!(*sector != Sector::HeatPump, "heat pump demand follows from the fleet, not a target");
            ensure!(target.is_finite() && *target >= 0.0, "{sector} demand must be non-negative");
        }
        if let Some(fleet) = &self.heat_pumps {
            fleet.validate()?;
        }
        if let Some(mobility) = &self.mobility {
            mobility.validate()?;
        }
        for (technology, capacity) in self.capacities.iter().chain(&self.base_capacities) {
            ensure!(capacity.0.is_finite() && capacity.0 >= 0.0, "{technology} capacity must be non-negative");
        }
        self.storage_specs()?;
        Ok(())
    }

    pub fn demand_target(&self, sector: Sector) -> MegawattHours {
        MegawattHours::from_terawatt_hours(self.demand.get(&sector).copied().unwrap_or_default())
    }

    pub fn base_capacity(&self, technology: Technology) -> Megawatts {
        self.base_capacities.get(&technology).copied().unwrap_or_else(|| technology.baseline_2025_capacity())
    }

    /// Storage specifications, absent technologies get zero capacity.
    pub fn storage_specs(&self) -> crate::Result<PerStorage<StorageSpec>> {
        PerStorage::try_from_fn(|kind| {
            let spec = self.storage.get(&kind).map_or_else(
                || StorageSpec::typical(kind, MegawattHours::ZERO, Megawatts::ZERO, Megawatts::ZERO),
                |input| input.resolve(kind),
            );
            spec.validate(kind)?;
            Ok(spec)
        })
    }

    /// Energy capacity before the build-out.
    ///
    /// Unless given explicitly, the 2025 baseline power is converted with the target's energy-to-power ratio.
    pub fn storage_base_capacity(&self, kind: StorageKind, spec: &StorageSpec) -> MegawattHours {
        if let Some(base) = self.storage.get(&kind).and_then(|input| input.base_capacity) {
            return base;
        }
        if spec.max_discharge_power.is_positive() {
            spec.capacity * (kind.baseline_2025_power() / spec.max_discharge_power)
        } else {
            MegawattHours::ZERO
        }
    }
}
