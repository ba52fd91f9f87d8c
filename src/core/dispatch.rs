pub mod event;
pub mod policy;
pub mod routing;
pub mod storage;
pub mod window;

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub use self::{
    event::{DispatchEvent, EventKind, EventThresholds},
    policy::{HydrogenDirective, HydrogenPolicy, SeasonalState},
    routing::{Split, Splits},
    storage::{PerStorage, StorageKind, StorageSpec, StorageState},
};
use crate::{
    core::{
        calendar::Season,
        dispatch::{event::BalanceWindow, routing::allocate},
        series::TimeSeries,
    },
    error::Result,
    prelude::{info, instrument},
    quantity::energy::MegawattHours,
};

/// Dispatch tunables.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub thresholds: EventThresholds,
    pub splits: Splits,
    pub hydrogen: HydrogenPolicy,

    /// Offer what a technology cannot take to the other ones from the same split.
    pub overflow: bool,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            thresholds: EventThresholds::default(),
            splits: Splits::default(),
            hydrogen: HydrogenPolicy::default(),
            overflow: true,
        }
    }
}

/// Everything the dispatcher carries from one interval to the next.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct DispatchState {
    pub storages: PerStorage<StorageState>,
    pub window: BalanceWindow,
    pub seasonal: SeasonalState,
}

impl DispatchState {
    pub fn new(specs: &PerStorage<StorageSpec>) -> Result<Self> {
        Ok(Self {
            storages: PerStorage::try_from_fn(|kind| StorageState::new(kind, specs[kind]))?,
            window: BalanceWindow::default(),
            seasonal: SeasonalState::default(),
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Flow {
    /// Grid-side energy taken from the grid.
    pub charged: MegawattHours,

    /// Grid-side energy fed into the grid.
    pub discharged: MegawattHours,
}

/// What happened during one interval.
#[derive(Copy, Clone, Debug)]
pub struct StepOutcome {
    pub event: DispatchEvent,
    pub flows: PerStorage<Flow>,
    pub soc: PerStorage<MegawattHours>,

    /// Balance after the storage flows.
    pub residual: MegawattHours,

    /// Number of state-of-charge clamps, non-zero only on an allocation bug.
    pub n_clamped: usize,
}

/// Per-interval series of one storage technology.
#[derive(Clone, Debug)]
pub struct StorageTrace {
    pub charged: TimeSeries,
    pub discharged: TimeSeries,

    /// State of charge at the end of each interval.
    pub soc: TimeSeries,
}

impl StorageTrace {
    pub fn total_charged(&self) -> MegawattHours {
        self.charged.total()
    }

    pub fn total_discharged(&self) -> MegawattHours {
        self.discharged.total()
    }
}

#[derive(Clone, Debug)]
pub struct DispatchResult {
    pub traces: PerStorage<StorageTrace>,
    pub residual: TimeSeries,
    pub final_state: DispatchState,
    pub event_counts: BTreeMap<EventKind, usize>,
    pub n_clamped: usize,
}

#[must_use]
pub struct Dispatcher {
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(settings: DispatchSettings) -> Result<Self> {
        settings.splits.validate()?;
        settings.hydrogen.validate()?;
        Ok(Self { settings })
    }

    /// Dispatch the storages for one interval.
    ///
    /// The state is taken and returned by value, so a single interval can be replayed in isolation.
    pub fn step(
        &self,
        mut state: DispatchState,
        timestamp: NaiveDateTime,
        balance: MegawattHours,
    ) -> (DispatchState, StepOutcome) {
        state.window.push(balance.0);
        let event = self.settings.thresholds.classify(&state.window);
        let directive = self.settings.hydrogen.directive(
            &mut state.seasonal,
            &state.storages.hydrogen,
            timestamp,
            balance,
        );

        let mut flows = PerStorage::<Flow>::default();
        let mut n_clamped = 0;

        // The hydrogen must-run goes first, regardless of the balance:
        let must_run = directive
            .must_run
            .min(state.storages.hydrogen.charge_limit(directive.charge_ceiling, MegawattHours::ZERO));
        if must_run.is_positive() {
            n_clamped += usize::from(state.storages.hydrogen.charge(must_run));
            flows.hydrogen.charged = must_run;
        }
        let mut effective = balance - must_run;

        // The winter baseload covers a deficit before anything is routed:
        if effective < MegawattHours::ZERO && directive.baseload.is_positive() {
            let baseload = directive
                .baseload
                .min(effective.abs())
                .min(state.storages.hydrogen.discharge_limit(directive.discharge_floor, MegawattHours::ZERO));
            if baseload.is_positive() {
                n_clamped += usize::from(state.storages.hydrogen.discharge(baseload));
                flows.hydrogen.discharged = baseload;
                effective += baseload;
            }
        }

        let split = self.settings.splits.select(
            event.kind,
            effective.is_positive(),
            Season::of(timestamp.date()),
        );
        if let Some(split) = split
            && effective != MegawattHours::ZERO
        {
            if effective.is_positive() {
                let limits = PerStorage::from_fn(|kind| {
                    let ceiling = match kind {
                        StorageKind::Hydrogen => directive.charge_ceiling,
                        _ => state.storages[kind].spec.soc_max(),
                    };
                    state.storages[kind].charge_limit(ceiling, flows[kind].charged)
                });
                let allocation = allocate(effective, split, &limits, self.settings.overflow);
                for (kind, energy) in allocation.iter() {
                    if energy.is_positive() {
                        n_clamped += usize::from(state.storages[kind].charge(*energy));
                        flows[kind].charged += *energy;
                    }
                }
            } else {
                let limits = PerStorage::from_fn(|kind| match kind {
                    // Never feed back what the must-run has just taken:
                    StorageKind::Hydrogen if must_run.is_positive() => MegawattHours::ZERO,
                    StorageKind::Hydrogen => {
                        let already = flows.hydrogen.discharged;
                        let limit = state.storages[kind].discharge_limit(directive.discharge_floor, already);
                        directive.discharge_cap.map_or(limit, |cap| limit.min(cap - already))
                    }
                    _ => state.storages[kind]
                        .discharge_limit(state.storages[kind].spec.soc_min(), MegawattHours::ZERO),
                });
                let allocation = allocate(effective.abs(), split, &limits, self.settings.overflow);
                for (kind, energy) in allocation.iter() {
                    if energy.is_positive() {
                        n_clamped += usize::from(state.storages[kind].discharge(*energy));
                        flows[kind].discharged += *energy;
                    }
                }
            }
        }

        let residual = flows
            .iter()
            .fold(balance, |residual, (_, flow)| residual - flow.charged + flow.discharged);
        let soc = PerStorage::from_fn(|kind| state.storages[kind].soc);
        (state, StepOutcome { event, flows, soc, residual, n_clamped })
    }

    /// Dispatch the storages over the entire balance series.
    #[instrument(skip_all, fields(year = balance.year()))]
    pub fn run(&self, balance: &TimeSeries, initial: DispatchState) -> Result<DispatchResult> {
        let mut state = initial;
        let mut charged = PerStorage::from_fn(|_| Vec::with_capacity(balance.len()));
        let mut discharged = PerStorage::from_fn(|_| Vec::with_capacity(balance.len()));
        let mut soc = PerStorage::from_fn(|_| Vec::with_capacity(balance.len()));
        let mut residual = Vec::with_capacity(balance.len());
        let mut event_counts = BTreeMap::<EventKind, usize>::new();
        let mut n_clamped = 0;

        for (timestamp, value) in balance.points() {
            let (next_state, outcome) = self.step(state, timestamp, MegawattHours::from(value));
            state = next_state;
            for kind in StorageKind::all() {
                charged[kind].push(outcome.flows[kind].charged.0);
                discharged[kind].push(outcome.flows[kind].discharged.0);
                soc[kind].push(outcome.soc[kind].0);
            }
            residual.push(outcome.residual.0);
            *event_counts.entry(outcome.event.kind).or_default() += 1;
            n_clamped += outcome.n_clamped;
        }

        let year = balance.year();
        let traces = PerStorage::try_from_fn(|kind| {
            Ok::<_, crate::error::Error>(StorageTrace {
                charged: TimeSeries::try_new("charged", year, std::mem::take(&mut charged[kind]))?,
                discharged: TimeSeries::try_new("discharged", year, std::mem::take(&mut discharged[kind]))?,
                soc: TimeSeries::try_new("state of charge", year, std::mem::take(&mut soc[kind]))?,
            })
        })?;
        let residual = TimeSeries::try_new("residual after dispatch", year, residual)?;
        for (kind, trace) in traces.iter() {
            info!(
                storage = %kind,
                charged = %trace.total_charged(),
                discharged = %trace.total_discharged(),
                final_soc = %state.storages[kind].soc,
                "dispatched",
            );
        }
        info!(residual = %residual.total(), n_clamped, "dispatch complete");
        Ok(DispatchResult { traces, residual, final_state: state, event_counts, n_clamped })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{NaiveDate, NaiveTime};

    use super::*;
    use crate::{
        core::calendar::year_grid,
        quantity::power::Megawatts,
    };

    fn at(year: i32, month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day).unwrap().and_time(NaiveTime::MIN)
    }

    fn specs() -> PerStorage<StorageSpec> {
        PerStorage {
            battery: StorageSpec {
                soc_min_fraction: 0.2,
                soc_max_fraction: 0.8,
                initial_soc_fraction: Some(0.5),
                ..StorageSpec::typical(
                    StorageKind::Battery,
                    MegawattHours::from(2000.0),
                    Megawatts::from(4000.0),
                    Megawatts::from(4000.0),
                )
            },
            pumped_hydro: StorageSpec {
                initial_soc_fraction: Some(0.5),
                ..StorageSpec::typical(
                    StorageKind::PumpedHydro,
                    MegawattHours::from(40_000.0),
                    Megawatts::from(9_000.0),
                    Megawatts::from(9_000.0),
                )
            },
            hydrogen: StorageSpec::typical(
                StorageKind::Hydrogen,
                MegawattHours::from(1_000_000.0),
                Megawatts::from(20_000.0),
                Megawatts::from(20_000.0),
            ),
        }
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(DispatchSettings::default()).unwrap()
    }

    /// Sum of the flows and the residual must give back the balance.
    fn assert_energy_conserved(balance: MegawattHours, outcome: &StepOutcome) {
        let net: f64 = outcome.flows.iter().map(|(_, flow)| flow.charged.0 - flow.discharged.0).sum();
        assert_abs_diff_eq!(outcome.residual.0 + net, balance.0, epsilon = 1e-6);
    }

    /// Single 600 MWh surplus in a winter night: a short peak for the battery and the pump.
    #[test]
    fn test_short_peak() {
        let state = DispatchState::new(&specs()).unwrap();
        let balance = MegawattHours::from(600.0);
        let (state, outcome) = dispatcher().step(state, at(2030, 1, 15), balance);
        assert_eq!(outcome.event.kind, EventKind::ShortPeak);
        assert_abs_diff_eq!(outcome.flows.battery.charged.0, 540.0);
        assert_abs_diff_eq!(outcome.flows.pumped_hydro.charged.0, 60.0);
        assert_abs_diff_eq!(outcome.flows.hydrogen.charged.0, 0.0);
        assert!(state.storages.battery.soc.0 <= 1600.0);
        assert_abs_diff_eq!(state.storages.battery.soc.0, 1000.0 + 540.0 * 0.95);
        assert_abs_diff_eq!(outcome.residual.0, 0.0, epsilon = 1e-9);
        assert_eq!(outcome.n_clamped, 0);
        assert_energy_conserved(balance, &outcome);
    }

    /// A nearly full battery passes the rest to the pump instead of overshooting 80 %.
    #[test]
    fn test_short_peak_near_full() {
        let mut specs = specs();
        specs.battery.initial_soc_fraction = Some(0.75);
        let state = DispatchState::new(&specs).unwrap();
        let balance = MegawattHours::from(600.0);
        let (state, outcome) = dispatcher().step(state, at(2030, 1, 15), balance);
        assert_abs_diff_eq!(state.storages.battery.soc.0, 1600.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.flows.battery.charged.0, 100.0 / 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.flows.pumped_hydro.charged.0, 600.0 - 100.0 / 0.95, epsilon = 1e-9);
        assert_eq!(outcome.n_clamped, 0);
        assert_energy_conserved(balance, &outcome);
    }

    /// Without overflow, what the battery cannot take stays in the residual.
    #[test]
    fn test_short_peak_without_overflow() {
        let mut specs = specs();
        specs.battery.initial_soc_fraction = Some(0.75);
        let dispatcher = Dispatcher::new(DispatchSettings { overflow: false, ..DispatchSettings::default() }).unwrap();
        let balance = MegawattHours::from(600.0);
        let (_, outcome) = dispatcher.step(DispatchState::new(&specs).unwrap(), at(2030, 1, 15), balance);
        assert_abs_diff_eq!(outcome.flows.pumped_hydro.charged.0, 60.0);
        assert_abs_diff_eq!(outcome.residual.0, 540.0 - 100.0 / 0.95, epsilon = 1e-9);
        assert_energy_conserved(balance, &outcome);
    }

    #[test]
    fn test_ignore() {
        let state = DispatchState::new(&specs()).unwrap();
        let (_, outcome) = dispatcher().step(state, at(2030, 1, 15), MegawattHours::from(-20.0));
        assert_eq!(outcome.event.kind, EventKind::Ignore);
        assert_abs_diff_eq!(outcome.residual.0, -20.0);
    }

    /// Summer must-run draws from the grid even during a deficit.
    #[test]
    fn test_must_run_in_deficit() {
        let state = DispatchState::new(&specs()).unwrap();
        let balance = MegawattHours::from(-20.0);
        let (state, outcome) = dispatcher().step(state, at(2030, 6, 1), balance);
        assert!(outcome.flows.hydrogen.charged.is_positive());
        assert!(state.storages.hydrogen.soc.is_positive());
        assert!(outcome.residual < balance);
        assert_energy_conserved(balance, &outcome);
    }

    /// With a sufficient surplus, hydrogen reaches exactly the summer target by November 1st.
    #[test]
    fn test_hydrogen_summer_target() {
        let dispatcher = dispatcher();
        let mut state = DispatchState::new(&specs()).unwrap();
        let balance = MegawattHours::from(3000.0);
        let summer = year_grid(2030).filter(|timestamp| Season::of(timestamp.date()) == Season::Summer);
        for timestamp in summer {
            let (next_state, outcome) = dispatcher.step(state, timestamp, balance);
            assert_eq!(outcome.n_clamped, 0);
            state = next_state;
        }
        assert_abs_diff_eq!(state.storages.hydrogen.fraction(), 0.8, epsilon = 1e-6);
        assert!(state.seasonal.summer_target_reached);
    }

    fn winter_specs() -> PerStorage<StorageSpec> {
        let mut specs = specs();
        specs.hydrogen.initial_soc_fraction = Some(0.8);
        specs
    }

    /// Choppy winter deficits still draw the hydrogen baseload on every deficit interval.
    #[test]
    fn test_winter_baseload_on_short_peaks() {
        let dispatcher = dispatcher();
        let mut state = DispatchState::new(&winter_specs()).unwrap();
        let baseload = 800_000.0 * 0.58 * 0.6 / 90.0 / 96.0;
        let mut n_deficits = 0;
        let mut discharged = 0.0;
        let winter = year_grid(2030).filter(|timestamp| *timestamp >= at(2030, 11, 1)).take(960);
        for (index, timestamp) in winter.enumerate() {
            let balance = MegawattHours::from(if index % 4 == 3 { 300.0 } else { -1500.0 });
            let (next_state, outcome) = dispatcher.step(state, timestamp, balance);
            state = next_state;
            assert_eq!(outcome.n_clamped, 0);
            assert_energy_conserved(balance, &outcome);
            if balance.is_positive() {
                assert_abs_diff_eq!(outcome.flows.hydrogen.discharged.0, 0.0);
            } else {
                n_deficits += 1;
                assert_abs_diff_eq!(outcome.flows.hydrogen.discharged.0, baseload, epsilon = 1e-6);
            }
            discharged += outcome.flows.hydrogen.discharged.0;
        }
        assert_eq!(n_deficits, 720);
        assert_abs_diff_eq!(discharged, 720.0 * baseload, epsilon = 1e-3);
        assert_abs_diff_eq!(
            state.storages.hydrogen.soc.0,
            800_000.0 - 720.0 * baseload / 0.58,
            epsilon = 1e-3,
        );
    }

    /// A small deficit is covered by the baseload alone.
    #[test]
    fn test_winter_baseload_covers_small_deficit() {
        let state = DispatchState::new(&winter_specs()).unwrap();
        let balance = MegawattHours::from(-10.0);
        let (_, outcome) = dispatcher().step(state, at(2030, 11, 1), balance);
        assert_abs_diff_eq!(outcome.flows.hydrogen.discharged.0, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(outcome.flows.battery.discharged.0, 0.0);
        assert_abs_diff_eq!(outcome.residual.0, 0.0, epsilon = 1e-9);
    }

    /// A severe deficit boosts the hydrogen delivery, the rest is routed to the battery and the pump.
    #[test]
    fn test_winter_boost() {
        let dispatcher = dispatcher();
        let calm_balance = MegawattHours::from(-1000.0);
        let severe_balance = MegawattHours::from(-3000.0);
        let (_, calm) = dispatcher.step(DispatchState::new(&winter_specs()).unwrap(), at(2030, 12, 1), calm_balance);
        let (_, severe) =
            dispatcher.step(DispatchState::new(&winter_specs()).unwrap(), at(2030, 12, 1), severe_balance);
        assert!(calm.flows.hydrogen.discharged.is_positive());
        assert_abs_diff_eq!(
            severe.flows.hydrogen.discharged.0,
            calm.flows.hydrogen.discharged.0 * 1.3,
            epsilon = 1e-9,
        );
        assert!(severe.flows.battery.discharged.is_positive());
        assert_energy_conserved(calm_balance, &calm);
        assert_energy_conserved(severe_balance, &severe);
    }

    /// Stepping with random-ish balances never leaves the bounds nor exceeds the power limits.
    #[test]
    fn test_bounds_over_a_year() {
        let dispatcher = dispatcher();
        let specs = specs();
        let mut state = DispatchState::new(&specs).unwrap();
        for (index, timestamp) in year_grid(2030).enumerate() {
            #[expect(clippy::cast_precision_loss)]
            let phase = index as f64;
            let balance = MegawattHours::from(
                3000.0 * (phase / 96.0 * std::f64::consts::TAU).sin() + 2000.0 * (phase / 2900.0).sin(),
            );
            let (next_state, outcome) = dispatcher.step(state, timestamp, balance);
            state = next_state;
            assert_eq!(outcome.n_clamped, 0);
            assert_energy_conserved(balance, &outcome);
            for (kind, storage) in state.storages.iter() {
                let slack = 1e-6;
                assert!(storage.soc >= storage.spec.soc_min() - MegawattHours::from(slack));
                assert!(storage.soc <= storage.spec.soc_max() + MegawattHours::from(slack));
                let flow = outcome.flows[kind];
                assert!(flow.charged.0 <= specs[kind].max_charge_power.0 * 0.25 + slack);
                assert!(flow.discharged.0 <= specs[kind].max_discharge_power.0 * 0.25 + slack);
            }
        }
    }

    #[test]
    fn test_run_is_deterministic() {
        let values: Vec<f64> = (0..35_040)
            .map(|index| if (index / 300) % 3 == 0 { -1500.0 } else { 900.0 })
            .collect();
        let balance = TimeSeries::try_new("balance", 2030, values).unwrap();
        let dispatcher = dispatcher();
        let first = dispatcher.run(&balance, DispatchState::new(&specs()).unwrap()).unwrap();
        let second = dispatcher.run(&balance, DispatchState::new(&specs()).unwrap()).unwrap();
        assert_eq!(first.residual.values(), second.residual.values());
        assert_eq!(first.event_counts, second.event_counts);
        assert_eq!(first.n_clamped, 0);
        assert_eq!(first.event_counts.values().sum::<usize>(), 35_040);
        assert_eq!(first.traces.hydrogen.soc.len(), 35_040);

        let charged: f64 = first.traces.iter().map(|(_, trace)| trace.total_charged().0).sum();
        let discharged: f64 = first.traces.iter().map(|(_, trace)| trace.total_discharged().0).sum();
        assert_abs_diff_eq!(
            first.residual.sum(),
            balance.sum() - charged + discharged,
            epsilon = 1e-3,
        );
    }

    #[test]
    fn test_invalid_settings() {
        let settings = DispatchSettings {
            splits: Splits { long_surplus: Split::new(0.5, 0.5, 0.5), ..Splits::default() },
            ..DispatchSettings::default()
        };
        assert!(Dispatcher::new(settings).is_err());
    }
}
