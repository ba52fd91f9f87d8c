//! Battery-electric passenger cars as a grid-side flexibility, vehicle-to-grid included.
//!
//! The fleet is modelled as one aggregated battery. A synthetic driving profile drains it,
//! and the plugged-in share charges on surplus and feeds back on deficit, as long as every car
//! can still reach its departure target.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        calendar::{Calendar, DayType},
        series::TimeSeries,
    },
    error::{Error, Result},
    prelude::{info, instrument},
    quantity::{energy::MegawattHours, power::Megawatts, time::Hours},
};

/// Share of the departure target kept on top of the minimal charging path before feeding back.
const V2G_SAFETY_MARGIN: f64 = 0.7;

/// Share of the plug-in ceiling still plugged in at the activity peak.
const PEAK_PLUG_FLOOR: f64 = 0.1;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetParameters {
    /// Share of the passenger cars that are battery-electric.
    pub ev_share: f64,

    pub n_cars: u32,

    #[serde(rename = "annual_drive_kwh_per_car")]
    pub annual_drive_per_car: f64,

    #[serde(rename = "battery_kwh_per_car")]
    pub battery_per_car: f64,

    /// Largest share of the fleet plugged in at any time.
    pub plug_share_max: f64,

    /// Share of the plugged-in cars taking part in vehicle-to-grid.
    pub v2g_share: f64,

    /// Reduction of [`FleetParameters::v2g_share`] while the cars stand at the workplace.
    pub workplace_v2g_factor: f64,

    pub soc_min_day: f64,
    pub soc_min_night: f64,

    /// State of charge every car should have at departure.
    pub soc_target_departure: f64,

    /// Hour of the day, fractional.
    pub departure_hour: f64,

    pub arrival_hour: f64,

    #[serde(rename = "surplus_threshold_mw")]
    pub surplus_threshold: Megawatts,

    #[serde(rename = "deficit_threshold_mw")]
    pub deficit_threshold: Megawatts,

    pub initial_soc: f64,
    pub charge_efficiency: f64,
    pub discharge_efficiency: f64,

    #[serde(rename = "charge_power_kw_per_car")]
    pub charge_power_per_car: f64,

    #[serde(rename = "discharge_power_kw_per_car")]
    pub discharge_power_per_car: f64,
}

impl Default for FleetParameters {
    fn default() -> Self {
        Self {
            ev_share: 0.9,
            n_cars: 5_000_000,
            annual_drive_per_car: 2250.0,
            battery_per_car: 50.0,
            plug_share_max: 0.6,
            v2g_share: 0.3,
            workplace_v2g_factor: 0.15,
            soc_min_day: 0.4,
            soc_min_night: 0.2,
            soc_target_departure: 0.6,
            departure_hour: 7.5,
            arrival_hour: 18.0,
            surplus_threshold: Megawatts::from(200.0),
            deficit_threshold: Megawatts::from(200.0),
            initial_soc: 0.6,
            charge_efficiency: 0.95,
            discharge_efficiency: 0.95,
            charge_power_per_car: 11.0,
            discharge_power_per_car: 11.0,
        }
    }
}

impl FleetParameters {
    pub fn validate(&self) -> Result {
        let invalid = |message: &str| Err(Error::InvalidParameter(format!("e-mobility fleet: {message}")));
        let fractions = [
            ("EV share", self.ev_share),
            ("maximum plug share", self.plug_share_max),
            ("V2G share", self.v2g_share),
            ("workplace V2G factor", self.workplace_v2g_factor),
            ("daytime minimum SoC", self.soc_min_day),
            ("night-time minimum SoC", self.soc_min_night),
            ("departure SoC", self.soc_target_departure),
            ("initial SoC", self.initial_soc),
        ];
        if let Some((name, _)) = fractions.iter().find(|(_, value)| !(0.0..=1.0).contains(value)) {
            return invalid(&format!("{name} must be within [0, 1]"));
        }
        for (name, efficiency) in [("charge", self.charge_efficiency), ("discharge", self.discharge_efficiency)] {
            if efficiency.is_nan() || efficiency <= 0.0 || efficiency > 1.0 {
                return invalid(&format!("{name} efficiency must be within (0, 1]"));
            }
        }
        if self.battery_per_car.is_nan() || self.battery_per_car <= 0.0 {
            return invalid("battery capacity must be positive");
        }
        let non_negative = [
            self.annual_drive_per_car,
            self.charge_power_per_car,
            self.discharge_power_per_car,
            self.surplus_threshold.0,
            self.deficit_threshold.0,
        ];
        if non_negative.iter().any(|value| value.is_nan() || *value < 0.0) {
            return invalid("energies, powers and thresholds must be non-negative");
        }
        if ![self.departure_hour, self.arrival_hour].iter().all(|hour| (0.0..24.0).contains(hour)) {
            return invalid("departure and arrival must be within the day");
        }
        if (self.departure_hour - self.arrival_hour).abs() < f64::EPSILON {
            return invalid("departure and arrival must differ");
        }
        Ok(())
    }

    #[must_use]
    pub fn n_vehicles(&self) -> f64 {
        self.ev_share * f64::from(self.n_cars)
    }

    pub fn capacity(&self) -> MegawattHours {
        MegawattHours::from(self.n_vehicles() * self.battery_per_car / 1000.0)
    }

    pub fn annual_drive(&self) -> MegawattHours {
        MegawattHours::from(self.n_vehicles() * self.annual_drive_per_car / 1000.0)
    }

    /// Whether the cars are on the road, or at work, at this hour of the day.
    fn is_away(&self, hour: f64) -> bool {
        if self.departure_hour < self.arrival_hour {
            (self.departure_hour..self.arrival_hour).contains(&hour)
        } else {
            hour >= self.departure_hour || hour < self.arrival_hour
        }
    }

    fn hours_to_departure(&self, hour: f64) -> Hours {
        Hours::from((self.departure_hour - hour).rem_euclid(24.0))
    }
}

/// What a typical car of the fleet does during one interval.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FleetInterval {
    /// Energy driven by the whole fleet.
    pub drive: MegawattHours,

    /// Share of the fleet plugged in.
    pub plug_share: f64,

    pub soc_min: f64,

    /// Departure target, only while parked at home.
    pub soc_target: Option<f64>,

    /// Zero while away.
    pub hours_to_departure: Hours,

    /// Parked at the workplace on a working day, with reduced vehicle-to-grid.
    pub at_workplace: bool,
}

/// Asymmetric Gaussian bump, with the left width applying before the peak.
fn skewed_gaussian(x: f64, mu: f64, sigma_left: f64, sigma_right: f64) -> f64 {
    let sigma = if x < mu { sigma_left } else { sigma_right };
    (-0.5 * ((x - mu) / sigma).powi(2)).exp()
}

/// Relative driving activity at the hour of the day.
fn activity(hour: f64, is_leisure: bool) -> f64 {
    if is_leisure {
        0.8 * skewed_gaussian(hour, 13.0, 5.0, 5.0) + 0.1
    } else {
        0.9 * skewed_gaussian(hour, 7.75, 1.5, 2.5) + 1.1 * skewed_gaussian(hour, 17.25, 2.5, 2.0) + 0.1
    }
}

fn hour_of_day(timestamp: NaiveDateTime) -> f64 {
    f64::from(timestamp.hour()) + f64::from(timestamp.minute()) / 60.0
}

/// Weekends, public holidays, and Christmas and New Year's Eve.
fn is_leisure_day(calendar: &Calendar, timestamp: NaiveDateTime) -> bool {
    let date = timestamp.date();
    calendar.day_type(date) != DayType::Workday || (date.month() == 12 && matches!(date.day(), 24 | 31))
}

/// Build the per-interval driving profile of the year.
#[instrument(skip_all, fields(year = calendar.year()))]
pub fn profile(parameters: &FleetParameters, calendar: &Calendar) -> Result<Vec<FleetInterval>> {
    parameters.validate()?;
    let points: Vec<(f64, bool)> = calendar
        .timestamps()
        .map(|timestamp| (hour_of_day(timestamp), is_leisure_day(calendar, timestamp)))
        .collect();
    let activities: Vec<f64> = points.iter().map(|(hour, is_leisure)| activity(*hour, *is_leisure)).collect();

    let total_activity: f64 = activities.iter().sum();
    if total_activity <= 0.0 {
        return Err(Error::InvalidParameter("driving activity must be positive".to_string()));
    }
    let (lowest, highest) = activities
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lowest, highest), value| (lowest.min(*value), highest.max(*value)));
    let annual_drive = parameters.annual_drive();

    Ok(points
        .iter()
        .zip(&activities)
        .map(|((hour, is_leisure), activity)| {
            let normalized = if highest > lowest { (activity - lowest) / (highest - lowest) } else { 0.0 };
            let is_away = parameters.is_away(*hour);
            FleetInterval {
                drive: annual_drive * (activity / total_activity),
                plug_share: parameters.plug_share_max * (1.0 - (1.0 - PEAK_PLUG_FLOOR) * normalized),
                soc_min: if is_away { parameters.soc_min_day } else { parameters.soc_min_night },
                soc_target: (!is_away).then_some(parameters.soc_target_departure),
                hours_to_departure: if is_away { Hours::ZERO } else { parameters.hours_to_departure(*hour) },
                at_workplace: is_away && !is_leisure,
            }
        })
        .collect())
}

/// Grid-side flows of one interval.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FleetStep {
    pub charged: MegawattHours,
    pub discharged: MegawattHours,

    /// Driving energy the batteries could not supply.
    pub unmet_drive: MegawattHours,

    /// Energy stored in the fleet at the end of the interval.
    pub energy: MegawattHours,

    /// Balance after the fleet.
    pub residual: MegawattHours,
}

#[must_use]
pub struct Fleet {
    parameters: FleetParameters,
    capacity: MegawattHours,
    n_vehicles: f64,
}

impl Fleet {
    pub fn new(parameters: FleetParameters) -> Result<Self> {
        parameters.validate()?;
        Ok(Self { parameters, capacity: parameters.capacity(), n_vehicles: parameters.n_vehicles() })
    }

    pub const fn capacity(&self) -> MegawattHours {
        self.capacity
    }

    pub fn initial_energy(&self) -> MegawattHours {
        self.capacity * self.parameters.initial_soc
    }

    /// Charge and discharge the fleet for one interval.
    ///
    /// Reaching the departure target comes first, the grid signal second.
    pub fn step(&self, energy: MegawattHours, interval: &FleetInterval, balance: MegawattHours) -> FleetStep {
        let parameters = &self.parameters;
        let dt = Hours::QUARTER;
        let plugged = interval.plug_share * self.n_vehicles / 1000.0;
        let charge_limit = Megawatts::from(plugged * parameters.charge_power_per_car);
        let v2g_share = if interval.at_workplace {
            parameters.v2g_share * parameters.workplace_v2g_factor
        } else {
            parameters.v2g_share
        };
        let discharge_limit = Megawatts::from(plugged * parameters.discharge_power_per_car * v2g_share);

        let power = balance / dt;
        let available = (energy - self.capacity * interval.soc_min).max(MegawattHours::ZERO)
            * parameters.discharge_efficiency
            / dt;
        let remaining = interval.hours_to_departure.max(dt);
        let departure = interval.soc_target.filter(|_| interval.hours_to_departure.is_positive());

        let needed = departure.map_or(Megawatts::ZERO, |target| {
            let shortfall = (self.capacity * target - energy).max(MegawattHours::ZERO);
            shortfall / remaining / parameters.charge_efficiency
        });
        let (charge, discharge) = if needed.is_positive() {
            (needed.min(charge_limit), Megawatts::ZERO)
        } else if -power > parameters.deficit_threshold {
            let mut discharge = (-power).min(discharge_limit).min(available);
            if let Some(target) = departure {
                // Keep enough to reach the target by charging at full power until departure:
                let target = self.capacity * target;
                let floor = target - charge_limit * remaining * parameters.charge_efficiency + target * V2G_SAFETY_MARGIN;
                let budget = (energy - floor).max(MegawattHours::ZERO) * parameters.discharge_efficiency / dt;
                discharge = discharge.min(budget);
            }
            (Megawatts::ZERO, discharge)
        } else if power > parameters.surplus_threshold {
            (power.min(charge_limit), Megawatts::ZERO)
        } else {
            (Megawatts::ZERO, Megawatts::ZERO)
        };

        let headroom = (self.capacity - energy).max(MegawattHours::ZERO) / parameters.charge_efficiency;
        let charged = (charge * dt).min(headroom);
        let discharged = discharge * dt;
        let mut next = energy + charged * parameters.charge_efficiency
            - discharged / parameters.discharge_efficiency
            - interval.drive;
        let unmet_drive = (-next).max(MegawattHours::ZERO);
        next = next.clamp(MegawattHours::ZERO, self.capacity);

        FleetStep { charged, discharged, unmet_drive, energy: next, residual: balance - charged + discharged }
    }

    /// Run the fleet over the entire balance series.
    #[instrument(skip_all, fields(year = balance.year()))]
    pub fn run(&self, calendar: &Calendar, balance: &TimeSeries) -> Result<FleetResult> {
        let intervals = profile(&self.parameters, calendar)?;
        if intervals.len() != balance.len() {
            return Err(Error::GridMisaligned {
                label: "balance".to_string(),
                year: balance.year(),
                expected: intervals.len(),
                actual: balance.len(),
            });
        }

        let mut energy = self.initial_energy();
        let mut charged = Vec::with_capacity(balance.len());
        let mut discharged = Vec::with_capacity(balance.len());
        let mut driven = Vec::with_capacity(balance.len());
        let mut stored = Vec::with_capacity(balance.len());
        let mut residual = Vec::with_capacity(balance.len());
        let mut unmet_drive = MegawattHours::ZERO;

        for (interval, value) in intervals.iter().zip(balance.iter()) {
            let step = self.step(energy, interval, MegawattHours::from(value));
            energy = step.energy;
            charged.push(step.charged.0);
            discharged.push(step.discharged.0);
            driven.push(interval.drive.0);
            stored.push(step.energy.0);
            residual.push(step.residual.0);
            unmet_drive += step.unmet_drive;
        }

        let year = balance.year();
        let result = FleetResult {
            capacity: self.capacity,
            charged: TimeSeries::try_new("fleet charged", year, charged)?,
            discharged: TimeSeries::try_new("fleet discharged", year, discharged)?,
            driven: TimeSeries::try_new("fleet driven", year, driven)?,
            energy: TimeSeries::try_new("fleet energy", year, stored)?,
            residual: TimeSeries::try_new("residual after fleet", year, residual)?,
            unmet_drive,
        };
        result.check()?;
        info!(
            capacity = %result.capacity,
            charged = %result.charged.total(),
            discharged = %result.discharged.total(),
            driven = %result.driven.total(),
            unmet_drive = %result.unmet_drive,
            "fleet dispatched",
        );
        Ok(result)
    }
}

#[derive(Clone, Debug)]
pub struct FleetResult {
    pub capacity: MegawattHours,
    pub charged: TimeSeries,
    pub discharged: TimeSeries,
    pub driven: TimeSeries,

    /// Energy stored at the end of each interval.
    pub energy: TimeSeries,

    pub residual: TimeSeries,
    pub unmet_drive: MegawattHours,
}

impl FleetResult {
    /// Physical plausibility of the traces.
    pub fn check(&self) -> Result {
        let slack = 1e-6;
        let series = [&self.charged, &self.discharged, &self.driven, &self.energy, &self.residual];
        if series.iter().any(|series| series.iter().any(f64::is_nan)) {
            return Err(Error::InvalidParameter("e-mobility fleet produced NaN".to_string()));
        }
        if self.energy.iter().any(|energy| energy < -slack || energy > self.capacity.0 + slack) {
            return Err(Error::InvalidParameter("e-mobility fleet left its capacity".to_string()));
        }
        if [&self.charged, &self.discharged].iter().any(|series| series.iter().any(|energy| energy < -slack)) {
            return Err(Error::InvalidParameter("e-mobility fleet flows must be non-negative".to_string()));
        }
        Ok(())
    }

    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn mean_soc(&self) -> f64 {
        if self.capacity.is_positive() && !self.energy.values().is_empty() {
            self.energy.sum() / self.energy.len() as f64 / self.capacity.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use super::*;
    use crate::core::calendar::HolidayCalendar;

    /// A thousand cars, 50 MWh in total, 11 MW of charging when all are plugged in.
    fn small_fleet() -> Fleet {
        Fleet::new(FleetParameters {
            ev_share: 1.0,
            n_cars: 1000,
            surplus_threshold: Megawatts::from(1.0),
            deficit_threshold: Megawatts::from(1.0),
            ..FleetParameters::default()
        })
        .unwrap()
    }

    /// Parked at home in the evening, half of the fleet plugged in.
    fn evening() -> FleetInterval {
        FleetInterval {
            drive: MegawattHours::ZERO,
            plug_share: 0.5,
            soc_min: 0.2,
            soc_target: Some(0.6),
            hours_to_departure: Hours::from(10.0),
            at_workplace: false,
        }
    }

    fn workplace() -> FleetInterval {
        FleetInterval {
            soc_min: 0.4,
            soc_target: None,
            hours_to_departure: Hours::ZERO,
            at_workplace: true,
            ..evening()
        }
    }

    #[test]
    fn test_surplus_charges() {
        let fleet = small_fleet();
        let step = fleet.step(MegawattHours::from(40.0), &evening(), MegawattHours::from(10.0));
        assert_abs_diff_eq!(step.charged.0, 1.375);
        assert_abs_diff_eq!(step.energy.0, 40.0 + 1.375 * 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(step.residual.0, 8.625, epsilon = 1e-9);
    }

    #[test]
    fn test_charging_is_limited_by_headroom() {
        let step = small_fleet().step(MegawattHours::from(49.9), &evening(), MegawattHours::from(10.0));
        assert_abs_diff_eq!(step.charged.0, 0.1 / 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(step.energy.0, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_deficit_discharges() {
        let step = small_fleet().step(MegawattHours::from(40.0), &evening(), MegawattHours::from(-10.0));
        // 5.5 MW plugged in, 30 % of it feeding back:
        assert_abs_diff_eq!(step.discharged.0, 0.4125, epsilon = 1e-9);
        assert_abs_diff_eq!(step.energy.0, 40.0 - 0.4125 / 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(step.residual.0, -9.5875, epsilon = 1e-9);
    }

    #[test]
    fn test_workplace_feeds_back_less() {
        let step = small_fleet().step(MegawattHours::from(40.0), &workplace(), MegawattHours::from(-10.0));
        assert_abs_diff_eq!(step.discharged.0, 0.4125 * 0.15, epsilon = 1e-9);
    }

    #[test]
    fn test_departure_target_comes_first() {
        // 10 MWh short of the target, 10 hours to go, while the grid is short:
        let step = small_fleet().step(MegawattHours::from(20.0), &evening(), MegawattHours::from(-10.0));
        assert_abs_diff_eq!(step.discharged.0, 0.0);
        assert_relative_eq!(step.charged.0, 10.0 / 10.0 / 0.95 * 0.25, max_relative = 1e-9);
        assert_relative_eq!(step.residual.0, -10.0 - step.charged.0, max_relative = 1e-9);
    }

    #[test]
    fn test_no_feed_back_right_before_departure() {
        let interval = FleetInterval { hours_to_departure: Hours::QUARTER, ..evening() };
        let step = small_fleet().step(MegawattHours::from(31.0), &interval, MegawattHours::from(-10.0));
        assert_eq!(step.discharged, MegawattHours::ZERO);
        assert_eq!(step.charged, MegawattHours::ZERO);
        assert_abs_diff_eq!(step.residual.0, -10.0);
    }

    #[test]
    fn test_below_threshold_is_idle() {
        let step = small_fleet().step(MegawattHours::from(40.0), &evening(), MegawattHours::from(0.2));
        assert_eq!(step.charged, MegawattHours::ZERO);
        assert_eq!(step.discharged, MegawattHours::ZERO);
        assert_abs_diff_eq!(step.residual.0, 0.2);
    }

    #[test]
    fn test_unmet_drive() {
        let interval = FleetInterval { drive: MegawattHours::from(0.5), ..workplace() };
        let step = small_fleet().step(MegawattHours::from(0.1), &interval, MegawattHours::ZERO);
        assert_eq!(step.energy, MegawattHours::ZERO);
        assert_abs_diff_eq!(step.unmet_drive.0, 0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_profile() {
        let parameters = FleetParameters::default();
        let calendar = Calendar::new(2030, &HolidayCalendar::GermanNational).unwrap();
        let intervals = profile(&parameters, &calendar).unwrap();
        assert_eq!(intervals.len(), 35_040);

        let total: f64 = intervals.iter().map(|interval| interval.drive.0).sum();
        assert_relative_eq!(total, 4_500_000.0 * 2250.0 / 1000.0, max_relative = 1e-9);
        assert!(intervals.iter().all(|interval| (0.06 - 1e-9..=0.6 + 1e-9).contains(&interval.plug_share)));

        // Monday, January 7th: at home at 06:00, at work at noon.
        let early = &intervals[6 * 96 + 24];
        assert_eq!(early.soc_target, Some(0.6));
        assert_abs_diff_eq!(early.soc_min, 0.2);
        assert_abs_diff_eq!(early.hours_to_departure.0, 1.5);
        assert!(!early.at_workplace);
        let noon = &intervals[6 * 96 + 48];
        assert_eq!(noon.soc_target, None);
        assert_abs_diff_eq!(noon.soc_min, 0.4);
        assert!(noon.at_workplace);

        // Sunday, January 6th, is a leisure day, and the evening counts to the next departure:
        assert!(!intervals[5 * 96 + 48].at_workplace);
        assert_abs_diff_eq!(intervals[5 * 96 + 72].hours_to_departure.0, 13.5);
    }

    #[test]
    fn test_run_over_a_year() {
        let year = 2030;
        let calendar = Calendar::new(year, &HolidayCalendar::GermanNational).unwrap();
        let values = (0..35_040).map(|index| if (index / 96) % 2 == 0 { 3000.0 } else { -3000.0 }).collect();
        let balance = TimeSeries::try_new("balance", year, values).unwrap();
        let fleet = Fleet::new(FleetParameters::default()).unwrap();
        let result = fleet.run(&calendar, &balance).unwrap();

        assert!(result.check().is_ok());
        assert!(result.charged.total().is_positive());
        assert!(result.discharged.total().is_positive());
        assert_relative_eq!(result.driven.sum(), fleet.parameters.annual_drive().0, max_relative = 1e-9);
        assert_relative_eq!(
            result.residual.sum(),
            balance.sum() - result.charged.sum() + result.discharged.sum(),
            max_relative = 1e-9,
        );
        assert!((0.0..=1.0).contains(&result.mean_soc()));
    }

    #[test]
    fn test_misaligned_balance() {
        let calendar = Calendar::new(2030, &HolidayCalendar::GermanNational).unwrap();
        let balance = TimeSeries::zeros(2032);
        let fleet = Fleet::new(FleetParameters::default()).unwrap();
        assert!(matches!(fleet.run(&calendar, &balance), Err(Error::GridMisaligned { .. })));
    }

    #[test]
    fn test_invalid_parameters() {
        let invalid = [
            FleetParameters { v2g_share: 1.5, ..FleetParameters::default() },
            FleetParameters { charge_efficiency: 0.0, ..FleetParameters::default() },
            FleetParameters { battery_per_car: f64::NAN, ..FleetParameters::default() },
            FleetParameters { departure_hour: 24.0, ..FleetParameters::default() },
            FleetParameters { arrival_hour: 7.5, ..FleetParameters::default() },
        ];
        for parameters in invalid {
            assert!(Fleet::new(parameters).is_err(), "{parameters:?}");
        }
    }
}
