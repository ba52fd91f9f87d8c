//! Key performance indicators of a simulated year, scored from 0 (worst) to 100 (best).

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::Serialize;

use crate::{
    core::{
        generation::{GenerationSeries, Technology},
        series::TimeSeries,
    },
    error::Result,
    quantity::{energy::MegawattHours, time::Hours},
};

/// Cap on the curtailment share, beyond which a scenario is not meaningfully worse.
const MAX_CURTAILMENT_SHARE: f64 = 0.4;

/// Cap on the storage utilization, allowing storage to cycle more than the balance strictly needs.
const MAX_STORAGE_UTILIZATION: f64 = 1.2;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[display("security")]
    Security,

    #[display("ecology")]
    Ecology,

    #[display("economy")]
    Economy,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Kpi {
    /// Unserved energy over the demand.
    #[display("energy deficit share")]
    EnergyDeficitShare,

    /// Largest unserved power over the peak load.
    #[display("peak deficit ratio")]
    PeakDeficitRatio,

    #[display("deficit frequency")]
    DeficitFrequency,

    /// Mean hydrogen state of charge from November to February, over the capacity.
    #[display("hydrogen winter fill")]
    HydrogenWinterFill,

    /// Grams of CO₂ per kilowatt-hour generated.
    #[display("CO₂ intensity")]
    Co2Intensity,

    /// Surplus left after the flexibilities, over wind and solar generation.
    #[display("curtailment share")]
    CurtailmentShare,

    #[display("fossil share")]
    FossilShare,

    /// Levelized cost in cents per kilowatt-hour.
    #[display("system cost")]
    SystemCost,

    #[display("import dependency")]
    ImportDependency,

    /// Useful storage throughput over what the balance could use.
    #[display("storage utilization")]
    StorageUtilization,
}

impl Kpi {
    pub const ALL: [Self; 10] = [
        Self::EnergyDeficitShare,
        Self::PeakDeficitRatio,
        Self::DeficitFrequency,
        Self::HydrogenWinterFill,
        Self::Co2Intensity,
        Self::CurtailmentShare,
        Self::FossilShare,
        Self::SystemCost,
        Self::ImportDependency,
        Self::StorageUtilization,
    ];

    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            Self::EnergyDeficitShare | Self::PeakDeficitRatio | Self::DeficitFrequency | Self::HydrogenWinterFill => {
                Category::Security
            }
            Self::Co2Intensity | Self::CurtailmentShare | Self::FossilShare => Category::Ecology,
            Self::SystemCost | Self::ImportDependency | Self::StorageUtilization => Category::Economy,
        }
    }

    /// Value scoring 0 and value scoring 100.
    #[must_use]
    pub const fn range(self) -> (f64, f64) {
        match self {
            Self::HydrogenWinterFill | Self::StorageUtilization => (0.0, 1.0),
            Self::Co2Intensity => (1000.0, 0.0),
            Self::SystemCost => (100.0, 0.0),
            _ => (1.0, 0.0),
        }
    }

    #[must_use]
    pub fn score(self, value: f64) -> f64 {
        let (worst, best) = self.range();
        let score = if best < worst {
            if worst > 0.0 { (1.0 - value / worst) * 100.0 } else { 100.0 }
        } else if best > 0.0 {
            value / best * 100.0
        } else {
            0.0
        };
        score.clamp(0.0, 100.0)
    }
}

/// Direct emissions in grams per kilowatt-hour generated, zero for the unlisted technologies.
#[must_use]
pub const fn co2_factor(technology: Technology) -> f64 {
    match technology {
        Technology::NaturalGas | Technology::OtherConventional => 490.0,
        Technology::HardCoal | Technology::Lignite => 820.0,
        Technology::Biomass => 50.0,
        Technology::Hydro => 5.0,
        _ => 0.0,
    }
}

const fn is_fossil(technology: Technology) -> bool {
    matches!(
        technology,
        Technology::NaturalGas | Technology::HardCoal | Technology::Lignite | Technology::OtherConventional
    )
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 { numerator / denominator } else { 0.0 }
}

fn surplus_and_deficit(residual: &TimeSeries) -> (f64, f64) {
    residual.iter().fold((0.0, 0.0), |(surplus, deficit), value| {
        if value > 0.0 { (surplus + value, deficit) } else { (surplus, deficit - value) }
    })
}

/// Everything the indicators are computed from.
pub struct ScoringInputs<'a> {
    pub generation: &'a [GenerationSeries],
    pub demand: &'a TimeSeries,

    /// Balance handed to the storage dispatch.
    pub residual_before_storage: &'a TimeSeries,

    /// Balance left after every flexibility.
    pub residual_after: &'a TimeSeries,

    pub storage_charged: MegawattHours,
    pub storage_discharged: MegawattHours,
    pub hydrogen_soc: &'a TimeSeries,
    pub hydrogen_capacity: MegawattHours,
    pub lcoe_cents_per_kilowatt_hour: f64,
}

#[derive(Copy, Clone, Debug, Serialize)]
pub struct KpiValue {
    pub kpi: Kpi,
    pub category: Category,
    pub value: f64,
    pub score: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Scorecard {
    pub kpis: Vec<KpiValue>,

    /// Mean score of each category.
    pub categories: BTreeMap<Category, f64>,

    /// Mean of the category scores.
    pub overall: f64,
}

impl Scorecard {
    #[expect(clippy::cast_precision_loss)]
    pub fn new(inputs: &ScoringInputs<'_>) -> Result<Self> {
        inputs.residual_after.check_aligned("demand", inputs.demand)?;
        inputs.residual_before_storage.check_aligned("residual after dispatch", inputs.residual_after)?;

        let load = inputs.demand.sum();
        let peak_load = inputs.demand.iter().fold(0.0, f64::max) / Hours::QUARTER.0;
        let (curtailed, unserved) = surplus_and_deficit(inputs.residual_after);
        let peak_deficit = -inputs.residual_after.iter().fold(0.0, f64::min) / Hours::QUARTER.0;
        let n_deficits = inputs.residual_after.iter().filter(|value| *value < 0.0).count();

        let hydrogen_winter_fill = {
            let winter: Vec<f64> = inputs
                .hydrogen_soc
                .points()
                .filter(|(timestamp, _)| matches!(timestamp.month(), 11 | 12 | 1 | 2))
                .map(|(_, soc)| soc)
                .collect();
            ratio(winter.iter().sum::<f64>() / winter.len().max(1) as f64, inputs.hydrogen_capacity.0)
        };

        let total_generation: f64 = inputs.generation.iter().map(|series| series.series.sum()).sum();
        let generated_by = |filter: fn(Technology) -> bool| -> f64 {
            inputs
                .generation
                .iter()
                .filter(|series| filter(series.technology))
                .map(|series| series.series.sum())
                .sum()
        };
        let variable_renewables = generated_by(|technology| {
            matches!(technology, Technology::WindOnshore | Technology::WindOffshore | Technology::Solar)
        });
        let emissions: f64 =
            inputs.generation.iter().map(|series| series.series.sum() * co2_factor(series.technology)).sum();

        let (surplus_before, deficit_before) = surplus_and_deficit(inputs.residual_before_storage);
        let storage_utilization = ratio(
            inputs.storage_charged.0.min(inputs.storage_discharged.0),
            surplus_before.min(deficit_before),
        );

        let values = [
            (Kpi::EnergyDeficitShare, ratio(unserved, load).min(1.0)),
            (Kpi::PeakDeficitRatio, ratio(peak_deficit, peak_load).min(1.0)),
            (Kpi::DeficitFrequency, ratio(n_deficits as f64, inputs.residual_after.len() as f64)),
            (Kpi::HydrogenWinterFill, hydrogen_winter_fill),
            (Kpi::Co2Intensity, ratio(emissions, total_generation)),
            (Kpi::CurtailmentShare, ratio(curtailed, variable_renewables).min(MAX_CURTAILMENT_SHARE)),
            (Kpi::FossilShare, ratio(generated_by(is_fossil), total_generation).min(1.0)),
            (Kpi::SystemCost, inputs.lcoe_cents_per_kilowatt_hour),
            (Kpi::ImportDependency, ratio(unserved, load).min(1.0)),
            (Kpi::StorageUtilization, storage_utilization.min(MAX_STORAGE_UTILIZATION)),
        ];
        let kpis: Vec<KpiValue> = values
            .into_iter()
            .map(|(kpi, value)| KpiValue { kpi, category: kpi.category(), value, score: kpi.score(value) })
            .collect();

        let mut sums = BTreeMap::<Category, (f64, usize)>::new();
        for kpi in &kpis {
            let (sum, count) = sums.entry(kpi.category).or_default();
            *sum += kpi.score;
            *count += 1;
        }
        let categories: BTreeMap<Category, f64> =
            sums.into_iter().map(|(category, (sum, count))| (category, sum / count as f64)).collect();
        let overall = categories.values().sum::<f64>() / categories.len().max(1) as f64;

        Ok(Self { kpis, categories, overall })
    }

    #[must_use]
    pub fn value(&self, kpi: Kpi) -> Option<f64> {
        self.kpis.iter().find(|value| value.kpi == kpi).map(|value| value.value)
    }
}
