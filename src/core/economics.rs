//! Annuity-based system cost and levelized cost of energy.

pub mod parameters;

use std::collections::BTreeMap;

use serde::Serialize;

pub use self::parameters::{CostParameters, CostValue, EconomicParameters, annuity_factor};
use crate::{
    core::{dispatch::StorageKind, generation::Technology},
    error::{Error, Result},
    prelude::{debug, info, instrument},
    quantity::{
        cost::Euros,
        energy::MegawattHours,
        power::Megawatts,
        rate::EurosPerMegawattHour,
    },
};

/// Anything that carries cost: a generation technology or a storage.
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
    derive_more::Display,
    derive_more::From,
)]
#[serde(untagged)]
pub enum Asset {
    Generation(Technology),
    Storage(StorageKind),
}

impl Asset {
    /// Only combustion-based generation pays for fuel and emissions.
    #[must_use]
    pub fn is_thermal(self) -> bool {
        match self {
            Self::Generation(technology) => technology.is_thermal(),
            Self::Storage(_) => false,
        }
    }
}

/// Installed size and yearly output of an asset.
#[derive(Copy, Clone, Debug)]
pub struct AssetUsage {
    pub asset: Asset,

    /// Megawatts for generation, megawatt-hours of capacity for storage.
    pub base_size: f64,

    /// Same unit as [`AssetUsage::base_size`].
    pub target_size: f64,

    /// Basis of the fixed operating cost.
    pub power: Megawatts,

    /// Generated energy, or discharged energy for storage.
    pub energy: MegawattHours,
}

impl AssetUsage {
    pub fn generation(technology: Technology, base: Megawatts, target: Megawatts, energy: MegawattHours) -> Self {
        Self { asset: Asset::Generation(technology), base_size: base.0, target_size: target.0, power: target, energy }
    }

    pub const fn storage(
        kind: StorageKind,
        base: MegawattHours,
        target: MegawattHours,
        discharge_power: Megawatts,
        discharged: MegawattHours,
    ) -> Self {
        Self {
            asset: Asset::Storage(kind),
            base_size: base.0,
            target_size: target.0,
            power: discharge_power,
            energy: discharged,
        }
    }
}

/// Cost of one asset in the target year.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct AssetCost {
    pub asset: Asset,

    /// One-time outlay for the capacity growth.
    pub investment: Euros,

    pub annual_capital_cost: Euros,
    pub annual_fixed_opex: Euros,
    pub annual_variable_opex: Euros,

    /// Tonnes of CO₂ emitted.
    pub co2_emissions: f64,
}

impl AssetCost {
    pub fn total_annual_cost(&self) -> Euros {
        self.annual_capital_cost + self.annual_fixed_opex + self.annual_variable_opex
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CostBreakdown {
    pub assets: Vec<AssetCost>,
    pub total_investment: Euros,
    pub total_annual_cost: Euros,
    pub consumption: MegawattHours,
    pub system_lcoe: EurosPerMegawattHour,
    pub total_co2_emissions: f64,
}

impl CostBreakdown {
    #[must_use]
    pub const fn lcoe_cents_per_kilowatt_hour(&self) -> f64 {
        self.system_lcoe.as_cents_per_kilowatt_hour()
    }
}

#[must_use]
pub struct EconomicCalculator<'a> {
    parameters: EconomicParameters,
    costs: &'a BTreeMap<Asset, CostParameters>,
}

impl<'a> EconomicCalculator<'a> {
    pub const fn new(parameters: EconomicParameters, costs: &'a BTreeMap<Asset, CostParameters>) -> Self {
        Self { parameters, costs }
    }

    #[instrument(skip_all, fields(n_assets = usages.len(), consumption = %consumption))]
    pub fn calculate(&self, usages: &[AssetUsage], consumption: MegawattHours) -> Result<CostBreakdown> {
        if !consumption.is_positive() {
            return Err(Error::InvalidParameter(format!(
                "annual consumption must be positive to levelize the cost, got {consumption}",
            )));
        }

        let mut assets = Vec::with_capacity(usages.len());
        for usage in usages {
            let Some(parameters) = self.costs.get(&usage.asset) else {
                if usage.target_size > 0.0 {
                    return Err(Error::MissingCostParameters {
                        asset: usage.asset.to_string(),
                        capacity: usage.target_size,
                        missing: "cost parameters".to_string(),
                    });
                }
                debug!(asset = %usage.asset, "no capacity and no cost parameters, skipping");
                continue;
            };
            assets.push(self.asset_cost(usage, parameters)?);
        }

        let total_investment = assets.iter().map(|cost| cost.investment).sum();
        let total_annual_cost: Euros = assets.iter().map(AssetCost::total_annual_cost).sum();
        let total_co2_emissions = assets.iter().map(|cost| cost.co2_emissions).sum();
        let system_lcoe = total_annual_cost / consumption;
        info!(
            total_investment = %total_investment,
            total_annual_cost = %total_annual_cost,
            lcoe = %system_lcoe,
            "calculated the costs",
        );
        Ok(CostBreakdown {
            assets,
            total_investment,
            total_annual_cost,
            consumption,
            system_lcoe,
            total_co2_emissions,
        })
    }

    fn asset_cost(&self, usage: &AssetUsage, parameters: &CostParameters) -> Result<AssetCost> {
        let name = usage.asset.to_string();
        parameters.validate(&name)?;
        if usage.target_size < 0.0 || usage.base_size < 0.0 {
            return Err(Error::InvalidParameter(format!("capacity of {name} must be non-negative")));
        }

        let capex = parameters.capex.value();
        let annuity = annuity_factor(self.parameters.wacc, parameters.lifetime_years)?;
        let investment = Euros::from((usage.target_size - usage.base_size).max(0.0) * capex);
        let annual_capital_cost = Euros::from(usage.target_size * capex * annuity);

        // Fixed OPEX is quoted per kilowatt:
        let annual_fixed_opex = Euros::from(usage.power.0 * parameters.fixed_opex.value() * 1000.0);

        // Only an installed thermal asset burns fuel, a retired one has nothing to cost:
        let (fuel, co2_emissions) = if usage.asset.is_thermal() && usage.target_size > 0.0 {
            let thermal = parameters.thermal(&name, usage.target_size)?;
            let fuel_energy = usage.energy.0 / thermal.efficiency;
            let per_thermal = thermal.fuel_cost + self.parameters.co2_price * thermal.emission_factor;
            (per_thermal / thermal.efficiency, fuel_energy * thermal.emission_factor)
        } else {
            (0.0, 0.0)
        };
        let annual_variable_opex =
            usage.energy * EurosPerMegawattHour::from(parameters.variable_opex.value() + fuel);

        Ok(AssetCost {
            asset: usage.asset,
            investment,
            annual_capital_cost,
            annual_fixed_opex,
            annual_variable_opex,
            co2_emissions,
        })
    }
}
