use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cost input given either as a single value or as a `[min, max]` range.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CostValue {
    Scalar(f64),
    Range([f64; 2]),
}

impl Default for CostValue {
    fn default() -> Self {
        Self::Scalar(0.0)
    }
}

impl From<f64> for CostValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl CostValue {
    /// Ranges collapse to their midpoint.
    #[must_use]
    pub fn value(self) -> f64 {
        match self {
            Self::Scalar(value) => value,
            Self::Range([min, max]) => f64::midpoint(min, max),
        }
    }
}

/// Cost parameters of one asset.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostParameters {
    /// Euro per megawatt for generation, euro per megawatt-hour of capacity for storage.
    pub capex: CostValue,

    #[serde(rename = "fixed_opex_eur_per_kw_year")]
    pub fixed_opex: CostValue,

    /// Wear-related cost per megawatt-hour produced.
    #[serde(rename = "variable_opex_eur_per_mwh")]
    pub variable_opex: CostValue,

    pub lifetime_years: f64,

    /// Fuel price per thermal megawatt-hour.
    #[serde(default, rename = "fuel_cost_eur_per_mwh")]
    pub fuel_cost: Option<CostValue>,

    /// Electrical efficiency of the conversion from fuel.
    #[serde(default)]
    pub efficiency: Option<f64>,

    /// Tonnes of CO₂ per thermal megawatt-hour.
    #[serde(default, rename = "emission_factor_t_per_mwh")]
    pub emission_factor: Option<f64>,
}

/// Fuel-related parameters, all of them required for combustion-based generation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ThermalParameters {
    pub fuel_cost: f64,
    pub efficiency: f64,
    pub emission_factor: f64,
}

impl CostParameters {
    pub fn validate(&self, asset: &str) -> Result {
        if let Some(efficiency) = self.efficiency
            && (efficiency.is_nan() || efficiency <= 0.0 || efficiency > 1.0)
        {
            return Err(Error::InvalidParameter(format!("efficiency of {asset} must be in (0, 1], got {efficiency}")));
        }
        if let Some(emission_factor) = self.emission_factor
            && (emission_factor.is_nan() || emission_factor < 0.0)
        {
            return Err(Error::InvalidParameter(format!("emission factor of {asset} must be non-negative")));
        }
        annuity_factor(0.0, self.lifetime_years).map(|_| ())
    }

    /// Fuel parameters of an installed thermal asset.
    pub fn thermal(&self, asset: &str, capacity: f64) -> Result<ThermalParameters> {
        let missing = |parameter: &str| Error::MissingCostParameters {
            asset: asset.to_string(),
            capacity,
            missing: parameter.to_string(),
        };
        Ok(ThermalParameters {
            fuel_cost: self.fuel_cost.ok_or_else(|| missing("fuel_cost_eur_per_mwh"))?.value(),
            efficiency: self.efficiency.ok_or_else(|| missing("efficiency"))?,
            emission_factor: self.emission_factor.ok_or_else(|| missing("emission_factor_t_per_mwh"))?,
        })
    }
}

/// Parameters shared by all assets.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomicParameters {
    /// Weighted average cost of capital, as a fraction.
    pub wacc: f64,

    #[serde(default, rename = "co2_price_eur_per_t")]
    pub co2_price: f64,
}

impl Default for EconomicParameters {
    fn default() -> Self {
        Self { wacc: 0.05, co2_price: 0.0 }
    }
}

/// Share of an investment to pay back every year over the lifetime.
///
/// Without interest, it is simply the reciprocal of the lifetime.
pub fn annuity_factor(wacc: f64, lifetime_years: f64) -> Result<f64> {
    if lifetime_years.is_nan() || lifetime_years <= 0.0 {
        return Err(Error::InvalidParameter(format!(
            "lifetime must be positive, got {lifetime_years} years",
        )));
    }
    if wacc.is_nan() || wacc <= -1.0 {
        return Err(Error::InvalidParameter(format!("WACC must be above -100 %, got {wacc}")));
    }
    if wacc == 0.0 {
        return Ok(1.0 / lifetime_years);
    }
    let compound = (1.0 + wacc).powf(lifetime_years);
    Ok(wacc * compound / (compound - 1.0))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_range_mean() {
        assert_abs_diff_eq!(CostValue::Range([600_000.0, 1_000_000.0]).value(), 800_000.0);
        assert_abs_diff_eq!(CostValue::Scalar(42.0).value(), 42.0);
    }

    #[test]
    fn test_deserialize_cost_value() {
        #[derive(Deserialize)]
        struct Wrapper {
            scalar: CostValue,
            range: CostValue,
        }
        let wrapper: Wrapper = toml::from_str("scalar = 5.0\nrange = [1.0, 3.0]").unwrap();
        assert_eq!(wrapper.scalar, CostValue::Scalar(5.0));
        assert_abs_diff_eq!(wrapper.range.value(), 2.0);
    }

    #[test]
    fn test_variable_opex_is_required() {
        let text = "capex = 1.0\nfixed_opex_eur_per_kw_year = 1.0\nlifetime_years = 20";
        assert!(toml::from_str::<CostParameters>(text).is_err());
    }

    #[test]
    fn test_thermal_parameters() {
        let text = "
            capex = 800_000.0
            fixed_opex_eur_per_kw_year = 20.0
            variable_opex_eur_per_mwh = 4.0
            lifetime_years = 30
            fuel_cost_eur_per_mwh = [30.0, 50.0]
            efficiency = 0.5
        ";
        let parameters: CostParameters = toml::from_str(text).unwrap();
        assert!(matches!(
            parameters.thermal("natural gas", 30_000.0),
            Err(Error::MissingCostParameters { missing, .. }) if missing == "emission_factor_t_per_mwh",
        ));

        let parameters = CostParameters { emission_factor: Some(0.2), ..parameters };
        let thermal = parameters.thermal("natural gas", 30_000.0).unwrap();
        assert_abs_diff_eq!(thermal.fuel_cost, 40.0);
        assert_abs_diff_eq!(thermal.efficiency, 0.5);
    }

    #[test]
    fn test_annuity_factor() {
        assert_abs_diff_eq!(annuity_factor(0.05, 25.0).unwrap(), 0.070_952_457_3, epsilon = 1e-9);
        assert_abs_diff_eq!(annuity_factor(0.0, 20.0).unwrap(), 0.05);
    }

    #[test]
    fn test_annuity_factor_invalid_lifetime() {
        assert!(annuity_factor(0.05, 0.0).is_err());
        assert!(annuity_factor(0.05, -3.0).is_err());
    }
}
