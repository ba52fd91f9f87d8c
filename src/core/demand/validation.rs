use serde::Serialize;

use crate::{
    core::demand::{Sector, SectorDemand},
    quantity::energy::MegawattHours,
};

/// Target versus achieved annual demand of one sector.
#[derive(Copy, Clone, Debug, Serialize)]
pub struct SectorValidation {
    pub sector: Sector,
    pub target: MegawattHours,
    pub achieved: MegawattHours,
}

impl SectorValidation {
    #[must_use]
    pub fn relative_error(&self) -> f64 {
        if self.target == MegawattHours::ZERO {
            if self.achieved == MegawattHours::ZERO { 0.0 } else { f64::INFINITY }
        } else {
            ((self.achieved - self.target) / self.target).abs()
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ValidationSummary {
    pub sectors: Vec<SectorValidation>,
}

impl ValidationSummary {
    #[must_use]
    pub fn new(demands: &[SectorDemand]) -> Self {
        Self {
            sectors: demands
                .iter()
                .map(|demand| SectorValidation {
                    sector: demand.sector,
                    target: demand.target,
                    achieved: demand.achieved(),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn max_relative_error(&self) -> f64 {
        self.sectors.iter().map(SectorValidation::relative_error).fold(0.0, f64::max)
    }

    /// Whether every sector lies within the relative tolerance.
    #[must_use]
    pub fn is_within(&self, tolerance: f64) -> bool {
        self.max_relative_error() <= tolerance
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_relative_error() {
        let validation = SectorValidation {
            sector: Sector::Household,
            target: MegawattHours::from(100.0),
            achieved: MegawattHours::from(99.5),
        };
        assert_abs_diff_eq!(validation.relative_error(), 0.005, epsilon = 1e-12);
        let summary = ValidationSummary { sectors: vec![validation] };
        assert!(summary.is_within(0.005 + 1e-12));
        assert!(!summary.is_within(0.001));
    }

    #[test]
    fn test_zero_target() {
        let validation = SectorValidation {
            sector: Sector::Agriculture,
            target: MegawattHours::ZERO,
            achieved: MegawattHours::ZERO,
        };
        assert_abs_diff_eq!(validation.relative_error(), 0.0);
    }
}
