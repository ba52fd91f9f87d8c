use chrono::NaiveDateTime;
use thiserror::Error;

use crate::core::{calendar::DayType, demand::Sector};

/// Input validation failures of the simulation core.
///
/// None of these are recoverable by retrying: the run must be fixed at the input.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{sector} load profile has no weights for month {month}, {day_type}")]
    MissingProfileCoverage { sector: Sector, month: u32, day_type: DayType },

    #[error("heat pump profile matrix has no value for slot {slot}, temperature bin {bin}")]
    MissingHeatPumpColumn { slot: usize, bin: String },

    #[error("reference capacity of {technology} must be positive, got {capacity} MW")]
    ZeroReferenceCapacity { technology: String, capacity: f64 },

    #[error("missing {missing} for {asset} with {capacity} installed")]
    MissingCostParameters { asset: String, capacity: f64, missing: String },

    #[error("`{label}` has {actual} intervals, expected {expected} on the {year} grid")]
    GridMisaligned { label: String, year: i32, expected: usize, actual: usize },

    #[error("`{label}` has a gap of {missing} intervals after {after}")]
    UnresolvedGap { label: String, after: NaiveDateTime, missing: usize },

    #[error("{sector} normalization sum must be positive, got {sum}")]
    NonPositiveNormalization { sector: Sector, sum: f64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("invalid {storage} storage: {reason}")]
    InvalidStorage { storage: String, reason: String },
}

pub type Result<T = (), E = Error> = std::result::Result<T, E>;
