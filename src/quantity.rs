pub mod cost;
pub mod energy;
pub mod power;
pub mod rate;
pub mod time;

use std::{
    cmp::Ordering,
    ops::{Div, Mul},
};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Physical quantity with its dimension encoded as powers of power (MW), time (h), and cost (€).
#[derive(
    Clone,
    Copy,
    Default,
    Deserialize,
    Serialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::From,
    derive_more::FromStr,
    derive_more::Neg,
    derive_more::Sub,
    derive_more::SubAssign,
    derive_more::Sum,
)]
#[serde(transparent)]
#[must_use]
pub struct Quantity<const POWER: isize, const TIME: isize, const COST: isize>(pub f64);

impl<const POWER: isize, const TIME: isize, const COST: isize> Quantity<POWER, TIME, COST> {
    pub const ZERO: Self = Self(0.0);

    pub const fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn min(self, rhs: Self) -> Self {
        if rhs < self { rhs } else { self }
    }

    pub fn max(self, rhs: Self) -> Self {
        if rhs > self { rhs } else { self }
    }

    pub fn clamp(self, min: Self, max: Self) -> Self {
        self.max(min).min(max)
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0.0
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> PartialEq
    for Quantity<POWER, TIME, COST>
{
    fn eq(&self, other: &Self) -> bool {
        OrderedFloat(self.0).eq(&OrderedFloat(other.0))
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Eq for Quantity<POWER, TIME, COST> {}

impl<const POWER: isize, const TIME: isize, const COST: isize> PartialOrd
    for Quantity<POWER, TIME, COST>
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Ord for Quantity<POWER, TIME, COST> {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderedFloat(self.0).cmp(&OrderedFloat(other.0))
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Mul<f64>
    for Quantity<POWER, TIME, COST>
{
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Div<f64>
    for Quantity<POWER, TIME, COST>
{
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self(self.0 / rhs)
    }
}

impl<const POWER: isize, const TIME: isize, const COST: isize> Div<Self>
    for Quantity<POWER, TIME, COST>
{
    type Output = f64;

    fn div(self, rhs: Self) -> Self::Output {
        self.0 / rhs.0
    }
}
