use std::{
    fmt::{Debug, Display, Formatter},
    ops::Mul,
};

use crate::quantity::{
    Quantity,
    cost::Euros,
    energy::MegawattHours,
    rate::EurosPerMegawatt,
    time::Hours,
};

pub type Megawatts = Quantity<1, 0, 0>;

impl Megawatts {
    #[must_use]
    pub const fn as_gigawatts(self) -> f64 {
        self.0 / 1000.0
    }
}

impl Display for Megawatts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0} MW", self.0)
    }
}

impl Debug for Megawatts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}MW", self.0)
    }
}

impl Mul<Hours> for Megawatts {
    type Output = MegawattHours;

    fn mul(self, rhs: Hours) -> Self::Output {
        Quantity(self.0 * rhs.0)
    }
}

impl Mul<EurosPerMegawatt> for Megawatts {
    type Output = Euros;

    fn mul(self, rhs: EurosPerMegawatt) -> Self::Output {
        Quantity(self.0 * rhs.0)
    }
}
