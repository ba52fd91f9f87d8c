use std::{
    fmt::{Debug, Display, Formatter},
    ops::{Div, Mul},
};

use crate::quantity::{
    Quantity,
    cost::Euros,
    power::Megawatts,
    rate::EurosPerMegawattHour,
    time::Hours,
};

pub type MegawattHours = Quantity<1, 1, 0>;

impl MegawattHours {
    pub const fn from_terawatt_hours(terawatt_hours: f64) -> Self {
        Self(terawatt_hours * 1_000_000.0)
    }

    #[must_use]
    pub const fn as_terawatt_hours(self) -> f64 {
        self.0 / 1_000_000.0
    }
}

impl Display for MegawattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.abs() >= 1_000_000.0 {
            write!(f, "{:.3} TWh", self.as_terawatt_hours())
        } else {
            write!(f, "{:.1} MWh", self.0)
        }
    }
}

impl Debug for MegawattHours {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}MWh", self.0)
    }
}

impl Div<Hours> for MegawattHours {
    type Output = Megawatts;

    fn div(self, rhs: Hours) -> Self::Output {
        Quantity(self.0 / rhs.0)
    }
}

impl Div<Megawatts> for MegawattHours {
    type Output = Hours;

    fn div(self, rhs: Megawatts) -> Self::Output {
        Quantity(self.0 / rhs.0)
    }
}

impl Mul<EurosPerMegawattHour> for MegawattHours {
    type Output = Euros;

    fn mul(self, rhs: EurosPerMegawattHour) -> Self::Output {
        Quantity(self.0 * rhs.0)
    }
}
