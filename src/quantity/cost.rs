use std::{
    fmt::{Debug, Display, Formatter},
    ops::Div,
};

use crate::quantity::{Quantity, energy::MegawattHours, rate::EurosPerMegawattHour};

pub type Euros = Quantity<0, 0, 1>;

impl Euros {
    #[must_use]
    pub const fn as_billions(self) -> f64 {
        self.0 / 1e9
    }
}

impl Display for Euros {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.abs() >= 1e9 {
            write!(f, "{:.2} bn €", self.as_billions())
        } else if self.0.abs() >= 1e6 {
            write!(f, "{:.2} m €", self.0 / 1e6)
        } else {
            write!(f, "{:.2} €", self.0)
        }
    }
}

impl Debug for Euros {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}€", self.0)
    }
}

impl Div<MegawattHours> for Euros {
    type Output = EurosPerMegawattHour;

    fn div(self, rhs: MegawattHours) -> Self::Output {
        Quantity(self.0 / rhs.0)
    }
}
