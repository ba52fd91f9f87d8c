use std::fmt::{Debug, Display, Formatter};

use crate::quantity::Quantity;

/// Euro per megawatt-hour.
pub type EurosPerMegawattHour = Quantity<-1, -1, 1>;

impl EurosPerMegawattHour {
    /// Same rate in euro cents per kilowatt-hour.
    #[must_use]
    pub const fn as_cents_per_kilowatt_hour(self) -> f64 {
        self.0 * 0.1
    }
}

impl Display for EurosPerMegawattHour {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} €/MWh", self.0)
    }
}

impl Debug for EurosPerMegawattHour {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}€/MWh", self.0)
    }
}

/// Euro per megawatt of installed capacity.
pub type EurosPerMegawatt = Quantity<-1, 0, 1>;

impl Display for EurosPerMegawatt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0} €/MW", self.0)
    }
}

impl Debug for EurosPerMegawatt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}€/MW", self.0)
    }
}
