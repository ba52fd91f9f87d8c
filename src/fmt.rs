use std::fmt::{Display, Formatter};

/// Fraction printed as a percentage with `DECIMALS` digits after the point.
#[derive(Copy, Clone, Debug)]
pub struct Percent<const DECIMALS: usize>(pub f64);

impl<const DECIMALS: usize> Display for Percent<DECIMALS> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.*}%", DECIMALS, self.0 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Percent::<1>(0.8734).to_string(), "87.3%");
        assert_eq!(Percent::<4>(0.001_23).to_string(), "0.1230%");
    }
}
