use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::Serialize;

impl<T> Quantiles for T where T: ?Sized {}

pub trait Quantiles {
    /// Quantile with linear interpolation between the closest ranks.
    ///
    /// `q` is in `0.0..=1.0`.
    #[must_use]
    fn quantile(self, q: f64) -> Option<f64>
    where
        Self: Sized + Iterator<Item = f64>,
    {
        let sorted = self.map(OrderedFloat).sorted_unstable().collect_vec();
        interpolate(&sorted, q)
    }

    #[must_use]
    fn percentiles(self) -> Option<Percentiles>
    where
        Self: Sized + Iterator<Item = f64>,
    {
        let sorted = self.map(OrderedFloat).sorted_unstable().collect_vec();
        Some(Percentiles {
            p5: interpolate(&sorted, 0.05)?,
            p25: interpolate(&sorted, 0.25)?,
            p50: interpolate(&sorted, 0.50)?,
            p75: interpolate(&sorted, 0.75)?,
            p95: interpolate(&sorted, 0.95)?,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[expect(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn interpolate(sorted: &[OrderedFloat<f64>], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = q.clamp(0.0, 1.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - rank.floor();
    Some(sorted[lower].0 + (sorted[upper].0 - sorted[lower].0) * fraction)
}
