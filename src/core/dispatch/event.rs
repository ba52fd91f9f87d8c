use serde::{Deserialize, Serialize};

use crate::{
    core::dispatch::window::SignWindow,
    quantity::{energy::MegawattHours, power::Megawatts, time::Hours},
};

/// Two hours of quarter-hours.
pub const LOOKBACK: usize = 8;

pub type BalanceWindow = SignWindow<LOOKBACK>;

#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[display("ignore")]
    Ignore,

    #[display("short peak")]
    ShortPeak,

    #[display("medium swing")]
    MediumSwing,

    #[display("long surplus")]
    LongSurplus,

    #[display("long deficit")]
    LongDeficit,
}

impl EventKind {
    pub const ALL: [Self; 5] =
        [Self::Ignore, Self::ShortPeak, Self::MediumSwing, Self::LongSurplus, Self::LongDeficit];
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DispatchEvent {
    pub kind: EventKind,

    /// Absolute balance of the current interval.
    pub magnitude: MegawattHours,

    pub estimated_duration: Hours,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventThresholds {
    /// Balances below this power are left to the grid.
    #[serde(rename = "ignore_below_mw")]
    pub ignore_below: Megawatts,

    #[serde(rename = "medium_from_hours")]
    pub medium_from: Hours,

    #[serde(rename = "long_from_hours")]
    pub long_from: Hours,
}

impl Default for EventThresholds {
    fn default() -> Self {
        Self {
            ignore_below: Megawatts::from(250.0),
            medium_from: Hours::from(2.0),
            long_from: Hours::from(24.0),
        }
    }
}

impl EventThresholds {
    /// Classify the latest value of the window.
    #[expect(clippy::cast_precision_loss)]
    pub fn classify(&self, window: &BalanceWindow) -> DispatchEvent {
        let current = window.latest().unwrap_or_default();
        let magnitude = MegawattHours::from(current.abs());
        if magnitude / Hours::QUARTER < self.ignore_below || current == 0.0 {
            return DispatchEvent { kind: EventKind::Ignore, magnitude, estimated_duration: Hours::QUARTER };
        }
        if !window.is_uniform() {
            return DispatchEvent { kind: EventKind::ShortPeak, magnitude, estimated_duration: Hours::from(0.5) };
        }
        let estimated_duration = Hours::QUARTER * window.run() as f64;
        let kind = if estimated_duration < self.medium_from {
            EventKind::ShortPeak
        } else if estimated_duration < self.long_from {
            EventKind::MediumSwing
        } else if current > 0.0 {
            EventKind::LongSurplus
        } else {
            EventKind::LongDeficit
        };
        DispatchEvent { kind, magnitude, estimated_duration }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn classify(values: impl IntoIterator<Item = f64>) -> DispatchEvent {
        let mut window = BalanceWindow::default();
        for value in values {
            window.push(value);
        }
        EventThresholds::default().classify(&window)
    }

    #[test]
    fn test_ignore() {
        assert_eq!(classify([50.0]).kind, EventKind::Ignore);
        assert_eq!(classify([-62.0]).kind, EventKind::Ignore);
    }

    #[test]
    fn test_single_interval() {
        let event = classify([600.0]);
        assert_eq!(event.kind, EventKind::ShortPeak);
        assert_abs_diff_eq!(event.magnitude.0, 600.0);
    }

    #[test]
    fn test_mixed_signs() {
        let event = classify([500.0, 500.0, -500.0, 500.0, 500.0, 500.0, 500.0, 500.0]);
        assert_eq!(event.kind, EventKind::ShortPeak);
        assert_abs_diff_eq!(event.estimated_duration.0, 0.5);
    }

    /// Exactly two hours of surplus is a medium swing.
    #[test]
    fn test_medium_boundary() {
        assert_eq!(classify(std::iter::repeat_n(500.0, 7)).kind, EventKind::ShortPeak);
        assert_eq!(classify(std::iter::repeat_n(500.0, 8)).kind, EventKind::MediumSwing);
    }

    /// Exactly a day of deficit is a long deficit.
    #[test]
    fn test_long_boundary() {
        assert_eq!(classify(std::iter::repeat_n(-500.0, 95)).kind, EventKind::MediumSwing);
        let event = classify(std::iter::repeat_n(-500.0, 96));
        assert_eq!(event.kind, EventKind::LongDeficit);
        assert_abs_diff_eq!(event.estimated_duration.0, 24.0);
        assert_eq!(classify(std::iter::repeat_n(500.0, 200)).kind, EventKind::LongSurplus);
    }
}
